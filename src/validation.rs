//! Validation of DNS names received from external-dns and configuration
//!
//! Endpoint names are checked before they are handed back from negotiation;
//! domain filter entries are checked at startup.

use anyhow::{anyhow, Result};

/// Validates that a string is a usable DNS record name
///
/// Rules, after trimming whitespace and one trailing dot:
///
/// - total length at most 253 characters, labels at most 63
/// - no empty labels, so no leading dot and no `..`
/// - labels consist of letters, digits, `-` and `_`, and do not start or end
///   with `-`
/// - `*` is accepted as a whole label (wildcards)
/// - `@` on its own names the zone apex
///
/// # Examples
///
/// ```
/// use clouddns_webhook::validation::validate_record_name;
///
/// assert!(validate_record_name("www.example.com.").is_ok());
/// assert!(validate_record_name("_acme-challenge.example.com").is_ok());
/// assert!(validate_record_name("*.example.com").is_ok());
/// assert!(validate_record_name("example..com").is_err());
/// assert!(validate_record_name("-bad.example.com").is_err());
/// ```
pub fn validate_record_name(record_name: &str) -> Result<()> {
    let trimmed = record_name.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Record name cannot be empty"));
    }
    if trimmed == "@" {
        return Ok(());
    }
    if trimmed.contains(char::is_whitespace) {
        return Err(anyhow!("Record name cannot contain spaces"));
    }

    let name = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if name.is_empty() {
        return Err(anyhow!("Record name cannot be empty"));
    }
    if name.len() > 253 {
        return Err(anyhow!(
            "Record name too long (max 253 characters, got {})",
            name.len()
        ));
    }
    if name.starts_with('.') {
        return Err(anyhow!("Record name cannot start with a dot"));
    }

    for label in name.split('.') {
        validate_label(label)?;
    }
    Ok(())
}

/// Validates one domain filter entry
///
/// Same rules as [`validate_record_name`], except that a single leading dot
/// is allowed (subdomain-only filters) and `@` is rejected.
pub fn validate_domain_filter(entry: &str) -> Result<()> {
    let trimmed = entry.trim();
    let name = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if name == "@" {
        return Err(anyhow!("Domain filter '{}' is not a domain name", entry));
    }
    validate_record_name(name).map_err(|e| anyhow!("Invalid domain filter '{}': {}", entry, e))
}

fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(anyhow!("Record name cannot contain consecutive dots"));
    }
    if label == "*" {
        return Ok(());
    }
    if label.len() > 63 {
        return Err(anyhow!(
            "Record name label too long (max 63 characters, got {})",
            label.len()
        ));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(anyhow!("Record name label cannot start or end with hyphen"));
    }
    if let Some(ch) = label
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '-' && *ch != '_')
    {
        return Err(anyhow!(
            "Record name contains invalid character: '{}' (allowed: letters, digits, '-', '_', or wildcard labels)",
            ch
        ));
    }
    Ok(())
}
