//! Configuration module for clouddns-webhook
//!
//! This module handles loading and validating configuration from files and environment variables.

use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use reqwest::Url;
use zeroize::Zeroizing;

use crate::constants::{
    DEFAULT_IDENTITY_ENDPOINT, DEFAULT_LISTEN_ADDRESS, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
    ENV_API_KEY, ENV_DOMAIN_FILTER, ENV_DRY_RUN, ENV_EXCLUDE_DOMAINS, ENV_HTTP_TIMEOUT,
    ENV_IDENTITY_ENDPOINT, ENV_LISTEN_ADDRESS, ENV_LOG_LEVEL, ENV_PORT, ENV_TENANT_ID,
    ENV_USERNAME, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
use crate::endpoint::DomainFilter;
use crate::validation::validate_domain_filter;

//==============================================================================
// Config
//==============================================================================

/// Configuration for the webhook
///
/// Loaded from an optional TOML file, then overridden by non-empty
/// environment variables, then validated. The API key is wrapped in
/// `Zeroizing` so it is cleared from memory when dropped, and never appears
/// in `Debug` output.
#[derive(Clone)]
pub struct Config {
    /// Rackspace account username (`RACKSPACE_USERNAME`)
    pub username: String,
    /// Rackspace API key (`RACKSPACE_API_KEY`)
    pub api_key: Zeroizing<String>,
    /// Identity v2 endpoint (`RACKSPACE_IDENTITY_ENDPOINT`)
    pub identity_endpoint: String,
    /// Tenant to authenticate as, when the account has several
    pub tenant_id: Option<String>,
    /// Suffixes of the names this webhook manages; empty means all
    pub domain_filter: Vec<String>,
    /// Suffixes excluded from `domain_filter`
    pub exclude_domains: Vec<String>,
    /// Log intended changes without applying them
    pub dry_run: bool,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
    pub listen_address: String,
    pub port: u16,
    /// HTTP request timeout for identity and Cloud DNS calls
    pub timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("identity_endpoint", &self.identity_endpoint)
            .field("tenant_id", &self.tenant_id)
            .field("domain_filter", &self.domain_filter)
            .field("exclude_domains", &self.exclude_domains)
            .field("dry_run", &self.dry_run)
            .field("log_level", &self.log_level)
            .field("listen_address", &self.listen_address)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_key: Zeroizing::new(String::new()),
            identity_endpoint: DEFAULT_IDENTITY_ENDPOINT.to_string(),
            tenant_id: None,
            domain_filter: Vec::new(),
            exclude_domains: Vec::new(),
            dry_run: false,
            log_level: "info".to_string(),
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Loads configuration from file and environment variables
    ///
    /// 1. Loads from the specified config file (if provided and exists)
    /// 2. Overrides with environment variables (if set and non-empty)
    /// 3. Validates the final configuration
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load_from_file(config_path)?;
        Self::override_with_env(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Loads configuration from a TOML file, with defaults for missing fields
    fn load_from_file(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let Some(path) = config_path else {
            return Ok(config);
        };
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let toml_config: TomlConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;

        if let Some(v) = toml_config.username {
            config.username = v;
        }
        if let Some(v) = toml_config.api_key {
            config.api_key = Zeroizing::new(v);
        }
        if let Some(v) = toml_config.identity_endpoint {
            config.identity_endpoint = v;
        }
        config.tenant_id = toml_config.tenant_id.filter(|t| !t.trim().is_empty());
        if let Some(v) = toml_config.domain_filter {
            config.domain_filter = v;
        }
        if let Some(v) = toml_config.exclude_domains {
            config.exclude_domains = v;
        }
        if let Some(v) = toml_config.dry_run {
            config.dry_run = v;
        }
        if let Some(v) = toml_config.log_level {
            config.log_level = v;
        }
        if let Some(v) = toml_config.listen_address {
            config.listen_address = v;
        }
        if let Some(v) = toml_config.port {
            config.port = v;
        }
        if let Some(v) = toml_config.timeout {
            config.timeout = Duration::from_secs(v);
        }
        Ok(config)
    }

    /// Overrides configuration values with non-empty environment variables
    fn override_with_env(config: &mut Self) -> Result<()> {
        if let Some(v) = env_value(ENV_USERNAME) {
            config.username = v;
        }
        if let Some(v) = env_value(ENV_API_KEY) {
            config.api_key = Zeroizing::new(v);
        }
        if let Some(v) = env_value(ENV_IDENTITY_ENDPOINT) {
            config.identity_endpoint = v;
        }
        if let Some(v) = env_value(ENV_TENANT_ID) {
            config.tenant_id = Some(v);
        }
        if let Some(v) = env_value(ENV_DOMAIN_FILTER) {
            config.domain_filter = split_list(&v);
        }
        if let Some(v) = env_value(ENV_EXCLUDE_DOMAINS) {
            config.exclude_domains = split_list(&v);
        }
        if let Some(v) = env_value(ENV_DRY_RUN) {
            config.dry_run =
                parse_bool_env(&v).with_context(|| format!("Invalid {} value", ENV_DRY_RUN))?;
        }
        if let Some(v) = env_value(ENV_LOG_LEVEL) {
            config.log_level = v;
        }
        if let Some(v) = env_value(ENV_LISTEN_ADDRESS) {
            config.listen_address = v;
        }
        if let Some(v) = env_value(ENV_PORT) {
            config.port = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value", ENV_PORT))?;
        }
        if let Some(v) = env_value(ENV_HTTP_TIMEOUT) {
            let secs: u64 = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value", ENV_HTTP_TIMEOUT))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Validates the configuration
    ///
    /// Fails when credentials are missing, the identity endpoint is not an
    /// http(s) URL, a domain filter entry is not a DNS name, the listen
    /// address is not an IP address, or the timeout is out of range.
    fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(anyhow!("Missing {}", ENV_USERNAME));
        }
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("Missing {}", ENV_API_KEY));
        }

        let url = Url::parse(&self.identity_endpoint).with_context(|| {
            format!(
                "{} is not a valid URL: {}",
                ENV_IDENTITY_ENDPOINT, self.identity_endpoint
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "{} must be an http(s) URL, got: {}",
                ENV_IDENTITY_ENDPOINT,
                self.identity_endpoint
            ));
        }

        for entry in self.domain_filter.iter().chain(&self.exclude_domains) {
            validate_domain_filter(entry)?;
        }

        self.listen_addr()?;

        let timeout_secs = self.timeout.as_secs();
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(anyhow!(
                "timeout must be between {} and {} seconds, got {}",
                MIN_TIMEOUT_SECS,
                MAX_TIMEOUT_SECS,
                timeout_secs
            ));
        }

        Ok(())
    }

    /// Socket address the webhook server binds
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .listen_address
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .with_context(|| {
                format!(
                    "{} must be an IP address, got: {}",
                    ENV_LISTEN_ADDRESS, self.listen_address
                )
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The configured include/exclude suffixes as a filter
    pub fn domain_filter(&self) -> DomainFilter {
        DomainFilter::with_exclusions(&self.domain_filter, &self.exclude_domains)
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a boolean value from an environment variable
///
/// Accepts "1", "true", "yes", "on" and "0", "false", "no", "off".
fn parse_bool_env(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("expected boolean (true/false/1/0/yes/no/on/off)")),
    }
}

/// TOML configuration file structure
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    username: Option<String>,
    api_key: Option<String>,
    identity_endpoint: Option<String>,
    tenant_id: Option<String>,
    domain_filter: Option<Vec<String>>,
    exclude_domains: Option<Vec<String>>,
    dry_run: Option<bool>,
    log_level: Option<String>,
    listen_address: Option<String>,
    port: Option<u16>,
    timeout: Option<u64>,
}

//==============================================================================
// Tests
//==============================================================================
