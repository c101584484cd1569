//! Common constants used throughout the clouddns-webhook application

use std::time::Duration;

//==============================================================================
// Rackspace API Constants
//==============================================================================

/// Default Rackspace identity (Keystone v2) endpoint
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identity.api.rackspacecloud.com/v2.0/";

/// Service catalog type of the Cloud DNS service
pub const DNS_SERVICE_TYPE: &str = "rax:dns";

/// User agent string for Rackspace API requests
pub const USER_AGENT: &str = "clouddns-webhook/1.0";

/// Header carrying the session token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Page size requested from list endpoints
pub const PAGE_LIMIT: usize = 100;

/// Delay between polls of an asynchronous DNS job
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum number of polls of an asynchronous DNS job
pub const JOB_MAX_POLLS: u32 = 30;

//==============================================================================
// Record Constants
//==============================================================================

/// Minimum TTL accepted by Cloud DNS, also used when no TTL is configured
pub const MIN_TTL_SECS: i64 = 300;

/// Record type for TXT records
pub const RECORD_TYPE_TXT: &str = "TXT";

/// Record types this webhook never manages
pub const UNMANAGED_RECORD_TYPES: [&str; 2] = ["NS", "SOA"];

/// Longest record comment Cloud DNS accepts
pub const MAX_COMMENT_LEN: usize = 160;

//==============================================================================
// Credential Constants
//==============================================================================

/// Session lifetime assumed when identity does not report an expiry
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(4 * 60 * 60);

/// How long before expiry a session is refreshed
pub const SESSION_REFRESH_MARGIN: Duration = Duration::from_secs(60 * 60);

/// Upper bound on the initial authentication at startup
pub const INITIAL_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

//==============================================================================
// Webhook Constants
//==============================================================================

/// Media type required by the external-dns webhook contract
pub const WEBHOOK_CONTENT_TYPE: &str = "application/external.dns.webhook+json;version=1";

/// Default listen address for the webhook server
///
/// Loopback only, for running next to external-dns in the same pod. A
/// standalone deployment behind a Service needs `LISTEN_ADDRESS=0.0.0.0`.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

/// Default listen port for the webhook server
pub const DEFAULT_PORT: u16 = 8888;

//==============================================================================
// Timeout Constants
//==============================================================================

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Minimum HTTP request timeout in seconds
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Maximum HTTP request timeout in seconds
pub const MAX_TIMEOUT_SECS: u64 = 300;

//==============================================================================
// Environment Variable Names
//==============================================================================

/// Environment variable name for the Rackspace username
pub const ENV_USERNAME: &str = "RACKSPACE_USERNAME";

/// Environment variable name for the Rackspace API key
pub const ENV_API_KEY: &str = "RACKSPACE_API_KEY";

/// Environment variable name for the identity endpoint
pub const ENV_IDENTITY_ENDPOINT: &str = "RACKSPACE_IDENTITY_ENDPOINT";

/// Environment variable name for the tenant id
pub const ENV_TENANT_ID: &str = "RACKSPACE_TENANT_ID";

/// Environment variable name for the comma separated domain filter
pub const ENV_DOMAIN_FILTER: &str = "DOMAIN_FILTER";

/// Environment variable name for the comma separated excluded domains
pub const ENV_EXCLUDE_DOMAINS: &str = "EXCLUDE_DOMAINS";

/// Environment variable name for dry-run mode
pub const ENV_DRY_RUN: &str = "DRY_RUN";

/// Environment variable name for the log level
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Environment variable name for the listen address
pub const ENV_LISTEN_ADDRESS: &str = "LISTEN_ADDRESS";

/// Environment variable name for the listen port
pub const ENV_PORT: &str = "PORT";

/// Environment variable name for the HTTP timeout in seconds
pub const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT";
