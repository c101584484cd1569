//! clouddns-webhook - external-dns webhook provider for Rackspace Cloud DNS
//!
//! Architecture:
//! - Credential cache holding one Identity session, refreshed lazily before expiry
//! - Zone resolution by label-aware longest-suffix match
//! - Endpoint normalization at the external-dns boundary
//! - Record synchronization with delete, create, update ordering and aggregated failures
//! - axum server speaking the external-dns webhook protocol
//! - Uses reqwest for HTTP (rustls)

pub mod clouddns;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dns_client;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod provider;
pub mod server;
pub mod sync;
pub mod validation;
pub mod zones;

pub use error::{Error, Result};
