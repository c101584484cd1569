//! Credential cache
//!
//! Holds the authenticated Cloud DNS session shared by every request and
//! re-authenticates lazily when the session is close to expiry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::constants::{DEFAULT_SESSION_LIFETIME, INITIAL_AUTH_TIMEOUT, SESSION_REFRESH_MARGIN};
use crate::dns_client::DnsClient;
use crate::error::{Error, Result};
use crate::metrics;

//==============================================================================
// Types
//==============================================================================

/// An authenticated client and the time its token stops being valid
#[derive(Clone)]
pub struct Session {
    pub client: Arc<dyn DnsClient>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(client: Arc<dyn DnsClient>, expires_at: DateTime<Utc>) -> Self {
        Self { client, expires_at }
    }

    /// Session for a token whose expiry identity did not report
    pub fn with_default_lifetime(client: Arc<dyn DnsClient>) -> Self {
        Self::new(client, Utc::now() + to_chrono(DEFAULT_SESSION_LIFETIME))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Produces new sessions from the account secrets
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<Session>;
}

//==============================================================================
// Cache
//==============================================================================

/// Shared, lazily refreshed session
///
/// Fresh sessions are handed out under a read lock. A session within the
/// refresh margin of its expiry is replaced under the write lock, so at most
/// one refresh runs at a time. If the refresh fails the previous client is
/// returned and the caller sees the provider's authentication error instead.
pub struct CredentialCache {
    authenticator: Arc<dyn Authenticator>,
    session: RwLock<Session>,
    refresh_margin: chrono::Duration,
}

impl CredentialCache {
    /// Authenticates once, bounded by [`INITIAL_AUTH_TIMEOUT`]
    pub async fn new(authenticator: Arc<dyn Authenticator>) -> Result<Self> {
        let session = tokio::time::timeout(INITIAL_AUTH_TIMEOUT, authenticator.authenticate())
            .await
            .map_err(|_| {
                Error::auth(format!(
                    "initial authentication timed out after {}s",
                    INITIAL_AUTH_TIMEOUT.as_secs()
                ))
            })??;
        info!("Authenticated, session expires at {}", session.expires_at);
        Ok(Self::from_session(authenticator, session))
    }

    /// Wraps an existing session without contacting identity
    pub fn from_session(authenticator: Arc<dyn Authenticator>, session: Session) -> Self {
        Self {
            authenticator,
            session: RwLock::new(session),
            refresh_margin: to_chrono(SESSION_REFRESH_MARGIN),
        }
    }

    /// Returns a client for the current session, refreshing it first if it
    /// is within the refresh margin of expiry
    pub async fn client(&self) -> Arc<dyn DnsClient> {
        {
            let session = self.session.read().await;
            if !self.needs_refresh(&session) {
                return Arc::clone(&session.client);
            }
        }

        let mut session = self.session.write().await;
        // another task may have refreshed while we waited for the write lock
        if !self.needs_refresh(&session) {
            return Arc::clone(&session.client);
        }

        debug!("Session expires at {}, refreshing", session.expires_at);
        match self.authenticator.authenticate().await {
            Ok(fresh) => {
                info!("Refreshed session, expires at {}", fresh.expires_at);
                metrics::record_token_refresh("success");
                *session = fresh;
            }
            Err(e) => {
                error!("Failed to refresh session, keeping previous token: {}", e);
                metrics::record_token_refresh("failure");
            }
        }
        Arc::clone(&session.client)
    }

    fn needs_refresh(&self, session: &Session) -> bool {
        Utc::now() >= session.expires_at - self.refresh_margin
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::seconds(duration.as_secs() as i64)
}

//==============================================================================
// Tests
//==============================================================================
