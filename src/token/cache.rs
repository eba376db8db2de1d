use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::token::{TokenFetchError, TokenIssuer};
use crate::types::{DeviceToken, MachineIdentity};

/// Holds the last issued device token and refreshes it on demand.
///
/// The slot lock is held across the refresh, so concurrent callers that
/// find the token expired wait for one outbound request instead of each
/// issuing their own. `latest` mirrors the slot for readers that must not
/// wait on an outbound request.
pub struct TokenCache {
    issuer: Arc<dyn TokenIssuer>,
    slot: Mutex<Option<DeviceToken>>,
    latest: RwLock<Option<DeviceToken>>,
}

impl TokenCache {
    pub fn new(issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            issuer,
            slot: Mutex::new(None),
            latest: RwLock::new(None),
        }
    }

    /// Return the cached token if still valid, otherwise fetch a new one
    pub async fn get_token(&self, identity: &MachineIdentity) -> Result<DeviceToken, TokenFetchError> {
        let mut slot = self.slot.lock().await;

        match slot.as_ref() {
            Some(token) if token.is_valid_at(Utc::now()) => {
                debug!("Serving cached token {}", token.redacted());
                return Ok(token.clone());
            }
            Some(token) => info!("Token {} expired at {}, refreshing", token.redacted(), token.expires_at),
            None => info!("No device token cached, fetching"),
        }

        self.fetch_into(&mut slot, identity).await
    }

    /// Fetch a new token regardless of the cached one
    pub async fn refresh(&self, identity: &MachineIdentity) -> Result<DeviceToken, TokenFetchError> {
        let mut slot = self.slot.lock().await;
        self.fetch_into(&mut slot, identity).await
    }

    /// Cached token without refreshing, expired or not.
    ///
    /// Does not wait for a refresh in flight.
    pub async fn peek(&self) -> Option<DeviceToken> {
        self.latest.read().await.clone()
    }

    async fn fetch_into(
        &self,
        slot: &mut Option<DeviceToken>,
        identity: &MachineIdentity,
    ) -> Result<DeviceToken, TokenFetchError> {
        let fresh = match self.issuer.issue(identity).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Device token fetch failed: {}", e);
                return Err(e);
            }
        };

        if !fresh.is_valid_at(Utc::now()) {
            warn!("Issuer returned a token that expired at {}", fresh.expires_at);
            return Err(TokenFetchError::AlreadyExpired(fresh.expires_at));
        }

        *slot = Some(fresh.clone());
        *self.latest.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    #[cfg(test)]
    pub(crate) async fn store(&self, token: DeviceToken) {
        *self.slot.lock().await = Some(token.clone());
        *self.latest.write().await = Some(token);
    }
}
