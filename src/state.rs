use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{Config, ResponseTokenField};
use crate::device::IdentityResolver;
use crate::token::{HttpTokenIssuer, TokenCache};
use crate::types::Platform;

/// Process state shared by all request handlers
#[derive(Clone)]
pub struct AppContext {
    pub identity: Arc<IdentityResolver>,
    pub tokens: Arc<TokenCache>,
    pub token_field: ResponseTokenField,
}

impl AppContext {
    pub fn new(identity: IdentityResolver, tokens: TokenCache, token_field: ResponseTokenField) -> Self {
        Self {
            identity: Arc::new(identity),
            tokens: Arc::new(tokens),
            token_field,
        }
    }

    /// Wire the real OS probes and HTTP issuer from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let identity = IdentityResolver::from_config(&config.identity, Platform::current());

        let issuer = HttpTokenIssuer::new(&config.issuer, config.identity.device_id)
            .context("Failed to create token issuer client")?;

        Ok(Self::new(
            identity,
            TokenCache::new(Arc::new(issuer)),
            config.response.token_field,
        ))
    }

    pub fn platform(&self) -> Platform {
        self.identity.platform()
    }
}
