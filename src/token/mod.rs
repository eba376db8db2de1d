pub mod cache;
pub mod client;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use cache::TokenCache;
pub use client::{HttpTokenIssuer, TokenIssuer};

#[derive(Debug, Error)]
pub enum TokenFetchError {
    #[error("token request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token issuer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("issued token already expired at {0}")]
    AlreadyExpired(DateTime<Utc>),

    #[error("identity has no serial number, required by device id source `{0}`")]
    MissingSerial(&'static str),
}
