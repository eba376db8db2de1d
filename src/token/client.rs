use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{DeviceIdSource, IssuerConfig};
use crate::token::TokenFetchError;
use crate::types::{DeviceToken, MachineIdentity, TokenEnvelope};

/// Exchanges a machine identity for a fresh device token
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, identity: &MachineIdentity) -> Result<DeviceToken, TokenFetchError>;
}

#[derive(Debug, Serialize, PartialEq)]
struct DeviceTokenRequest {
    device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<String>,
}

pub struct HttpTokenIssuer {
    client: reqwest::Client,
    url: String,
    device_id: DeviceIdSource,
    token_field: String,
    expiry_field: String,
}

impl HttpTokenIssuer {
    pub fn new(config: &IssuerConfig, device_id: DeviceIdSource) -> Result<Self, TokenFetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            device_id,
            token_field: config.token_field.clone(),
            expiry_field: config.expiry_field.clone(),
        })
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, identity: &MachineIdentity) -> Result<DeviceToken, TokenFetchError> {
        let request = build_request(identity, self.device_id)?;

        info!("📡 Requesting device token from {}", self.url);
        debug!("Token request body: {:?}", request);

        let response = self.client
            .post(&self.url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(TokenFetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        let token = decode_envelope(&body, &self.token_field, &self.expiry_field)?;

        info!("✅ Device token issued: {} (expires {})", token.redacted(), token.expires_at);

        Ok(token)
    }
}

fn build_request(
    identity: &MachineIdentity,
    source: DeviceIdSource,
) -> Result<DeviceTokenRequest, TokenFetchError> {
    let serial = || {
        identity
            .serial_number
            .clone()
            .ok_or(TokenFetchError::MissingSerial(source.as_str()))
    };

    let request = match source {
        DeviceIdSource::Mac => DeviceTokenRequest {
            device_id: identity.mac_address.clone(),
            serial_number: None,
        },
        DeviceIdSource::Serial => DeviceTokenRequest {
            device_id: serial()?,
            serial_number: None,
        },
        DeviceIdSource::MacSerial => DeviceTokenRequest {
            device_id: identity.mac_address.clone(),
            serial_number: identity.serial_number.clone(),
        },
        DeviceIdSource::Fingerprint => DeviceTokenRequest {
            device_id: fingerprint(&identity.mac_address, &serial()?),
            serial_number: None,
        },
    };

    Ok(request)
}

/// SHA-256 of the MAC address followed by the serial number, hex encoded
pub fn fingerprint(mac_address: &str, serial_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mac_address.as_bytes());
    hasher.update(serial_number.as_bytes());
    hex::encode(hasher.finalize())
}

fn decode_envelope(
    body: &[u8],
    token_field: &str,
    expiry_field: &str,
) -> Result<DeviceToken, TokenFetchError> {
    let envelope: TokenEnvelope = serde_json::from_slice(body)
        .map_err(|e| TokenFetchError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let missing = |what: &str| {
        TokenFetchError::MalformedResponse(format!(
            "{} (code {}, message {:?})",
            what, envelope.code, envelope.message
        ))
    };

    let token = envelope
        .data
        .get(token_field)
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| missing(&format!("missing data.{}", token_field)))?
        .to_string();

    let expiry = envelope
        .data
        .get(expiry_field)
        .ok_or_else(|| missing(&format!("missing data.{}", expiry_field)))?;

    let expires_at: DateTime<Utc> = serde_json::from_value(expiry.clone())
        .map_err(|e| missing(&format!("invalid data.{}: {}", expiry_field, e)))?;

    Ok(DeviceToken { token, expires_at })
}
