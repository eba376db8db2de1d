use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8699;
pub const DEFAULT_ISSUER_URL: &str =
    "https://dev-online-gateway.ghn.vn/sso-v2/public-api/staff/gen-device-token";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub issuer: IssuerConfig,
    pub identity: IdentityConfig,
    pub response: ResponseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS; empty means any origin
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IssuerConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Field inside the response `data` object holding the token
    pub token_field: String,
    /// Field inside the response `data` object holding the expiry
    pub expiry_field: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub device_id: DeviceIdSource,
    pub require_serial: bool,
    pub command_timeout_secs: u64,
    /// Overrides the platform's canonical interface names when non-empty
    pub preferred_interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub token_field: ResponseTokenField,
}

/// What gets sent as `device_id` to the token issuer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceIdSource {
    #[default]
    Mac,
    Serial,
    MacSerial,
    Fingerprint,
}

impl DeviceIdSource {
    pub fn needs_serial(&self) -> bool {
        matches!(self, DeviceIdSource::Serial | DeviceIdSource::Fingerprint)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceIdSource::Mac => "mac",
            DeviceIdSource::Serial => "serial",
            DeviceIdSource::MacSerial => "mac_serial",
            DeviceIdSource::Fingerprint => "fingerprint",
        }
    }
}

/// Name of the token field in the served JSON body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTokenField {
    #[default]
    DeviceToken,
    Token,
}

impl ResponseTokenField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseTokenField::DeviceToken => "device_token",
            ResponseTokenField::Token => "token",
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ISSUER_URL.to_string(),
            timeout_secs: 30,
            token_field: "device_token".to_string(),
            expiry_field: "expired_time".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceIdSource::Mac,
            require_serial: false,
            command_timeout_secs: 10,
            preferred_interfaces: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            Self::load(path)
        } else {
            info!("No configuration at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".devtokend")
            .join("config.toml")
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DEVTOKEND_ISSUER_URL") {
            self.issuer.url = url;
        }

        if let Some(port) = lookup("DEVTOKEND_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(e) => warn!("Ignoring DEVTOKEND_PORT={:?}: {}", port, e),
            }
        }
    }
}
