use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;

/// Operating system family the daemon was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
    Other(&'static str),
}

impl Platform {
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &'static str) -> Self {
        match os {
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            other => Platform::Other(other),
        }
    }

    /// Interface names that carry the machine's primary MAC on this platform
    pub fn canonical_interfaces(&self) -> &'static [&'static str] {
        match self {
            Platform::MacOs => &["en0"],
            Platform::Windows => &["Ethernet"],
            Platform::Linux => &["eth0", "enp0s3"],
            Platform::Other(_) => &[],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macos"),
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
            Platform::Other(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineIdentity {
    pub mac_address: String,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Short prefix safe to put in logs
    pub fn redacted(&self) -> String {
        let prefix: String = self.token.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

/// Envelope returned by the token-issuing endpoint.
/// `data` is kept untyped because its field names are configurable.
#[derive(Debug, Deserialize)]
pub struct TokenEnvelope {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}
