//! Fakes for the identity and token seams, shared by unit tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::device::interfaces::{InterfaceSource, NetworkInterface};
use crate::device::serial::SerialProbe;
use crate::device::ResolutionError;
use crate::token::{TokenFetchError, TokenIssuer};
use crate::types::{DeviceToken, MachineIdentity, Platform};

pub struct FakeInterfaces {
    interfaces: Vec<NetworkInterface>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeInterfaces {
    pub fn new(entries: &[(&str, &str, bool)]) -> Self {
        let interfaces = entries
            .iter()
            .map(|(name, mac, up)| NetworkInterface {
                name: name.to_string(),
                mac: Some(mac.parse().unwrap()),
                up: *up,
            })
            .collect();

        Self {
            interfaces,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InterfaceSource for FakeInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.interfaces.clone())
    }
}

pub struct FakeSerial {
    serial: Option<String>,
    delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl FakeSerial {
    pub fn ok(serial: &str) -> Self {
        Self {
            serial: Some(serial.to_string()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty() -> Self {
        Self {
            serial: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SerialProbe for FakeSerial {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    async fn serial_number(&self) -> Result<String, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.serial.clone().ok_or_else(|| ResolutionError::EmptySerial {
            command: "fake".to_string(),
        })
    }
}

/// Issues `token-<n>` valid for `ttl`, or fails while `failing` is set
pub struct FakeIssuer {
    ttl: ChronoDuration,
    delay: Duration,
    failing: std::sync::atomic::AtomicBool,
    pub calls: Arc<AtomicUsize>,
}

impl FakeIssuer {
    pub fn new() -> Self {
        Self {
            ttl: ChronoDuration::hours(1),
            delay: Duration::ZERO,
            failing: std::sync::atomic::AtomicBool::new(false),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_ttl(mut self, ttl: ChronoDuration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for FakeIssuer {
    async fn issue(&self, _identity: &MachineIdentity) -> Result<DeviceToken, TokenFetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(TokenFetchError::MalformedResponse("issuer unavailable".to_string()));
        }

        Ok(DeviceToken {
            token: format!("token-{}", n),
            expires_at: Utc::now() + self.ttl,
        })
    }
}

pub fn identity() -> MachineIdentity {
    MachineIdentity {
        mac_address: "aa:bb:cc:dd:ee:ff".to_string(),
        serial_number: Some("ABC123".to_string()),
    }
}
