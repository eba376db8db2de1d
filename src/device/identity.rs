use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::IdentityConfig;
use crate::device::interfaces::{format_mac, select_mac, InterfaceSource, SystemInterfaces};
use crate::device::serial::{probe_for, SerialProbe};
use crate::device::ResolutionError;
use crate::types::{MachineIdentity, Platform};

/// Resolves and caches the identity of this machine.
///
/// The first successful resolution is kept for the lifetime of the
/// resolver. Failures are not cached, so the next call probes again.
pub struct IdentityResolver {
    interfaces: Box<dyn InterfaceSource>,
    serial: Box<dyn SerialProbe>,
    preferred: Vec<String>,
    serial_required: bool,
    cached: OnceCell<MachineIdentity>,
}

impl IdentityResolver {
    pub fn new(
        interfaces: Box<dyn InterfaceSource>,
        serial: Box<dyn SerialProbe>,
        preferred: Vec<String>,
        serial_required: bool,
    ) -> Self {
        Self {
            interfaces,
            serial,
            preferred,
            serial_required,
            cached: OnceCell::new(),
        }
    }

    /// Resolver backed by the real OS for `platform`
    pub fn from_config(config: &IdentityConfig, platform: Platform) -> Self {
        let preferred = if config.preferred_interfaces.is_empty() {
            platform
                .canonical_interfaces()
                .iter()
                .map(|name| name.to_string())
                .collect()
        } else {
            config.preferred_interfaces.clone()
        };

        let serial_required = config.require_serial || config.device_id.needs_serial();

        Self::new(
            Box::new(SystemInterfaces),
            probe_for(platform, Duration::from_secs(config.command_timeout_secs)),
            preferred,
            serial_required,
        )
    }

    pub fn platform(&self) -> Platform {
        self.serial.platform()
    }

    pub fn cached(&self) -> Option<&MachineIdentity> {
        self.cached.get()
    }

    pub async fn resolve(&self) -> Result<MachineIdentity, ResolutionError> {
        self.cached
            .get_or_try_init(|| self.probe())
            .await
            .cloned()
    }

    pub fn mac_address(&self) -> Result<String, ResolutionError> {
        let interfaces = self.interfaces.interfaces()?;
        select_mac(&interfaces, &self.preferred)
            .map(|mac| format_mac(&mac))
            .ok_or(ResolutionError::NoUsableMac)
    }

    pub async fn serial_number(&self) -> Result<String, ResolutionError> {
        self.serial.serial_number().await
    }

    async fn probe(&self) -> Result<MachineIdentity, ResolutionError> {
        let mac_address = self.mac_address()?;

        let serial_number = match self.serial_number().await {
            Ok(serial) => Some(serial),
            Err(e) if self.serial_required => return Err(e),
            Err(e) => {
                warn!("Serial number unavailable, continuing without it: {}", e);
                None
            }
        };

        info!(
            "Machine identity resolved: mac={} serial={}",
            mac_address,
            serial_number.as_deref().unwrap_or("-")
        );

        Ok(MachineIdentity {
            mac_address,
            serial_number,
        })
    }
}
