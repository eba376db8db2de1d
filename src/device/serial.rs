use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::device::ResolutionError;
use crate::types::Platform;

/// Reads the BIOS / hardware serial number of this machine
#[async_trait]
pub trait SerialProbe: Send + Sync {
    fn platform(&self) -> Platform;

    async fn serial_number(&self) -> Result<String, ResolutionError>;
}

/// Select the probe for `platform`
pub fn probe_for(platform: Platform, command_timeout: Duration) -> Box<dyn SerialProbe> {
    match platform {
        Platform::MacOs => Box::new(MacSerial { command_timeout }),
        Platform::Windows => Box::new(WindowsSerial { command_timeout }),
        Platform::Linux => Box::new(LinuxSerial { command_timeout }),
        Platform::Other(name) => Box::new(UnsupportedSerial { name }),
    }
}

pub struct MacSerial {
    command_timeout: Duration,
}

pub struct WindowsSerial {
    command_timeout: Duration,
}

pub struct LinuxSerial {
    command_timeout: Duration,
}

pub struct UnsupportedSerial {
    name: &'static str,
}

#[async_trait]
impl SerialProbe for MacSerial {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn serial_number(&self) -> Result<String, ResolutionError> {
        let command = "system_profiler";
        let stdout = run_inventory(command, &["SPHardwareDataType"], self.command_timeout).await?;
        parse_system_profiler(&stdout).ok_or_else(|| empty(command))
    }
}

#[async_trait]
impl SerialProbe for WindowsSerial {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn serial_number(&self) -> Result<String, ResolutionError> {
        let command = "wmic";
        let stdout = run_inventory(command, &["bios", "get", "serialnumber"], self.command_timeout).await?;
        parse_wmic(&stdout).ok_or_else(|| empty(command))
    }
}

#[async_trait]
impl SerialProbe for LinuxSerial {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    // dmidecode needs root to read the SMBIOS tables
    async fn serial_number(&self) -> Result<String, ResolutionError> {
        let stdout = run_inventory(
            "sudo",
            &["dmidecode", "-s", "system-serial-number"],
            self.command_timeout,
        )
        .await?;
        parse_dmidecode(&stdout).ok_or_else(|| empty("dmidecode"))
    }
}

#[async_trait]
impl SerialProbe for UnsupportedSerial {
    fn platform(&self) -> Platform {
        Platform::Other(self.name)
    }

    async fn serial_number(&self) -> Result<String, ResolutionError> {
        Err(ResolutionError::UnsupportedPlatform(self.name.to_string()))
    }
}

fn empty(command: &str) -> ResolutionError {
    ResolutionError::EmptySerial {
        command: command.to_string(),
    }
}

/// Run an inventory command and return its stdout.
///
/// The child is killed if it outlives `limit`.
pub(crate) async fn run_inventory(
    program: &str,
    args: &[&str],
    limit: Duration,
) -> Result<String, ResolutionError> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Running {}", command);

    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    let output = match timeout(limit, cmd.output()).await {
        Ok(result) => result.map_err(|source| ResolutionError::Spawn {
            command: command.clone(),
            source,
        })?,
        Err(_) => {
            return Err(ResolutionError::Timeout { command, limit })
        }
    };

    if !output.status.success() {
        return Err(ResolutionError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parse: `      Serial Number (system): C02XXXXXXXXX`
pub fn parse_system_profiler(stdout: &str) -> Option<String> {
    let line = stdout.lines().find(|line| line.contains("Serial Number"))?;
    let serial = line.split_once(':')?.1.trim();
    non_empty(serial)
}

/// Header line followed by the value
pub fn parse_wmic(stdout: &str) -> Option<String> {
    non_empty(stdout.lines().nth(1)?.trim())
}

pub fn parse_dmidecode(stdout: &str) -> Option<String> {
    non_empty(stdout.trim())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
