use std::time::Duration;
use thiserror::Error;

/// Failure to determine some part of the machine identity
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no usable MAC address")]
    NoUsableMac,

    #[error("failed to enumerate network interfaces: {0}")]
    InterfaceProbe(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{command} did not finish within {limit:?}")]
    Timeout { command: String, limit: Duration },

    #[error("failed to get serial number: empty output from {command}")]
    EmptySerial { command: String },
}
