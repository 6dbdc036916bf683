use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },

    #[error("Invalid config: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Expected a {expected} byte payload, got {actual} bytes")]
    Length { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("A required bluetooth characteristic is not available")]
    MissingCharacteristic,

    #[error("Connecting to the device timed out")]
    ConnectTimeout,

    #[error("The link to the device was lost")]
    LinkLost,

    #[error("Not connected to a device")]
    NotConnected,

    #[error("{operation} took too long")]
    Deadline { operation: &'static str },

    #[error("Failed to decode payload: {source}")]
    Decode { #[from] source: DecodeError },
}

impl DeviceError {
    /// Adapter/radio level failures, as opposed to per-device or per-payload errors.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, DeviceError::Btle { .. } | DeviceError::NoAdapter)
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Device session failed: {source}")]
    DeviceError { #[from] source: DeviceError },

    #[error("Scanning for devices failed: {message}")]
    ScanFailed { message: String },

    #[error("Failed to start async runtime: {source}")]
    Runtime { #[from] source: io::Error },
}
