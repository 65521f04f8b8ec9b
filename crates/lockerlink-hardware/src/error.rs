//! Error types for device I/O.
//!
//! Protocol problems live in [`lockerlink_core::Error`]; this module covers
//! what can go wrong between the host and a physical device: resolving a
//! hotplug symlink, opening the port, reading and writing it, and watching
//! the device directory.

use std::path::{Path, PathBuf};

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The process may not open the device node.
    #[error("Access to port '{}' is denied", path.display())]
    AccessDenied { path: PathBuf },

    /// A hotplug symlink could not be resolved to a device node.
    #[error("Cannot resolve '{}': {reason}", path.display())]
    Resolve { path: PathBuf, reason: String },

    /// The device node exists but the port could not be opened.
    #[error("Failed to open port '{}': {reason}", path.display())]
    PortOpen { path: PathBuf, reason: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// No tracked device has the requested identity.
    #[error("Device with serial number '{identity}' not found")]
    DeviceNotFound { identity: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// A filesystem watch could not be established.
    #[error("Cannot watch '{}': {reason}", path.display())]
    Watch { path: PathBuf, reason: String },

    /// Device configuration error.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Locker protocol error.
    #[error(transparent)]
    Protocol(#[from] lockerlink_core::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn resolve(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Resolve {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn port_open(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::PortOpen {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn device_not_found(identity: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            identity: identity.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    pub fn watch(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Watch {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Map an error from opening a serial port at `path`.
    pub fn from_serial(path: impl AsRef<Path>, error: tokio_serial::Error) -> Self {
        let path = path.as_ref();
        match error.kind {
            tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                Self::AccessDenied {
                    path: path.to_path_buf(),
                }
            }
            tokio_serial::ErrorKind::NoDevice => Self::resolve(path, error.description),
            _ => Self::port_open(path, error.description),
        }
    }

    /// Whether the error came from the operating system refusing access.
    pub fn is_access_denied(&self) -> bool {
        match self {
            Self::AccessDenied { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}
