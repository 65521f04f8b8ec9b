//! Serial transport abstraction.
//!
//! The registry and the locker controller talk to ports through
//! [`BoxedSerialIo`], so tests can substitute in-memory pipes for real
//! device nodes. [`SerialPortOpener`] opens real ports with `tokio-serial`.

use crate::error::{HardwareError, Result};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::debug;

/// Byte stream to a device.
pub trait SerialIo: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> SerialIo for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased serial stream.
pub type BoxedSerialIo = Box<dyn SerialIo>;

/// Line settings used when opening a port. Data format is always 8N1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    pub baud_rate: u32,
    /// Read/write timeout applied by the driver and to each write.
    pub timeout: Duration,
}

impl PortSettings {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

/// Opens device nodes as serial streams.
pub trait PortOpener: Send + Sync {
    /// Open `path` with `settings`.
    ///
    /// # Errors
    /// Returns `HardwareError::AccessDenied` if the process lacks permission
    /// and another hardware error for any other failure.
    fn open(&self, path: &Path, settings: &PortSettings) -> Result<BoxedSerialIo>;
}

/// [`PortOpener`] for real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn open(&self, path: &Path, settings: &PortSettings) -> Result<BoxedSerialIo> {
        let name = path.to_string_lossy();
        debug!(port = %name, baud = settings.baud_rate, "Opening serial port");

        let stream = tokio_serial::new(name.as_ref(), settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(settings.timeout)
            .open_native_async()
            .map_err(|e| HardwareError::from_serial(path, e))?;

        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplex_is_serial_io() {
        let (a, _b) = tokio::io::duplex(8);
        let _boxed: BoxedSerialIo = Box::new(a);
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let opener = SerialPortOpener;
        let settings = PortSettings::new(115_200, Duration::from_millis(100));
        let result = opener.open(Path::new("/nonexistent/ttyLOCKER0"), &settings);
        assert!(result.is_err());
    }
}
