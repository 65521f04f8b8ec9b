//! Locker-bank controller façade.
//!
//! Owns the serial line to the locker-bank controller. Outbound commands are
//! written through [`LockerCodec`]; inbound ones are decoded by a background
//! task and delivered as [`DeviceEvent::CommandReceived`].

use crate::{
    HardwareError, Result,
    config::LockerPortConfig,
    events::{DEFAULT_EVENT_CAPACITY, DeviceEvent, DeviceEvents, EventSink, event_channel},
    serial::{BoxedSerialIo, PortOpener, PortSettings, SerialPortOpener},
};
use futures::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use lockerlink_core::constants::DEFAULT_CONNECT_TIMEOUT_MS;
use lockerlink_protocol::{LockerCodec, LockerCommand};
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, trace, warn};

type LockerFramed = Framed<BoxedSerialIo, LockerCodec>;

/// Connection to a locker-bank controller.
///
/// # Examples
///
/// ```
/// use lockerlink_hardware::{DeviceEvent, LockerController, LockerDevice};
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lockerlink_hardware::Result<()> {
/// let (host, mut controller_side) = tokio::io::duplex(256);
/// let (mut locker, mut events) = LockerController::from_transport(Box::new(host), "duplex");
///
/// locker.open_door("133_1").await?;
/// let mut buf = [0u8; 26];
/// controller_side.read_exact(&mut buf).await?;
/// assert_eq!(&buf, b"POST:1,133,8,4,FFFF=6CA4\r\n");
///
/// controller_side.write_all(b"POST:1,1,10,4,0001=DF26\r\n").await?;
/// match events.recv().await {
///     Some(DeviceEvent::CommandReceived(status)) => assert_eq!(status.cells, Some(vec![1])),
///     other => panic!("unexpected event: {other:?}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct LockerController {
    port_name: String,
    sink: SplitSink<LockerFramed, LockerCommand>,
    reader: JoinHandle<()>,
    write_timeout: Duration,
}

impl LockerController {
    /// Open the configured serial port.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns the configuration or open failure. The caller is expected to
    /// treat either as fatal.
    pub fn open(config: &LockerPortConfig) -> Result<(Self, DeviceEvents)> {
        Self::open_with(config, &SerialPortOpener)
    }

    /// Open the configured port through `opener`.
    pub fn open_with(
        config: &LockerPortConfig,
        opener: &dyn PortOpener,
    ) -> Result<(Self, DeviceEvents)> {
        config.validate()?;
        let settings = PortSettings::new(
            config.baud_rate,
            Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        );

        let transport = opener
            .open(Path::new(&config.port_name), &settings)
            .inspect_err(|e| {
                error!(port = %config.port_name, error = %e, "Failed to open locker port");
            })?;
        info!(port = %config.port_name, baud = config.baud_rate, "Locker port open");

        Ok(Self::from_transport(transport, &config.port_name))
    }

    /// Drive an already open transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_transport(transport: BoxedSerialIo, port_name: &str) -> (Self, DeviceEvents) {
        let (sink, events) = event_channel(DEFAULT_EVENT_CAPACITY);
        let (writer, reader) = Framed::new(transport, LockerCodec::new()).split();
        let reader = tokio::spawn(forward_commands(reader, sink, port_name.to_string()));

        let controller = Self {
            port_name: port_name.to_string(),
            sink: writer,
            reader,
            write_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        };
        (controller, events)
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Write `command` to the locker bank.
    ///
    /// # Errors
    /// Returns `HardwareError::Timeout` if the write does not complete in
    /// time and `HardwareError::Communication` if it fails.
    pub async fn send_command(&mut self, command: &LockerCommand) -> Result<()> {
        info!(port = %self.port_name, %command, "Sending locker command");
        trace!(bytes = %hex(command.as_bytes()), "TX");

        match tokio::time::timeout(self.write_timeout, self.sink.send(command.clone())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(port = %self.port_name, error = %e, "Failed to send locker command");
                Err(HardwareError::communication(format!(
                    "writing to '{}' failed: {e}",
                    self.port_name
                )))
            }
            Err(_) => Err(HardwareError::timeout(
                u64::try_from(self.write_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Whether the inbound task is still reading.
    pub fn is_receiving(&self) -> bool {
        !self.reader.is_finished()
    }
}

impl std::fmt::Debug for LockerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockerController")
            .field("port_name", &self.port_name)
            .field("write_timeout", &self.write_timeout)
            .field("receiving", &self.is_receiving())
            .finish_non_exhaustive()
    }
}

impl Drop for LockerController {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn forward_commands(mut stream: SplitStream<LockerFramed>, events: EventSink, port: String) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(command) => {
                debug!(port = %port, %command, "Locker command received");
                if !events.deliver(DeviceEvent::CommandReceived(command)).await {
                    break;
                }
            }
            Err(e) => {
                warn!(port = %port, error = %e, "Locker port read failed");
                break;
            }
        }
    }
    debug!(port = %port, "Locker port closed");
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPortOpener;
    use crate::traits::LockerDevice;
    use lockerlink_protocol::{CommandKind, CommandRequestBuilder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_hex() {
        assert_eq!(hex(b"POST:"), "50 4F 53 54 3A");
        assert_eq!(hex(&[]), "");
    }

    #[tokio::test]
    async fn test_open_with_mock_port() {
        let opener = MockPortOpener::new();
        let config = LockerPortConfig::new("/dev/ttyAMA0");

        let (mut locker, _events) = LockerController::open_with(&config, &opener).unwrap();
        assert_eq!(locker.port_name(), "/dev/ttyAMA0");

        locker.open_door("2_5").await.unwrap();
        let mut remote = opener.take_remote("/dev/ttyAMA0").unwrap();
        let line = remote.read_line().await.unwrap();
        assert!(line.starts_with("POST:1,2,8,4,FFFF="));
    }

    #[tokio::test]
    async fn test_open_denied_port_fails() {
        let opener = MockPortOpener::new();
        opener.deny("/dev/ttyAMA0");

        let result = LockerController::open_with(&LockerPortConfig::new("/dev/ttyAMA0"), &opener);
        assert!(result.unwrap_err().is_access_denied());
    }

    #[tokio::test]
    async fn test_open_rejects_empty_port_name() {
        let opener = MockPortOpener::new();
        let result = LockerController::open_with(&LockerPortConfig::default(), &opener);
        assert!(matches!(result, Err(HardwareError::Configuration { .. })));
        assert_eq!(opener.open_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_cell_number_is_protocol_error() {
        let (host, _far) = tokio::io::duplex(64);
        let (mut locker, _events) = LockerController::from_transport(Box::new(host), "duplex");

        let error = locker.open_door("not-a-cell").await.unwrap_err();
        assert!(matches!(error, HardwareError::Protocol(ref e) if e.is_validation()));
    }

    #[tokio::test]
    async fn test_inbound_status_emitted() {
        let (host, mut far) = tokio::io::duplex(256);
        let (_locker, mut events) = LockerController::from_transport(Box::new(host), "duplex");

        far.write_all(b"noisePOST:1,1,10,4,0003=BF27\r\n").await.unwrap();

        match events.recv_timeout(WAIT).await {
            Some(DeviceEvent::CommandReceived(command)) => {
                assert_eq!(command.kind, CommandKind::Status);
                assert_eq!(command.locker_part, Some(1));
                assert_eq!(command.cells, Some(vec![1, 2]));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reader_stops_on_eof() {
        let (host, far) = tokio::io::duplex(64);
        let (locker, mut events) = LockerController::from_transport(Box::new(host), "duplex");
        drop(far);

        assert_eq!(events.recv_timeout(WAIT).await, None);
        assert!(!locker.is_receiving());
    }

    #[tokio::test]
    async fn test_send_writes_raw_frame() {
        let (host, mut far) = tokio::io::duplex(256);
        let (mut locker, _events) = LockerController::from_transport(Box::new(host), "duplex");
        let command = CommandRequestBuilder::new()
            .event_type(CommandKind::Status)
            .cell_number("1_1")
            .unwrap()
            .build()
            .unwrap();

        locker.send_command(&command).await.unwrap();

        let mut buf = vec![0u8; command.raw.len()];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, command.raw.as_bytes());
    }
}
