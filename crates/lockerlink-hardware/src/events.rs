//! Device events delivered to the caller.
//!
//! Producers hold an [`EventSink`]. Device-management events go through
//! [`EventSink::emit`], which never blocks: a full or closed channel drops the
//! event and logs a warning. Locker commands go through
//! [`EventSink::deliver`], which waits for room so a slow consumer slows the
//! serial reader instead of losing reports. The caller reads events from
//! [`DeviceEvents`].
//!
//! ```
//! use lockerlink_hardware::events::{DeviceEvent, event_channel};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (sink, mut events) = event_channel(8);
//! sink.emit(DeviceEvent::ChargeReceived {
//!     identity: Some("T-0042".to_string()),
//!     charge: "87".to_string(),
//! });
//!
//! match events.recv().await {
//!     Some(DeviceEvent::ChargeReceived { charge, .. }) => assert_eq!(charge, "87"),
//!     other => panic!("unexpected event: {other:?}"),
//! }
//! # }
//! ```

use lockerlink_protocol::LockerCommand;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Event raised by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceEvent {
    /// A tag reader reported its serial number.
    Connected {
        identity: String,
        /// Resolved device node of the reader.
        path: PathBuf,
    },

    /// A previously identified tag reader was unplugged.
    Disconnected { identity: String, path: PathBuf },

    /// A tag reader reported its battery charge.
    ///
    /// `identity` is `None` if the reader answered before its serial number
    /// was learned.
    ChargeReceived {
        identity: Option<String>,
        charge: String,
    },

    /// The locker-bank controller sent a command.
    CommandReceived(LockerCommand),
}

/// Non-blocking producer side of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<DeviceEvent>,
}

impl EventSink {
    /// Deliver `event` if there is room in the channel.
    ///
    /// Returns whether the event was queued.
    pub fn emit(&self, event: DeviceEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "Event channel full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(?event, "Event receiver dropped, discarding event");
                false
            }
        }
    }

    /// Deliver `event`, waiting for room in the channel.
    ///
    /// Returns `false` if the receiver is gone.
    pub async fn deliver(&self, event: DeviceEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                warn!(?event, "Event receiver dropped, discarding event");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the event channel.
#[derive(Debug)]
pub struct DeviceEvents {
    rx: mpsc::Receiver<DeviceEvent>,
}

impl DeviceEvents {
    /// Wait for the next event.
    ///
    /// Returns `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<DeviceEvent> {
        self.rx.recv().await
    }

    /// Wait at most `timeout` for the next event.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<DeviceEvent> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<DeviceEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a bounded event channel.
pub fn event_channel(capacity: usize) -> (EventSink, DeviceEvents) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, DeviceEvents { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge(value: &str) -> DeviceEvent {
        DeviceEvent::ChargeReceived {
            identity: None,
            charge: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sink, mut events) = event_channel(4);
        assert!(sink.emit(charge("1")));
        assert!(sink.emit(charge("2")));

        assert_eq!(events.recv().await, Some(charge("1")));
        assert_eq!(events.recv().await, Some(charge("2")));
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let (sink, mut events) = event_channel(1);
        assert!(sink.emit(charge("kept")));
        assert!(!sink.emit(charge("dropped")));

        assert_eq!(events.try_recv(), Some(charge("kept")));
        assert_eq!(events.try_recv(), None);
    }

    #[tokio::test]
    async fn test_closed_channel_discards() {
        let (sink, events) = event_channel(1);
        drop(events);
        assert!(sink.is_closed());
        assert!(!sink.emit(charge("lost")));
    }

    #[tokio::test]
    async fn test_deliver_waits_for_room() {
        let (sink, mut events) = event_channel(1);
        assert!(sink.deliver(charge("1")).await);

        let pending = tokio::spawn(async move { sink.deliver(charge("2")).await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert_eq!(events.recv().await, Some(charge("1")));
        assert!(pending.await.unwrap());
        assert_eq!(events.recv().await, Some(charge("2")));
    }

    #[tokio::test]
    async fn test_deliver_to_closed_channel() {
        let (sink, events) = event_channel(1);
        drop(events);
        assert!(!sink.deliver(charge("lost")).await);
    }

    #[tokio::test]
    async fn test_recv_ends_when_sinks_dropped() {
        let (sink, mut events) = event_channel(1);
        drop(sink);
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_timeout_elapses() {
        let (_sink, mut events) = event_channel(1);
        assert_eq!(events.recv_timeout(Duration::from_millis(50)).await, None);
    }
}
