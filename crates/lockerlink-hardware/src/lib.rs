//! Device layer for locker banks and hot-pluggable tag readers.
//!
//! This crate connects the locker protocol from `lockerlink-protocol` to real
//! serial ports and manages tag readers that come and go at runtime.
//!
//! # Locker Banks
//!
//! [`LockerController`] owns the serial line to one locker-bank controller.
//! Commands are written with [`LockerController::send_command`] or, through
//! [`LockerDevice`], [`LockerDevice::open_door`]; reports from the bank
//! arrive as [`DeviceEvent::CommandReceived`].
//!
//! ```no_run
//! use lockerlink_hardware::{DeviceEvent, LockerController, LockerDevice, LockerPortConfig};
//!
//! # async fn example() -> lockerlink_hardware::Result<()> {
//! let (mut locker, mut events) = LockerController::open(&LockerPortConfig::new("/dev/ttyAMA0"))?;
//! locker.open_door("133_1").await?;
//!
//! while let Some(DeviceEvent::CommandReceived(report)) = events.recv().await {
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Tag Readers
//!
//! Tag readers appear as symlinks under `/dev/serial/by-path`.
//! [`TagDeviceController`] watches that directory, opens each reader's port,
//! asks for its serial number and reports readers as they connect and
//! disconnect. Commands are addressed by serial number.
//!
//! ```no_run
//! use lockerlink_hardware::{DeviceEvent, TagDeviceController, TagPortConfig};
//!
//! # async fn example() -> lockerlink_hardware::Result<()> {
//! let (readers, mut events) = TagDeviceController::start(TagPortConfig::default()).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         DeviceEvent::Connected { identity, .. } => readers.get_charge_level(&identity).await,
//!         DeviceEvent::ChargeReceived { identity, charge } => {
//!             println!("{identity:?}: {charge}%");
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Startup failures (the locker port, the device root watch) are returned to
//! the caller. Failures on a single hot-plugged reader are logged and do not
//! affect the others. Logging uses `tracing`; installing a subscriber is left
//! to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod locker_controller;
pub mod mock;
pub mod monitor;
pub mod registry;
pub mod serial;
pub mod symlink;
pub mod tag;
pub mod tag_controller;
pub mod traits;

pub use config::{LockerPortConfig, TagPortConfig};
pub use error::{HardwareError, Result};
pub use events::{DeviceEvent, DeviceEvents, EventSink, event_channel};
pub use locker_controller::LockerController;
pub use monitor::{DirectoryState, FilesystemMonitor, MonitorHandle};
pub use registry::{DeviceInfo, DeviceRegistry};
pub use serial::{BoxedSerialIo, PortOpener, PortSettings, SerialPortOpener};
pub use tag::{TagCommand, TagResponse};
pub use tag_controller::TagDeviceController;
pub use traits::{LockerDevice, TagDevices};
