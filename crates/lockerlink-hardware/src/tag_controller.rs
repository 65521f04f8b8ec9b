//! Tag reader façade.
//!
//! Composes a [`DeviceRegistry`] with a [`FilesystemMonitor`]: the monitor is
//! started first so that no hotplug is missed while existing readers are
//! enumerated.

use crate::{
    Result,
    config::TagPortConfig,
    events::{DEFAULT_EVENT_CAPACITY, DeviceEvents, event_channel},
    monitor::{DirectoryState, FilesystemMonitor, MonitorHandle},
    registry::{DeviceInfo, DeviceRegistry},
    serial::{PortOpener, SerialPortOpener},
    tag::TagCommand,
};
use std::sync::Arc;
use tracing::info;

/// Hot-pluggable tag readers behind one device directory.
#[derive(Debug)]
pub struct TagDeviceController {
    registry: Arc<DeviceRegistry>,
    monitor: MonitorHandle,
}

impl TagDeviceController {
    /// Start watching for tag readers on real serial ports.
    ///
    /// # Errors
    /// Returns `HardwareError::Configuration` for an invalid configuration
    /// and `HardwareError::Watch` if the device root cannot be watched.
    pub async fn start(config: TagPortConfig) -> Result<(Self, DeviceEvents)> {
        Self::start_with_opener(config, Arc::new(SerialPortOpener)).await
    }

    /// Start watching for tag readers, opening ports through `opener`.
    pub async fn start_with_opener(
        config: TagPortConfig,
        opener: Arc<dyn PortOpener>,
    ) -> Result<(Self, DeviceEvents)> {
        config.validate()?;
        let (sink, events) = event_channel(DEFAULT_EVENT_CAPACITY);
        let device_dir = config.device_dir.clone();

        let registry = DeviceRegistry::new(config, opener, sink);
        let monitor = FilesystemMonitor::start(Arc::clone(&registry)).await?;

        if DirectoryState::observe(&device_dir).await.is_present() {
            let connected = registry.enumerate(&device_dir).await;
            info!(dir = %device_dir.display(), connected, "Tag readers enumerated");
        } else {
            info!(dir = %device_dir.display(), "No tag readers attached");
        }

        Ok((Self { registry, monitor }, events))
    }

    /// Ask the reader `identity` for its battery charge.
    ///
    /// The answer arrives as `DeviceEvent::ChargeReceived`; failures are
    /// logged.
    pub async fn get_charge_level(&self, identity: &str) {
        self.registry.get_charge_level(identity).await;
    }

    /// Send `command` to the reader `identity`.
    pub async fn send_command(&self, identity: &str, command: TagCommand) -> Result<()> {
        self.registry.send_command(identity, command).await
    }

    pub async fn devices(&self) -> Vec<DeviceInfo> {
        self.registry.devices().await
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn directory_state(&self) -> DirectoryState {
        self.monitor.state()
    }

    /// Stop monitoring and close every port.
    pub async fn shutdown(self) -> Result<()> {
        let stopped = self.monitor.shutdown().await;
        self.registry.dispose().await;
        stopped
    }
}
