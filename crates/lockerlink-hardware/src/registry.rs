//! Device registry for hot-pluggable tag readers.
//!
//! A reader is keyed by the device node its symlinks resolve to. The
//! registry keeps three maps, each behind its own lock:
//!
//! ```text
//! links:      /dev/serial/by-path/usb-1  ->  /dev/ttyACM0
//! identities: /dev/ttyACM0               ->  "04A1B2C3"
//! ports:      /dev/ttyACM0               ->  open port + reader task
//! ```
//!
//! No operation holds more than one of the locks at a time. Ports are opened
//! outside the lock and inserted only if no port for the same device node
//! appeared meanwhile; the losing stream is closed. A reader's identity is
//! learned asynchronously: connecting writes `GSERNUM` and the response task
//! records the serial number when the reader answers.
//!
//! A link is recorded only once its port is open. Connects still in flight
//! are counted per link, so a removal that arrives before the link is
//! recorded cancels the connect instead of being lost. A recorded link is
//! never repointed: it must be removed before it can map to another node.

use crate::{
    HardwareError, Result,
    config::TagPortConfig,
    events::{DeviceEvent, EventSink},
    serial::{BoxedSerialIo, PortOpener, PortSettings},
    symlink,
    tag::{TagCommand, TagResponse},
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, hash_map::Entry};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Size of the buffer each response task reads into.
const READ_BUFFER_SIZE: usize = 1024;

/// An open port and the task reading its responses.
struct PortHandle {
    id: u64,
    writer: Mutex<WriteHalf<BoxedSerialIo>>,
    write_timeout: Duration,
    reader: JoinHandle<()>,
}

impl Drop for PortHandle {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Links mapped to device nodes, plus the connects not yet recorded.
#[derive(Debug, Default)]
struct LinkTable {
    targets: HashMap<PathBuf, PathBuf>,
    pending: HashMap<PathBuf, PendingLink>,
}

#[derive(Debug, Default)]
struct PendingLink {
    in_flight: usize,
    removals: u64,
}

/// How a connect ended once its port was open.
enum Settled {
    Recorded,
    Removed { orphaned: bool },
    Conflict { existing: PathBuf, orphaned: bool },
}

impl LinkTable {
    /// Register a connect for `link` and return its removal ticket.
    fn begin(&mut self, link: &Path) -> u64 {
        let pending = self.pending.entry(link.to_path_buf()).or_default();
        pending.in_flight += 1;
        pending.removals
    }

    /// Finish a connect registered with `ticket`, recording `link -> real`
    /// unless the link was removed meanwhile or already maps elsewhere.
    fn settle(&mut self, link: &Path, ticket: u64, real: &Path) -> Settled {
        if self.abandon(link).is_some_and(|removals| removals != ticket) {
            return Settled::Removed {
                orphaned: self.is_orphaned(real),
            };
        }
        match self.targets.get(link) {
            Some(existing) if existing != real => Settled::Conflict {
                existing: existing.clone(),
                orphaned: self.is_orphaned(real),
            },
            Some(_) => Settled::Recorded,
            None => {
                self.targets.insert(link.to_path_buf(), real.to_path_buf());
                Settled::Recorded
            }
        }
    }

    /// Unregister a connect for `link`, returning the link's removal count.
    fn abandon(&mut self, link: &Path) -> Option<u64> {
        let pending = self.pending.get_mut(link)?;
        pending.in_flight = pending.in_flight.saturating_sub(1);
        let removals = pending.removals;
        if pending.in_flight == 0 {
            self.pending.remove(link);
        }
        Some(removals)
    }

    /// Drop `link`, cancelling any connect still in flight for it.
    fn remove(&mut self, link: &Path) -> Option<PathBuf> {
        if let Some(pending) = self.pending.get_mut(link) {
            pending.removals += 1;
        }
        self.targets.remove(link)
    }

    /// No link maps to `real` and no connect could still claim it.
    fn is_orphaned(&self, real: &Path) -> bool {
        self.pending.is_empty() && !self.targets.values().any(|target| target == real)
    }
}

/// Snapshot of one tracked device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub real_path: PathBuf,
    /// Serial number, once the reader has reported it.
    pub identity: Option<String>,
    /// Symlinks currently mapped to `real_path`, sorted.
    pub links: Vec<PathBuf>,
    pub port_open: bool,
}

/// Tracks tag readers and their open ports.
///
/// Methods that may open a port take `self: &Arc<Self>` because the spawned
/// response task keeps a weak reference back to the registry.
pub struct DeviceRegistry {
    config: TagPortConfig,
    opener: Arc<dyn PortOpener>,
    events: EventSink,
    identities: RwLock<HashMap<PathBuf, String>>,
    links: RwLock<LinkTable>,
    ports: RwLock<HashMap<PathBuf, Arc<PortHandle>>>,
    next_port_id: AtomicU64,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("device_dir", &self.config.device_dir)
            .field("next_port_id", &self.next_port_id)
            .finish_non_exhaustive()
    }
}

impl DeviceRegistry {
    pub fn new(config: TagPortConfig, opener: Arc<dyn PortOpener>, events: EventSink) -> Arc<Self> {
        Arc::new(Self {
            config,
            opener,
            events,
            identities: RwLock::new(HashMap::new()),
            links: RwLock::new(LinkTable::default()),
            ports: RwLock::new(HashMap::new()),
            next_port_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &TagPortConfig {
        &self.config
    }

    /// Probe every entry of `dir`.
    ///
    /// Entries that cannot be resolved or opened are logged and skipped.
    /// Returns the number of entries probed successfully.
    pub async fn enumerate(self: &Arc<Self>, dir: &Path) -> usize {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot list device directory");
                return 0;
            }
        };

        let mut connected = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Device directory listing aborted");
                    break;
                }
            };

            let link = symlink::undecorated_path(&entry.path(), self.config.temp_suffix_len);
            match self.connect(&link).await {
                Ok(_) => connected += 1,
                Err(e) => warn!(link = %link.display(), error = %e, "Skipping device"),
            }
        }

        debug!(dir = %dir.display(), connected, "Enumerated device directory");
        connected
    }

    /// Connect the reader behind `link`, logging any failure.
    pub async fn handle_connect(self: &Arc<Self>, link: &Path) {
        match self.connect(link).await {
            Ok(_) | Err(HardwareError::Disconnected { .. }) => {}
            Err(e) if e.is_access_denied() => {
                warn!(link = %link.display(), error = %e, "Access to tag reader denied");
            }
            Err(e) => warn!(link = %link.display(), error = %e, "Failed to connect tag reader"),
        }
    }

    /// Resolve `link`, make sure its device has an open port and ask the
    /// reader for its serial number.
    ///
    /// A link that is already tracked, identified and open is left alone.
    /// Returns the resolved device node.
    ///
    /// # Errors
    /// Returns the resolution, open or write failure,
    /// `HardwareError::Disconnected` if the link was removed before the
    /// connect finished, or `HardwareError::Resolve` if the link is already
    /// tracked for another device node.
    pub async fn connect(self: &Arc<Self>, link: &Path) -> Result<PathBuf> {
        let real = symlink::resolve_real_path(link)?;

        if self.is_fully_tracked(link, &real).await {
            trace!(link = %link.display(), "Tag reader already tracked");
            return Ok(real);
        }
        if let Some(existing) = self.real_path_of(link).await
            && existing != real
        {
            return Err(link_conflict(link, &existing));
        }

        let ticket = self.links.write().await.begin(link);
        let port = match self.ensure_port(&real, self.config.connect_timeout()).await {
            Ok(port) => port,
            Err(e) => {
                self.links.write().await.abandon(link);
                return Err(e);
            }
        };
        let settled = self.links.write().await.settle(link, ticket, &real);

        match settled {
            Settled::Recorded => {}
            Settled::Removed { orphaned } => {
                debug!(link = %link.display(), "Link removed while connecting");
                if orphaned {
                    self.release_port(&real, port.id).await;
                }
                return Err(HardwareError::disconnected(link.display().to_string()));
            }
            Settled::Conflict { existing, orphaned } => {
                if orphaned {
                    self.release_port(&real, port.id).await;
                }
                return Err(link_conflict(link, &existing));
            }
        }
        debug!(link = %link.display(), real = %real.display(), "Tracking tag reader");

        write_command(&port, TagCommand::GetSerialNumber).await?;
        Ok(real)
    }

    async fn is_fully_tracked(&self, link: &Path, real: &Path) -> bool {
        let linked = self
            .links
            .read()
            .await
            .targets
            .get(link)
            .is_some_and(|r| r == real);
        linked
            && self.identities.read().await.contains_key(real)
            && self.ports.read().await.contains_key(real)
    }

    /// Forget the device behind `link`.
    ///
    /// Removes the device from every map, closes its port and emits
    /// `Disconnected` if the reader had reported its serial number.
    /// Unknown links are ignored.
    pub async fn handle_disconnect(&self, link: &Path) {
        let Some(real) = self.links.write().await.remove(link) else {
            trace!(link = %link.display(), "Ignoring removal of untracked link");
            return;
        };

        let port = self.ports.write().await.remove(&real);
        let identity = self.identities.write().await.remove(&real);
        self.links
            .write()
            .await
            .targets
            .retain(|_, target| *target != real);
        if let Some(port) = port {
            port.reader.abort();
        }

        match identity {
            Some(identity) => {
                info!(identity = %identity, real = %real.display(), "Tag reader disconnected");
                self.events.emit(DeviceEvent::Disconnected {
                    identity,
                    path: real,
                });
            }
            None => debug!(real = %real.display(), "Unidentified tag reader removed"),
        }
    }

    /// Handle one chunk of output read from the device at `real`.
    pub async fn handle_response(&self, real: &Path, text: &str) {
        match TagResponse::parse(text) {
            TagResponse::SerialNumber(identity) => {
                self.identities
                    .write()
                    .await
                    .insert(real.to_path_buf(), identity.clone());
                info!(identity = %identity, real = %real.display(), "Tag reader connected");
                self.events.emit(DeviceEvent::Connected {
                    identity,
                    path: real.to_path_buf(),
                });
            }
            TagResponse::BatteryCharge(charge) => {
                let identity = self.identities.read().await.get(real).cloned();
                debug!(?identity, charge = %charge, "Battery charge received");
                self.events
                    .emit(DeviceEvent::ChargeReceived { identity, charge });
            }
            TagResponse::Other(text) => {
                debug!(real = %real.display(), response = %text, "Unhandled tag reader response");
            }
        }
    }

    /// Write `command` to the reader whose serial number is `identity`,
    /// opening its port if needed.
    ///
    /// # Errors
    /// Returns `HardwareError::DeviceNotFound` for an unknown identity,
    /// `HardwareError::Timeout` if the write does not finish within the
    /// port's timeout, or the open or write failure.
    pub async fn send_command(self: &Arc<Self>, identity: &str, command: TagCommand) -> Result<()> {
        let real = self
            .find_by_identity(identity)
            .await
            .ok_or_else(|| HardwareError::device_not_found(identity))?;

        let port = self.ensure_port(&real, self.config.command_timeout()).await?;
        write_command(&port, command).await?;
        debug!(identity, %command, "Tag command sent");
        Ok(())
    }

    /// Ask the reader `identity` for its battery charge.
    ///
    /// The answer arrives as `DeviceEvent::ChargeReceived`. Failures are
    /// logged.
    pub async fn get_charge_level(self: &Arc<Self>, identity: &str) {
        if let Err(e) = self.send_command(identity, TagCommand::GetBatteryCharge).await {
            warn!(identity, error = %e, "Battery charge request failed");
        }
    }

    async fn find_by_identity(&self, identity: &str) -> Option<PathBuf> {
        self.identities
            .read()
            .await
            .iter()
            .find(|(_, known)| known.as_str() == identity)
            .map(|(real, _)| real.clone())
    }

    /// Open port for `real`, opening one with `timeout` if there is none.
    async fn ensure_port(self: &Arc<Self>, real: &Path, timeout: Duration) -> Result<Arc<PortHandle>> {
        if let Some(port) = self.ports.read().await.get(real) {
            return Ok(Arc::clone(port));
        }

        let settings = PortSettings::new(self.config.baud_rate, timeout);
        let stream = self.opener.open(real, &settings)?;
        let (reader, writer) = tokio::io::split(stream);

        let mut ports = self.ports.write().await;
        match ports.entry(real.to_path_buf()) {
            Entry::Occupied(entry) => {
                debug!(real = %real.display(), "Port opened concurrently, closing duplicate");
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let id = self.next_port_id.fetch_add(1, Ordering::Relaxed);
                let task = tokio::spawn(read_responses(
                    Arc::downgrade(self),
                    real.to_path_buf(),
                    id,
                    reader,
                ));
                let port = Arc::new(PortHandle {
                    id,
                    writer: Mutex::new(writer),
                    write_timeout: timeout,
                    reader: task,
                });
                entry.insert(Arc::clone(&port));
                info!(real = %real.display(), baud = settings.baud_rate, "Port opened");
                Ok(port)
            }
        }
    }

    /// Drop the port entry for `real` if it is still the one with `id`.
    async fn release_port(&self, real: &Path, id: u64) {
        let released = {
            let mut ports = self.ports.write().await;
            match ports.get(real) {
                Some(port) if port.id == id => ports.remove(real),
                _ => None,
            }
        };
        if released.is_some() {
            debug!(real = %real.display(), "Port released");
        }
    }

    /// Close every port.
    pub async fn dispose(&self) {
        let ports: Vec<_> = self.ports.write().await.drain().collect();
        for (_, port) in &ports {
            port.reader.abort();
        }
        info!(count = ports.len(), "Tag reader ports closed");
    }

    /// Snapshot of all tracked devices, sorted by device node.
    pub async fn devices(&self) -> Vec<DeviceInfo> {
        let mut devices = BTreeMap::new();

        for (link, real) in self.links.read().await.targets.iter() {
            device_slot(&mut devices, real).links.push(link.clone());
        }
        for (real, identity) in self.identities.read().await.iter() {
            device_slot(&mut devices, real).identity = Some(identity.clone());
        }
        for real in self.ports.read().await.keys() {
            device_slot(&mut devices, real).port_open = true;
        }

        devices
            .into_values()
            .map(|mut device| {
                device.links.sort();
                device
            })
            .collect()
    }

    pub async fn open_port_count(&self) -> usize {
        self.ports.read().await.len()
    }

    /// Serial number reported by the device at `real`.
    pub async fn identity_of(&self, real: &Path) -> Option<String> {
        self.identities.read().await.get(real).cloned()
    }

    /// Device node `link` was resolved to when it connected.
    pub async fn real_path_of(&self, link: &Path) -> Option<PathBuf> {
        self.links.read().await.targets.get(link).cloned()
    }
}

fn link_conflict(link: &Path, existing: &Path) -> HardwareError {
    HardwareError::resolve(
        link,
        format!("already tracked for {}", existing.display()),
    )
}

fn device_slot<'a>(
    devices: &'a mut BTreeMap<PathBuf, DeviceInfo>,
    real: &Path,
) -> &'a mut DeviceInfo {
    devices
        .entry(real.to_path_buf())
        .or_insert_with(|| DeviceInfo {
            real_path: real.to_path_buf(),
            identity: None,
            links: Vec::new(),
            port_open: false,
        })
}

async fn write_command(port: &PortHandle, command: TagCommand) -> Result<()> {
    let wire = command.wire();
    let mut writer = port.writer.lock().await;
    let write = async {
        writer.write_all(wire.as_bytes()).await?;
        writer.flush().await
    };

    match tokio::time::timeout(port.write_timeout, write).await {
        Ok(Ok(())) => {
            trace!(%command, "Tag command written");
            Ok(())
        }
        Ok(Err(e)) => Err(HardwareError::communication(format!(
            "writing {command} failed: {e}"
        ))),
        Err(_) => Err(HardwareError::timeout(
            u64::try_from(port.write_timeout.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

/// Read responses from the device at `real` until EOF or an I/O error.
async fn read_responses(
    registry: Weak<DeviceRegistry>,
    real: PathBuf,
    id: u64,
    mut reader: ReadHalf<BoxedSerialIo>,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!(real = %real.display(), "Tag reader port closed");
                break;
            }
            Ok(n) => {
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                let text = String::from_utf8_lossy(&buf[..n]);
                trace!(real = %real.display(), bytes = n, response = %text.escape_debug(), "RX");
                registry.handle_response(&real, &text).await;
            }
            Err(e) => {
                warn!(real = %real.display(), error = %e, "Tag reader read failed");
                break;
            }
        }
    }

    if let Some(registry) = registry.upgrade() {
        registry.release_port(&real, id).await;
    }
}
