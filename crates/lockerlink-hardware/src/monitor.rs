//! Filesystem monitor for tag reader hotplug.
//!
//! Two non-recursive watches feed one event loop:
//!
//! ```text
//! device dir  (/dev/serial/by-path)  create / rename-to  -> registry.handle_connect (spawned)
//!                                    remove / rename-from -> registry.handle_disconnect (inline)
//! device root (/dev)                 create / remove of /dev/serial -> directory lifecycle
//! ```
//!
//! The kernel drops `/dev/serial` when the last serial device is unplugged,
//! which silently invalidates the device-directory watch. The root watch
//! notices the directory coming back; the monitor then waits for it to
//! settle, rebuilds the device watch and enumerates whatever is already
//! there.

use crate::{
    HardwareError, Result,
    config::TagPortConfig,
    registry::DeviceRegistry,
    symlink::{is_temp_name, undecorated_path},
};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Number of settle intervals to wait for the device directory to appear
/// after its parent was created.
const SETTLE_ATTEMPTS: u32 = 10;

/// Observed state of the device directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    Absent,
    PresentEmpty,
    PresentPopulated,
}

impl DirectoryState {
    /// Inspect `dir` on disk.
    pub async fn observe(dir: &Path) -> Self {
        match tokio::fs::read_dir(dir).await {
            Ok(mut entries) => match entries.next_entry().await {
                Ok(Some(_)) => Self::PresentPopulated,
                Ok(None) | Err(_) => Self::PresentEmpty,
            },
            Err(_) => Self::Absent,
        }
    }

    pub fn is_present(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Change to the set of device symlinks derived from a watch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChange {
    Added(PathBuf),
    Removed(PathBuf),
}

/// Translate a device-directory event into link changes.
///
/// Only direct children of `dir` are considered. Created names are trimmed
/// of transient decoration; rename and removal events for transient names
/// are ignored, since they never refer to a link a reader was tracked under.
pub fn classify(event: &Event, dir: &Path, suffix_len: usize) -> Vec<LinkChange> {
    let children = event
        .paths
        .iter()
        .filter(|path| path.parent() == Some(dir));

    let undecorated = |path: &&PathBuf| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| !is_temp_name(name))
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => children
            .map(|path| LinkChange::Added(undecorated_path(path, suffix_len)))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => children
            .filter(undecorated)
            .map(|path| LinkChange::Added(path.clone()))
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => children
            .filter(undecorated)
            .map(|path| LinkChange::Removed(path.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchSource {
    Devices,
    Root,
}

struct WatchEvent {
    source: WatchSource,
    result: notify::Result<Event>,
}

fn watch_dir(
    path: &Path,
    source: WatchSource,
    tx: mpsc::UnboundedSender<WatchEvent>,
) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        // The loop is gone once the monitor shuts down
        let _ = tx.send(WatchEvent { source, result });
    })
    .map_err(|e| HardwareError::watch(path, e.to_string()))?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|e| HardwareError::watch(path, e.to_string()))?;
    Ok(watcher)
}

/// Drives a [`DeviceRegistry`] from filesystem events.
pub struct FilesystemMonitor {
    registry: Arc<DeviceRegistry>,
    config: TagPortConfig,
    top_dir: PathBuf,
    tx: mpsc::UnboundedSender<WatchEvent>,
    device_watcher: Option<RecommendedWatcher>,
    _root_watcher: RecommendedWatcher,
    state: watch::Sender<DirectoryState>,
}

impl FilesystemMonitor {
    /// Start watching the registry's device directory.
    ///
    /// Must be called from within a Tokio runtime. Existing devices are not
    /// enumerated; call [`DeviceRegistry::enumerate`] after starting so no
    /// hotplug between the two is missed.
    ///
    /// # Errors
    /// Returns `HardwareError::Watch` if the device root cannot be watched,
    /// or `HardwareError::Configuration` if the device directory is not
    /// below it. A missing device directory is not an error.
    pub async fn start(registry: Arc<DeviceRegistry>) -> Result<MonitorHandle> {
        let config = registry.config().clone();
        let top_dir = config.watched_top_dir()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let root_watcher = watch_dir(&config.device_root, WatchSource::Root, tx.clone())?;
        let device_watcher = match watch_dir(&config.device_dir, WatchSource::Devices, tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Device directory not watched until it appears");
                None
            }
        };

        let initial = DirectoryState::observe(&config.device_dir).await;
        let (state, state_rx) = watch::channel(initial);
        info!(
            dir = %config.device_dir.display(),
            root = %config.device_root.display(),
            state = ?initial,
            "Filesystem monitor started"
        );

        let monitor = Self {
            registry,
            config,
            top_dir,
            tx,
            device_watcher,
            _root_watcher: root_watcher,
            state,
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(monitor.run(rx, shutdown_rx));

        Ok(MonitorHandle {
            shutdown: shutdown_tx,
            task,
            state: state_rx,
        })
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<WatchEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
            }
        }
        debug!("Filesystem monitor stopped");
    }

    async fn dispatch(&mut self, event: WatchEvent) {
        let event_result = match event.result {
            Ok(result) => result,
            Err(e) => {
                warn!(source = ?event.source, error = %e, "Watch error");
                return;
            }
        };
        trace!(source = ?event.source, kind = ?event_result.kind, paths = ?event_result.paths, "Watch event");

        match event.source {
            WatchSource::Devices => self.on_device_event(&event_result).await,
            WatchSource::Root => self.on_root_event(&event_result).await,
        }
    }

    async fn on_device_event(&mut self, event: &Event) {
        for change in classify(event, &self.config.device_dir, self.config.temp_suffix_len) {
            match change {
                LinkChange::Added(link) => {
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move { registry.handle_connect(&link).await });
                }
                LinkChange::Removed(link) => self.registry.handle_disconnect(&link).await,
            }
        }

        // Only the root watch may leave Absent, so the device watch is rebuilt
        if self.current_state().is_present() {
            let observed = DirectoryState::observe(&self.config.device_dir).await;
            self.set_state(observed);
        }
    }

    async fn on_root_event(&mut self, event: &Event) {
        if !event.paths.iter().any(|path| *path == self.top_dir) {
            return;
        }

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                self.on_directory_created().await;
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.device_watcher = None;
                self.set_state(DirectoryState::Absent);
            }
            _ => {}
        }
    }

    /// Leave `Absent`: wait for the device directory, rewatch it and
    /// enumerate its contents.
    async fn on_directory_created(&mut self) {
        if self.current_state().is_present() {
            trace!("Device directory already present");
            return;
        }

        let dir = self.config.device_dir.clone();
        let mut observed = DirectoryState::Absent;
        for _ in 0..SETTLE_ATTEMPTS {
            tokio::time::sleep(self.config.settle_interval()).await;
            observed = DirectoryState::observe(&dir).await;
            if observed.is_present() {
                break;
            }
        }
        if !observed.is_present() {
            warn!(dir = %dir.display(), "Device directory did not appear");
            return;
        }

        self.device_watcher = None;
        match watch_dir(&dir, WatchSource::Devices, self.tx.clone()) {
            Ok(watcher) => self.device_watcher = Some(watcher),
            Err(e) => warn!(error = %e, "Failed to rewatch device directory"),
        }
        self.set_state(observed);

        let connected = self.registry.enumerate(&dir).await;
        info!(dir = %dir.display(), connected, "Device directory restored");
    }

    fn current_state(&self) -> DirectoryState {
        *self.state.borrow()
    }

    fn set_state(&self, next: DirectoryState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "Device directory state changed");
        }
    }
}

/// Handle to a running [`FilesystemMonitor`].
///
/// Dropping the handle stops the monitor as well.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    state: watch::Receiver<DirectoryState>,
}

impl MonitorHandle {
    /// Last observed state of the device directory.
    pub fn state(&self) -> DirectoryState {
        *self.state.borrow()
    }

    /// Stop the monitor and wait for its loop to exit.
    ///
    /// # Errors
    /// Returns `HardwareError::Communication` if the monitor task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let Self { shutdown, task, .. } = self;
        // The loop may already have exited
        let _ = shutdown.send(());

        match task.await {
            Err(e) if e.is_panic() => Err(HardwareError::communication(format!(
                "filesystem monitor panicked: {e}"
            ))),
            _ => Ok(()),
        }
    }
}
