//! In-memory serial ports.

use crate::{
    HardwareError, Result,
    serial::{BoxedSerialIo, PortOpener, PortSettings},
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

/// Buffer size of each in-memory pipe.
const PIPE_CAPACITY: usize = 4096;

/// [`PortOpener`] backed by `tokio::io::duplex` pipes.
///
/// Every successful open creates a pipe; the device end is queued per path
/// and can be claimed with [`MockPortOpener::take_remote`].
///
/// # Examples
///
/// ```
/// use lockerlink_hardware::mock::MockPortOpener;
/// use lockerlink_hardware::serial::{PortOpener, PortSettings};
/// use std::path::Path;
/// use std::time::Duration;
/// use tokio::io::AsyncWriteExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let opener = MockPortOpener::new();
/// let settings = PortSettings::new(115_200, Duration::from_secs(1));
/// let mut port = opener.open(Path::new("/dev/ttyACM0"), &settings).unwrap();
///
/// port.write_all(b"GSERNUM\n").await.unwrap();
///
/// let mut reader = opener.take_remote("/dev/ttyACM0").unwrap();
/// assert_eq!(reader.read_line().await.as_deref(), Some("GSERNUM"));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockPortOpener {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    remotes: HashMap<PathBuf, VecDeque<MockRemote>>,
    opens: HashMap<PathBuf, usize>,
    denied: HashSet<PathBuf>,
    settings: Vec<(PathBuf, PortSettings)>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make future opens of `path` fail with `HardwareError::AccessDenied`.
    pub fn deny(&self, path: impl Into<PathBuf>) {
        self.state().denied.insert(path.into());
    }

    /// Undo [`MockPortOpener::deny`].
    pub fn allow(&self, path: impl AsRef<Path>) {
        self.state().denied.remove(path.as_ref());
    }

    /// Claim the device end of the oldest unclaimed pipe opened for `path`.
    pub fn take_remote(&self, path: impl AsRef<Path>) -> Option<MockRemote> {
        self.state()
            .remotes
            .get_mut(path.as_ref())
            .and_then(VecDeque::pop_front)
    }

    /// Total number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state().opens.values().sum()
    }

    /// Number of successful opens of `path`.
    pub fn open_count_for(&self, path: impl AsRef<Path>) -> usize {
        self.state()
            .opens
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Settings passed to every successful open, oldest first.
    pub fn opened_with(&self) -> Vec<(PathBuf, PortSettings)> {
        self.state().settings.clone()
    }
}

impl PortOpener for MockPortOpener {
    fn open(&self, path: &Path, settings: &PortSettings) -> Result<BoxedSerialIo> {
        let mut state = self.state();
        if state.denied.contains(path) {
            return Err(HardwareError::AccessDenied {
                path: path.to_path_buf(),
            });
        }

        let (host, device) = tokio::io::duplex(PIPE_CAPACITY);
        state
            .remotes
            .entry(path.to_path_buf())
            .or_default()
            .push_back(MockRemote::new(device));
        *state.opens.entry(path.to_path_buf()).or_default() += 1;
        state.settings.push((path.to_path_buf(), *settings));

        Ok(Box::new(host))
    }
}

/// Device end of a mock port.
#[derive(Debug)]
pub struct MockRemote {
    stream: BufReader<DuplexStream>,
}

impl MockRemote {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Read one line written by the host, without its line ending.
    ///
    /// Returns `None` once the host has closed the port.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.stream.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    /// Write `text` to the host as device output.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(text.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Unplug: close the device end so the host sees EOF.
    pub fn unplug(self) {
        drop(self);
    }
}
