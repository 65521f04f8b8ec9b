//! Shared fixtures for hardware integration tests.

#![allow(dead_code)]

use lockerlink_hardware::mock::{MockPortOpener, MockRemote};
use lockerlink_hardware::{DeviceEvent, DeviceEvents, TagPortConfig};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Upper bound for anything that waits on the filesystem or a task.
pub const WAIT: Duration = Duration::from_secs(10);

/// A throwaway `/dev` with a `serial/by-path` directory.
pub struct DevTree {
    _dir: TempDir,
    pub root: PathBuf,
    pub links: PathBuf,
}

impl DevTree {
    pub fn new() -> Self {
        let tree = Self::without_links();
        std::fs::create_dir_all(&tree.links).unwrap();
        tree
    }

    /// Device root without the `serial` directory.
    pub fn without_links() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let links = root.join("serial").join("by-path");
        Self {
            _dir: dir,
            root,
            links,
        }
    }

    pub fn config(&self) -> TagPortConfig {
        let mut config = TagPortConfig::new(&self.links, &self.root);
        config.settle_interval_ms = 20;
        config
    }

    /// Create the device node `name` if needed.
    pub fn node(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if !path.exists() {
            std::fs::write(&path, b"").unwrap();
        }
        path
    }

    /// Plug `node` in under `link`. Returns the link path.
    pub fn plug(&self, node: &str, link: &str) -> PathBuf {
        self.node(node);
        let path = self.links.join(link);
        std::os::unix::fs::symlink(format!("../../{node}"), &path).unwrap();
        path
    }

    /// Plug `node` in the way udev does: a transient name renamed into place.
    pub fn plug_atomically(&self, node: &str, link: &str) -> PathBuf {
        self.node(node);
        let temp = self.links.join(format!(".#{link}0123456789abcdef"));
        std::os::unix::fs::symlink(format!("../../{node}"), &temp).unwrap();
        let path = self.links.join(link);
        std::fs::rename(&temp, &path).unwrap();
        path
    }

    pub fn unplug(&self, link: &str) {
        std::fs::remove_file(self.links.join(link)).unwrap();
    }

    /// Remove the whole `serial` directory, as the kernel does when the last
    /// serial device goes away.
    pub fn remove_serial_dir(&self) {
        std::fs::remove_dir_all(self.root.join("serial")).unwrap();
    }

    pub fn restore_serial_dir(&self) {
        std::fs::create_dir_all(&self.links).unwrap();
    }
}

/// Poll `condition` until it holds.
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = tokio::time::timeout(WAIT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

/// Wait until the registry opens `real`, then claim its device end.
pub async fn remote_for(opener: &MockPortOpener, real: &Path) -> MockRemote {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Some(remote) = opener.take_remote(real) {
            return remote;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "port {} never opened",
            real.display()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Answer the serial number request on `remote` with `identity`.
pub async fn identify(remote: &mut MockRemote, identity: &str) {
    assert_eq!(remote.read_line().await.as_deref(), Some("GSERNUM"));
    remote.send(&format!("SERNUM={identity};\r\n")).await.unwrap();
}

pub async fn next_event(events: &mut DeviceEvents) -> DeviceEvent {
    events
        .recv_timeout(WAIT)
        .await
        .expect("no event within timeout")
}
