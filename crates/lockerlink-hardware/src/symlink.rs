//! Hotplug symlink handling.
//!
//! udev publishes each reader as a symlink such as
//! `/dev/serial/by-path/platform-3f980000.usb-usb-0:1.2:1.0` pointing at
//! `../../ttyACM0`. The link is created atomically: udev first writes a
//! transient link named `.#<name><16 random characters>` and then renames it.
//! Watchers can observe the transient name, so event paths are trimmed back
//! to the final name before use.

use crate::error::{HardwareError, Result};
use lockerlink_core::constants::TEMP_NAME_MARKER;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Strip transient-link decoration from a file name.
///
/// If `name` contains the `.#` marker, every occurrence is removed and the
/// trailing `suffix_len` characters are dropped. Names shorter than
/// `suffix_len` are returned unchanged.
///
/// ```
/// use lockerlink_hardware::symlink::trim_temp_symbols;
///
/// assert_eq!(trim_temp_symbols(".#usb-0:1.2ABCDEFGHIJKLMNOP", 16), "usb-0:1.2");
/// assert_eq!(trim_temp_symbols("usb-0:1.2:1.0-port0", 16), "usb-0:1.2:1.0-port0");
/// ```
pub fn trim_temp_symbols(name: &str, suffix_len: usize) -> String {
    if name.chars().count() < suffix_len || !name.contains(TEMP_NAME_MARKER) {
        return name.to_string();
    }

    let stripped = name.replace(TEMP_NAME_MARKER, "");
    let keep = stripped.chars().count().saturating_sub(suffix_len);
    stripped.chars().take(keep).collect()
}

/// Whether a file name carries transient-link decoration.
pub fn is_temp_name(name: &str) -> bool {
    name.contains(TEMP_NAME_MARKER)
}

/// Apply [`trim_temp_symbols`] to the file name of `path`.
pub fn undecorated_path(path: &Path, suffix_len: usize) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) if is_temp_name(name) => path.with_file_name(trim_temp_symbols(name, suffix_len)),
        _ => path.to_path_buf(),
    }
}

/// Resolve a device symlink to the device node it points at.
///
/// Reads the link once and resolves a relative target against the link's
/// directory. A path that is not a symlink resolves to itself. The result
/// is normalized lexically and must exist.
///
/// # Errors
/// Returns `HardwareError::Resolve` if the link cannot be read or its target
/// does not exist.
pub fn resolve_real_path(link: &Path) -> Result<PathBuf> {
    let target = match std::fs::read_link(link) {
        Ok(target) => target,
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => link.to_path_buf(),
        Err(e) => return Err(HardwareError::resolve(link, e.to_string())),
    };

    let absolute = if target.is_absolute() {
        target
    } else {
        link.parent().unwrap_or_else(|| Path::new("/")).join(target)
    };
    let real = normalize(&absolute);

    if !real.exists() {
        return Err(HardwareError::resolve(
            link,
            format!("target '{}' does not exist", real.display()),
        ));
    }
    Ok(real)
}

/// Remove `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
