//! Mock transports for testing without serial hardware.
//!
//! [`MockPortOpener`] hands out in-memory pipes in place of device nodes and
//! keeps the far end of each one so a test can play the device.

pub mod serial;

pub use serial::{MockPortOpener, MockRemote};
