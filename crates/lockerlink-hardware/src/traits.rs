//! Caller-facing device traits.
//!
//! Hosts program against these traits so the façades can be swapped for
//! test doubles.

#![allow(async_fn_in_trait)]

use crate::{
    Result, locker_controller::LockerController, registry::DeviceInfo,
    tag::TagCommand, tag_controller::TagDeviceController,
};
use lockerlink_protocol::{CommandKind, CommandRequestBuilder, LockerCommand};

/// A locker bank that accepts protocol commands.
pub trait LockerDevice: Send {
    /// Write a built command to the locker bank.
    async fn send_command(&mut self, command: &LockerCommand) -> Result<()>;

    /// Open the door of `cell_number` (`<part>_<cell>`).
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Protocol` if the cell number is invalid.
    async fn open_door(&mut self, cell_number: &str) -> Result<()> {
        let command = CommandRequestBuilder::new()
            .event_type(CommandKind::OpenDoor)
            .cell_number(cell_number)?
            .build()?;
        self.send_command(&command).await
    }
}

/// A set of tag readers addressed by serial number.
pub trait TagDevices: Send + Sync {
    /// Request the battery charge of `identity`; the answer arrives as an
    /// event.
    async fn get_charge_level(&self, identity: &str);

    async fn send_command(&self, identity: &str, command: TagCommand) -> Result<()>;

    async fn devices(&self) -> Vec<DeviceInfo>;
}

impl LockerDevice for LockerController {
    async fn send_command(&mut self, command: &LockerCommand) -> Result<()> {
        LockerController::send_command(self, command).await
    }
}

impl TagDevices for TagDeviceController {
    async fn get_charge_level(&self, identity: &str) {
        TagDeviceController::get_charge_level(self, identity).await;
    }

    async fn send_command(&self, identity: &str, command: TagCommand) -> Result<()> {
        TagDeviceController::send_command(self, identity, command).await
    }

    async fn devices(&self) -> Vec<DeviceInfo> {
        TagDeviceController::devices(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn open_first_cell<L: LockerDevice>(locker: &mut L, part: u16) -> Result<()> {
        locker.open_door(&format!("{part}_1")).await
    }

    #[tokio::test]
    async fn test_generic_locker_device() {
        let (host, mut far) = tokio::io::duplex(256);
        let (mut locker, _events) = LockerController::from_transport(Box::new(host), "duplex");

        open_first_cell(&mut locker, 133).await.unwrap();

        let mut buf = [0u8; 26];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"POST:1,133,8,4,FFFF=6CA4\r\n");
    }
}
