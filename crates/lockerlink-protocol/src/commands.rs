//! Locker command kinds and their wire codes.
//!
//! Outbound and inbound codes are distinct tables: the host sends `8` (open
//! door) and `10` (status), controllers report `2` (barcode read), `3` (card
//! read) and `10` (status). A kind's wire code is never its ordinal.

use lockerlink_core::{
    Error, Result,
    constants::{BARCODE_READ_CODE, CARD_READ_CODE, OPEN_DOOR_CODE, STATUS_CODE},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a locker protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Open the doors of the selected cells.
    OpenDoor,
    /// Cell status request (outbound) or report (inbound).
    Status,
    /// A card was presented to the bank's reader.
    OnCardRead,
    /// A barcode was scanned by the bank's reader.
    OnBarcodeRead,
}

impl CommandKind {
    /// Wire code used when the host sends this kind.
    ///
    /// # Errors
    /// Returns `Error::UnmappedCommand` for kinds the host never sends.
    pub fn outbound_code(self) -> Result<u16> {
        match self {
            Self::OpenDoor => Ok(OPEN_DOOR_CODE),
            Self::Status => Ok(STATUS_CODE),
            Self::OnCardRead | Self::OnBarcodeRead => Err(Error::UnmappedCommand {
                kind: self.to_string(),
            }),
        }
    }

    /// Map a wire code received from a controller.
    ///
    /// # Errors
    /// Returns `Error::UnknownCommandCode` for any code outside 2, 3 and 10.
    pub fn from_inbound_code(code: u16) -> Result<Self> {
        match code {
            BARCODE_READ_CODE => Ok(Self::OnBarcodeRead),
            CARD_READ_CODE => Ok(Self::OnCardRead),
            STATUS_CODE => Ok(Self::Status),
            _ => Err(Error::UnknownCommandCode { code }),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenDoor => write!(f, "OpenDoor"),
            Self::Status => write!(f, "Status"),
            Self::OnCardRead => write!(f, "OnCardRead"),
            Self::OnBarcodeRead => write!(f, "OnBarcodeRead"),
        }
    }
}
