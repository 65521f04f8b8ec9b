use crate::commands::CommandKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A locker protocol command, outbound or inbound.
///
/// Outbound commands come from [`CommandRequestBuilder`](crate::CommandRequestBuilder),
/// inbound ones from [`ResponseParser`](crate::ResponseParser). Both keep the
/// exact wire text in `raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerCommand {
    pub kind: CommandKind,

    /// Sender address field.
    pub sender: u16,

    /// Receiver address field.
    pub receiver: u16,

    /// Payload between the header and `=`.
    pub payload: String,

    /// CRC field as transmitted (4 hex characters).
    pub checksum: String,

    /// Complete wire text including start and end markers.
    pub raw: String,

    /// Locker part the command concerns. Set for outbound commands and for
    /// inbound status reports, where the sender field carries the part.
    pub locker_part: Option<u16>,

    /// Requested cells (outbound) or asserted cells (inbound status).
    pub cells: Option<Vec<u16>>,
}

impl LockerCommand {
    /// Wire bytes of the command.
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

impl fmt::Display for LockerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw.trim_end())
    }
}
