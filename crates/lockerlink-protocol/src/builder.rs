//! Builder for outbound locker commands.
//!
//! # Examples
//!
//! ```
//! use lockerlink_protocol::{CommandKind, CommandRequestBuilder};
//!
//! let command = CommandRequestBuilder::new()
//!     .event_type(CommandKind::OpenDoor)
//!     .cell_number("133_1")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(command.raw, "POST:1,133,8,4,FFFF=6CA4\r\n");
//! ```
//!
//! Cells from different locker parts cannot share a command:
//!
//! ```
//! use lockerlink_protocol::CommandRequestBuilder;
//!
//! let result = CommandRequestBuilder::new()
//!     .cell_number("1_1")
//!     .unwrap()
//!     .cell_number("2_1");
//! assert!(result.unwrap_err().is_validation());
//! ```

use crate::{
    cell_mask::{CellMask, CellMaskMode},
    commands::CommandKind,
    crc16,
    message::LockerCommand,
};
use lockerlink_core::{
    CellAddress, Error, LockerPart, Result,
    constants::{
        FIELD_SEPARATOR, FRAME_END_TEXT, FRAME_START_TEXT, LOCAL_SENDER_ID, PAYLOAD_TERMINATOR,
    },
};

/// Builder for outbound locker commands.
#[derive(Debug, Clone)]
pub struct CommandRequestBuilder {
    kind: CommandKind,
    part: Option<LockerPart>,
    cells: Vec<u16>,
    mask_mode: CellMaskMode,
}

impl CommandRequestBuilder {
    /// Start an `OpenDoor` command with the deployed all-cells mask.
    pub fn new() -> Self {
        Self {
            kind: CommandKind::OpenDoor,
            part: None,
            cells: Vec::new(),
            mask_mode: CellMaskMode::default(),
        }
    }

    pub fn event_type(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// Select how requested cells become the payload mask.
    ///
    /// See [`CellMaskMode`] for why the default transmits every cell.
    pub fn mask_mode(mut self, mode: CellMaskMode) -> Self {
        self.mask_mode = mode;
        self
    }

    /// Add a cell by its global number, e.g. `"133_1"`.
    ///
    /// # Errors
    /// Returns a validation error if the text is malformed or the cell belongs
    /// to a different locker part than the cells added before it.
    pub fn cell_number(self, cell_number: &str) -> Result<Self> {
        let address: CellAddress = cell_number.parse()?;
        self.cell(address.part, address.cell)
    }

    /// Add a cell of `part`.
    ///
    /// # Errors
    /// Returns `Error::MixedLockerParts` if `part` differs from the part of the
    /// cells added before it.
    pub fn cell(mut self, part: LockerPart, cell: u16) -> Result<Self> {
        if let Some(existing) = self.part
            && existing != part
        {
            return Err(Error::MixedLockerParts {
                expected: existing.as_u16(),
                actual: part.as_u16(),
            });
        }
        self.part = Some(part);
        self.cells.push(cell);
        Ok(self)
    }

    /// Assemble the frame.
    ///
    /// # Errors
    /// Returns a validation error if no cell was added or the command kind has
    /// no outbound wire code.
    pub fn build(&self) -> Result<LockerCommand> {
        let part = self.part.ok_or(Error::NoCellSelected)?;
        let code = self.kind.outbound_code()?;
        let payload = CellMask::for_request(self.mask_mode, &self.cells)?.to_payload();

        let sep = FIELD_SEPARATOR;

        let header = format!(
            "{FRAME_START_TEXT}{LOCAL_SENDER_ID}{sep}{part}{sep}{code}{sep}{len}{sep}{payload}{PAYLOAD_TERMINATOR}",
            len = payload.len(),
        );
        let checksum = crc16::checksum_hex(header.as_bytes());
        let raw = format!("{header}{checksum}{FRAME_END_TEXT}");

        Ok(LockerCommand {
            kind: self.kind,
            sender: LOCAL_SENDER_ID,
            receiver: part.as_u16(),
            payload,
            checksum,
            raw,
            locker_part: Some(part.as_u16()),
            cells: Some(self.cells.clone()),
        })
    }
}

impl Default for CommandRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(n: u16) -> LockerPart {
        LockerPart::new(n).unwrap()
    }

    #[test]
    fn test_open_door_frame() {
        let command = CommandRequestBuilder::new()
            .event_type(CommandKind::OpenDoor)
            .cell_number("133_1")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(command.raw, "POST:1,133,8,4,FFFF=6CA4\r\n");
        assert_eq!(command.checksum, "6CA4");
        assert_eq!(command.payload, "FFFF");
        assert_eq!(command.sender, 1);
        assert_eq!(command.receiver, 133);
        assert_eq!(command.locker_part, Some(133));
        assert_eq!(command.cells, Some(vec![1]));
    }

    #[test]
    fn test_checksum_covers_bytes_through_terminator() {
        let command = CommandRequestBuilder::new()
            .cell_number("133_1")
            .unwrap()
            .build()
            .unwrap();

        let covered = &command.raw[..command.raw.find('=').unwrap() + 1];
        assert_eq!(covered, "POST:1,133,8,4,FFFF=");
        assert_eq!(crc16::checksum_hex(covered.as_bytes()), command.checksum);
    }

    #[test]
    fn test_status_frame() {
        let command = CommandRequestBuilder::new()
            .event_type(CommandKind::Status)
            .cell(part(1), 1)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(command.raw, "POST:1,1,10,4,FFFF=7633\r\n");
        assert_eq!(command.kind, CommandKind::Status);
    }

    #[test]
    fn test_per_cell_mask_matches_field_capture() {
        let command = CommandRequestBuilder::new()
            .mask_mode(CellMaskMode::PerCell)
            .cell_number("128_1")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(command.raw, "POST:1,128,8,4,0001=2269\r\n");
    }

    #[test]
    fn test_per_cell_mask_multiple_cells() {
        let command = CommandRequestBuilder::new()
            .mask_mode(CellMaskMode::PerCell)
            .cell_number("5_1")
            .unwrap()
            .cell_number("5_2")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(command.payload, "0003");
        assert_eq!(command.cells, Some(vec![1, 2]));
    }

    #[test]
    fn test_all_cells_mode_ignores_cells() {
        let first = CommandRequestBuilder::new()
            .cell_number("7_1")
            .unwrap()
            .build()
            .unwrap();
        let second = CommandRequestBuilder::new()
            .cell_number("7_9")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(first.raw, second.raw);
        assert_eq!(first.payload, "FFFF");
    }

    #[test]
    fn test_mixed_parts_rejected() {
        let error = CommandRequestBuilder::new()
            .cell_number("1_1")
            .unwrap()
            .cell_number("2_1")
            .unwrap_err();

        assert!(matches!(
            error,
            Error::MixedLockerParts {
                expected: 1,
                actual: 2
            }
        ));
        assert!(error.is_validation());
    }

    #[test]
    fn test_same_part_accepted() {
        let builder = CommandRequestBuilder::new()
            .cell_number("3_1")
            .unwrap()
            .cell_number("3_4")
            .unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_unmapped_kind_rejected() {
        let error = CommandRequestBuilder::new()
            .event_type(CommandKind::OnCardRead)
            .cell_number("1_1")
            .unwrap()
            .build()
            .unwrap_err();

        assert!(matches!(error, Error::UnmappedCommand { .. }));
    }

    #[test]
    fn test_no_cells_rejected() {
        let error = CommandRequestBuilder::new().build().unwrap_err();
        assert!(matches!(error, Error::NoCellSelected));
    }

    #[test]
    fn test_malformed_cell_number_rejected() {
        let error = CommandRequestBuilder::new().cell_number("133").unwrap_err();
        assert!(error.is_validation());
    }

    #[test]
    fn test_per_cell_out_of_range_rejected_at_build() {
        let error = CommandRequestBuilder::new()
            .mask_mode(CellMaskMode::PerCell)
            .cell_number("1_17")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(error.is_validation());
    }
}
