//! 16-bit cell mask carried in cell command payloads.
//!
//! Bit *i* set means cell *i + 1* is asserted. On the wire the mask is four
//! hex digits, high byte first, so `0003` selects cells 1 and 2.

use lockerlink_core::{
    Error, Result,
    constants::{CELL_MASK_PAYLOAD_LEN, CELLS_PER_MASK},
};
use serde::{Deserialize, Serialize};

/// How an outbound command turns its requested cells into a mask.
///
/// # Deployed behaviour
///
/// **The default, [`CellMaskMode::AllCells`], ignores the requested cells and
/// always transmits `FFFF`.** This is what the deployed locker integration
/// sends, and controllers in the field are commissioned against it. Per-cell
/// addressing is available through [`CellMaskMode::PerCell`], which must be
/// selected explicitly because it changes which doors a command opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellMaskMode {
    /// Every bit set regardless of the requested cells.
    #[default]
    AllCells,
    /// Only the bits of the requested cells set.
    PerCell,
}

/// A 16-bit cell mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellMask(u16);

impl CellMask {
    pub const ALL: CellMask = CellMask(u16::MAX);

    pub fn new(bits: u16) -> Self {
        Self(bits)
    }

    /// Build a mask with one bit per requested cell.
    ///
    /// # Errors
    /// Returns `Error::InvalidCellNumber` for cells outside 1-16.
    pub fn from_cells(cells: &[u16]) -> Result<Self> {
        let mut bits = 0u16;
        for &cell in cells {
            if !(1..=CELLS_PER_MASK).contains(&cell) {
                return Err(Error::invalid_cell(
                    cell.to_string(),
                    format!("cell must be 1-{CELLS_PER_MASK} for per-cell masks"),
                ));
            }
            bits |= 1 << (cell - 1);
        }
        Ok(Self(bits))
    }

    /// Build the mask an outbound command transmits under `mode`.
    pub fn for_request(mode: CellMaskMode, cells: &[u16]) -> Result<Self> {
        match mode {
            CellMaskMode::AllCells => Ok(Self::ALL),
            CellMaskMode::PerCell => Self::from_cells(cells),
        }
    }

    /// Decode a 4 hex digit payload.
    ///
    /// # Errors
    /// Returns `Error::InvalidPayload` unless the payload is exactly four hex
    /// characters.
    pub fn from_payload(payload: &str) -> Result<Self> {
        if payload.len() != CELL_MASK_PAYLOAD_LEN {
            return Err(Error::invalid_payload(
                payload,
                format!("expected {CELL_MASK_PAYLOAD_LEN} hex characters"),
            ));
        }
        if !payload.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::invalid_payload(payload, "not a hex number"));
        }
        u16::from_str_radix(payload, 16)
            .map(Self)
            .map_err(|e| Error::invalid_payload(payload, e.to_string()))
    }

    /// Render as the 4 hex digit payload, high byte first.
    pub fn to_payload(self) -> String {
        format!("{:04X}", self.0)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn is_set(self, cell: u16) -> bool {
        (1..=CELLS_PER_MASK).contains(&cell) && self.0 & (1 << (cell - 1)) != 0
    }

    /// Asserted cells in ascending order.
    pub fn cells(self) -> Vec<u16> {
        (1..=CELLS_PER_MASK).filter(|&cell| self.is_set(cell)).collect()
    }
}
