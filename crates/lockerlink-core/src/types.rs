use crate::{
    Result,
    constants::{CELL_NUMBER_SEPARATOR, MAX_LOCKER_PART},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Locker part number (0-999).
///
/// A locker bank is split into parts, each driven by its own controller
/// board and addressed by this number in the receiver field of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockerPart(u16);

impl LockerPart {
    /// Create a new locker part with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidLockerPart` if the number does not fit the
    /// 3-digit receiver field.
    pub fn new(part: u16) -> Result<Self> {
        if part > MAX_LOCKER_PART {
            return Err(Error::InvalidLockerPart {
                part: u32::from(part),
                max: MAX_LOCKER_PART,
            });
        }
        Ok(LockerPart(part))
    }

    #[must_use]
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for LockerPart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LockerPart {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let part: u32 = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_cell(s, "locker part is not a number"))?;
        let part = u16::try_from(part).map_err(|_| Error::InvalidLockerPart {
            part,
            max: MAX_LOCKER_PART,
        })?;
        LockerPart::new(part)
    }
}

/// Global cell address: a cell within a locker part.
///
/// Written as `<part>_<cell>`, e.g. `133_1` is cell 1 of part 133.
///
/// ```
/// use lockerlink_core::CellAddress;
///
/// let address: CellAddress = "133_1".parse().unwrap();
/// assert_eq!(address.part.as_u16(), 133);
/// assert_eq!(address.cell, 1);
/// assert_eq!(address.to_string(), "133_1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub part: LockerPart,
    pub cell: u16,
}

impl CellAddress {
    pub fn new(part: LockerPart, cell: u16) -> Self {
        Self { part, cell }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.part, CELL_NUMBER_SEPARATOR, self.cell)
    }
}

impl std::str::FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (part, cell) = s
            .split_once(CELL_NUMBER_SEPARATOR)
            .ok_or_else(|| Error::invalid_cell(s, "expected <part>_<cell>"))?;

        let part: u16 = part
            .parse()
            .map_err(|_| Error::invalid_cell(s, "locker part is not a number"))?;
        let cell: u16 = cell
            .parse()
            .map_err(|_| Error::invalid_cell(s, "cell is not a number"))?;

        Ok(CellAddress::new(LockerPart::new(part)?, cell))
    }
}
