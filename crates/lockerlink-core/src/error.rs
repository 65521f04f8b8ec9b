use thiserror::Error;

/// Protocol-level errors shared by every lockerlink crate.
///
/// Variants fall into two families that callers treat differently:
///
/// - **Validation** errors are raised while *building* an outbound command and
///   indicate a caller bug (mixing locker parts, asking for a kind that has no
///   outbound wire code). They are returned synchronously and are fatal to the
///   build call.
/// - **Format** errors are raised while *parsing* inbound frames. Noisy serial
///   lines produce them routinely, so transports drop the frame and move on.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("Invalid cell number '{value}': {reason}")]
    InvalidCellNumber { value: String, reason: String },

    #[error("Cells must belong to one locker part: expected {expected}, got {actual}")]
    MixedLockerParts { expected: u16, actual: u16 },

    #[error("Command kind {kind} has no outbound wire code")]
    UnmappedCommand { kind: String },

    #[error("No cell selected for command")]
    NoCellSelected,

    #[error("Locker part {part} is out of range (0-{max})")]
    InvalidLockerPart { part: u32, max: u16 },

    // Format errors
    #[error("Unknown command code: {code}")]
    UnknownCommandCode { code: u16 },

    #[error("Invalid payload '{payload}': {reason}")]
    InvalidPayload { payload: String, reason: String },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was raised while building an outbound command.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCellNumber { .. }
                | Self::MixedLockerParts { .. }
                | Self::UnmappedCommand { .. }
                | Self::NoCellSelected
                | Self::InvalidLockerPart { .. }
        )
    }

    /// Whether this error was raised while parsing an inbound frame.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::UnknownCommandCode { .. }
                | Self::InvalidPayload { .. }
                | Self::ChecksumMismatch { .. }
        )
    }

    pub fn invalid_cell(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCellNumber {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_payload(payload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            payload: payload.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
