//! Line protocol of the tag readers.
//!
//! Requests are bare words terminated by `\n`. Responses are free text that
//! embeds `KEY=value;` markers, e.g. `SERNUM=04A1B2C3;\r\n`. Responses carry
//! no frame markers or checksum and are read as whatever bytes the port has
//! buffered.

use lockerlink_core::constants::{
    TAG_BATTERY_MARKER, TAG_GET_BATTERY_CHARGE, TAG_GET_SERIAL_NUMBER, TAG_GET_VERSION,
    TAG_LINE_ENDING, TAG_SERIAL_MARKER, TAG_VALUE_TERMINATOR,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request sent to a tag reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagCommand {
    GetVersion,
    GetSerialNumber,
    GetBatteryCharge,
}

impl TagCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetVersion => TAG_GET_VERSION,
            Self::GetSerialNumber => TAG_GET_SERIAL_NUMBER,
            Self::GetBatteryCharge => TAG_GET_BATTERY_CHARGE,
        }
    }

    /// Bytes written to the port, line ending included.
    pub fn wire(self) -> String {
        format!("{}{TAG_LINE_ENDING}", self.as_str())
    }
}

impl fmt::Display for TagCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interpretation of one chunk of reader output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagResponse {
    SerialNumber(String),
    BatteryCharge(String),
    /// Anything else, e.g. a version banner.
    Other(String),
}

impl TagResponse {
    /// Classify a response.
    ///
    /// The serial-number marker wins if both markers are present.
    ///
    /// ```
    /// use lockerlink_hardware::tag::TagResponse;
    ///
    /// assert_eq!(
    ///     TagResponse::parse("SERNUM=04A1B2C3;\r\n"),
    ///     TagResponse::SerialNumber("04A1B2C3".to_string())
    /// );
    /// assert_eq!(
    ///     TagResponse::parse("BATTCHARGE=87;"),
    ///     TagResponse::BatteryCharge("87".to_string())
    /// );
    /// ```
    pub fn parse(text: &str) -> Self {
        if let Some(serial) = marker_value(text, TAG_SERIAL_MARKER) {
            Self::SerialNumber(serial)
        } else if let Some(charge) = marker_value(text, TAG_BATTERY_MARKER) {
            Self::BatteryCharge(charge)
        } else {
            Self::Other(text.trim().to_string())
        }
    }
}

/// Value following `marker`, up to `;` or the end of the line.
fn marker_value(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| c == TAG_VALUE_TERMINATOR || c == '\r' || c == '\n')
        .unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}
