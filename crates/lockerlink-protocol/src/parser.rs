//! Parser for inbound locker frames.
//!
//! Inbound frames follow the fixed grammar
//!
//! ```text
//! POST:<sender>,<receiver>,<code>,<payload-len>,<payload>=<crc>\r\n
//! ```
//!
//! with every numeric field 1-3 ASCII digits, a non-empty payload and a
//! 4 hex digit CRC. Input that does not match the grammar is not an error:
//! serial lines carry noise and partial frames, so [`ResponseParser::parse`]
//! reports it as `Ok(None)`. Input that matches the grammar but carries an
//! unknown command code or a malformed status payload is a format error.
//!
//! # Checksums
//!
//! The CRC field is extracted but not verified by default, matching what
//! controllers in the field are known to accept. [`ResponseParser::strict`]
//! verifies it and rejects mismatches with `Error::ChecksumMismatch`.
//!
//! # Examples
//!
//! ```
//! use lockerlink_protocol::{CommandKind, ResponseParser};
//!
//! let parser = ResponseParser::new();
//! let command = parser
//!     .parse(b"POST:1,1,10,4,0003=BF27\r\n")
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(command.kind, CommandKind::Status);
//! assert_eq!(command.locker_part, Some(1));
//! assert_eq!(command.cells, Some(vec![1, 2]));
//!
//! // Noise is not an error
//! assert!(parser.parse(b"garbage").unwrap().is_none());
//! ```

use crate::{cell_mask::CellMask, commands::CommandKind, crc16, message::LockerCommand};
use lockerlink_core::{
    Error, Result,
    constants::{
        CRC_HEX_LENGTH, FIELD_SEPARATOR, FRAME_END_TEXT, FRAME_START_TEXT, MAX_HEADER_DIGITS,
        PAYLOAD_TERMINATOR,
    },
};

/// Number of numeric header fields preceding the payload.
const HEADER_FIELDS: usize = 4;

/// Parser for inbound locker frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    verify_checksum: bool,
}

/// Grammar-level pieces of a frame, before any semantic mapping.
struct RawFields<'a> {
    header: [u16; HEADER_FIELDS],
    payload: &'a str,
    checksum: &'a str,
    covered: &'a str,
}

impl ResponseParser {
    /// Parser that accepts any well-formed CRC field.
    pub fn new() -> Self {
        Self {
            verify_checksum: false,
        }
    }

    /// Parser that recomputes and verifies the CRC of every frame.
    pub fn strict() -> Self {
        Self {
            verify_checksum: true,
        }
    }

    pub fn verifies_checksum(&self) -> bool {
        self.verify_checksum
    }

    /// Parse one complete frame.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(command))` for a frame that matches the grammar
    /// - `Ok(None)` for input that does not match it (noise, partial frames)
    ///
    /// # Errors
    ///
    /// Returns a format error (`Error::is_format`) when the frame matches the
    /// grammar but its command code is unknown, its status payload is not a
    /// 4 hex digit cell mask, or, for a strict parser, its CRC is wrong.
    pub fn parse(&self, bytes: &[u8]) -> Result<Option<LockerCommand>> {
        if !bytes.is_ascii() {
            return Ok(None);
        }
        let Ok(text) = std::str::from_utf8(bytes) else {
            return Ok(None);
        };
        let Some(fields) = split_fields(text) else {
            return Ok(None);
        };

        if self.verify_checksum {
            let expected = crc16::checksum_hex(fields.covered.as_bytes());
            if !expected.eq_ignore_ascii_case(fields.checksum) {
                return Err(Error::ChecksumMismatch {
                    expected,
                    actual: fields.checksum.to_string(),
                });
            }
        }

        let [sender, receiver, code, _payload_len] = fields.header;
        let kind = CommandKind::from_inbound_code(code)?;

        let (locker_part, cells) = match kind {
            CommandKind::Status => {
                let mask = CellMask::from_payload(fields.payload)?;
                (Some(sender), Some(mask.cells()))
            }
            _ => (None, None),
        };

        Ok(Some(LockerCommand {
            kind,
            sender,
            receiver,
            payload: fields.payload.to_string(),
            checksum: fields.checksum.to_string(),
            raw: text.to_string(),
            locker_part,
            cells,
        }))
    }
}

/// Split a frame into header fields, payload and CRC.
///
/// Returns `None` if the text does not match the frame grammar.
fn split_fields(text: &str) -> Option<RawFields<'_>> {
    let inner = text.strip_prefix(FRAME_START_TEXT)?;
    let inner = inner.strip_suffix(FRAME_END_TEXT)?;

    // <header...><payload>=<crc>
    if inner.len() < CRC_HEX_LENGTH + 1 {
        return None;
    }
    let (before_crc, checksum) = inner.split_at(inner.len() - CRC_HEX_LENGTH);
    if !checksum.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let before_payload_end = before_crc.strip_suffix(PAYLOAD_TERMINATOR)?;

    let mut header = [0u16; HEADER_FIELDS];
    let mut rest = before_payload_end;
    for slot in &mut header {
        let (field, tail) = rest.split_once(FIELD_SEPARATOR)?;
        *slot = parse_header_field(field)?;
        rest = tail;
    }

    let payload = rest;
    if payload.is_empty() || payload.contains('\n') {
        return None;
    }

    let covered_len = FRAME_START_TEXT.len() + before_crc.len();
    Some(RawFields {
        header,
        payload,
        checksum,
        covered: &text[..covered_len],
    })
}

fn parse_header_field(field: &str) -> Option<u16> {
    if field.is_empty()
        || field.len() > MAX_HEADER_DIGITS
        || !field.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    field.parse().ok()
}
