//! Core constants for the locker and tag-reader protocols.
//!
//! This module collects every protocol-level constant used across the
//! lockerlink crates so the wire format and device defaults live in one place.
//!
//! # Locker Protocol Structure
//!
//! Locker-bank controllers speak an ASCII protocol over a serial line:
//!
//! ```text
//! POST:<sender>,<receiver>,<code>,<payload-len>,<payload>=<crc-hi><crc-lo>\r\n
//! ```
//!
//! Where:
//! - `POST:` - Start marker
//! - `sender` / `receiver` - 1-3 digit addresses (this host is always `1`)
//! - `code` - Command code (1-3 digits)
//! - `payload-len` - Number of payload characters
//! - `payload` - Command payload; for cell commands a 4 hex digit mask
//! - `=` - Payload terminator, last byte covered by the CRC
//! - `crc` - CRC16 (poly 0xA001, init 0) as 4 hex digits, high byte first
//! - `\r\n` - End marker
//!
//! # Tag Reader Protocol
//!
//! Tag readers use a newline-terminated text protocol without a checksum.
//! Requests are bare words (`GSERNUM`), responses embed `KEY=value;` markers
//! inside arbitrary text.
//!
//! # Usage
//!
//! ```
//! use lockerlink_core::constants::*;
//!
//! assert_eq!(FRAME_START, b"POST:");
//! assert_eq!(FRAME_END, b"\r\n");
//! assert_eq!(OPEN_DOOR_CODE, 8);
//! ```

// ============================================================================
// Locker Frame Markers
// ============================================================================

/// Literal start marker of every locker frame.
pub const FRAME_START_TEXT: &str = "POST:";

/// Literal end marker of every locker frame (CRLF).
pub const FRAME_END_TEXT: &str = "\r\n";

/// [`FRAME_START_TEXT`] as bytes.
pub const FRAME_START: &[u8] = FRAME_START_TEXT.as_bytes();

/// [`FRAME_END_TEXT`] as bytes.
pub const FRAME_END: &[u8] = FRAME_END_TEXT.as_bytes();

/// Separator between header fields.
pub const FIELD_SEPARATOR: char = ',';

/// Terminator between payload and CRC field.
pub const PAYLOAD_TERMINATOR: char = '=';

/// Number of hex characters in the CRC field.
pub const CRC_HEX_LENGTH: usize = 4;

/// Maximum number of digits in a numeric header field.
pub const MAX_HEADER_DIGITS: usize = 3;

/// Upper bound on a gathered frame.
///
/// The payload length field has at most three digits, so no legitimate
/// frame exceeds the header plus 999 payload bytes plus CRC and CRLF.
pub const MAX_FRAME_LEN: usize = 1024;

// ============================================================================
// Locker Addressing
// ============================================================================

/// Address of this host in outbound frames.
pub const LOCAL_SENDER_ID: u16 = 1;

/// Highest locker part number that fits in a 3-digit header field.
pub const MAX_LOCKER_PART: u16 = 999;

/// Number of cells addressable by one 16-bit cell mask.
pub const CELLS_PER_MASK: u16 = 16;

/// Separator inside a global cell number such as `133_1` (part 133, cell 1).
pub const CELL_NUMBER_SEPARATOR: char = '_';

/// Length of a cell-mask payload in hex characters.
pub const CELL_MASK_PAYLOAD_LEN: usize = 4;

// ============================================================================
// Locker Command Codes
// ============================================================================

/// Outbound "open door" command.
pub const OPEN_DOOR_CODE: u16 = 8;

/// Status command, both directions.
pub const STATUS_CODE: u16 = 10;

/// Inbound barcode-read notification.
pub const BARCODE_READ_CODE: u16 = 2;

/// Inbound card-read notification.
pub const CARD_READ_CODE: u16 = 3;

// ============================================================================
// CRC16
// ============================================================================

/// Reflected polynomial of the locker CRC16 (CRC-16/ARC).
pub const CRC16_POLYNOMIAL: u16 = 0xA001;

/// Initial register value of the locker CRC16.
pub const CRC16_INIT: u16 = 0x0000;

// ============================================================================
// Tag Reader Protocol
// ============================================================================

/// Request for the firmware version.
pub const TAG_GET_VERSION: &str = "GVERSION";

/// Request for the serial number.
pub const TAG_GET_SERIAL_NUMBER: &str = "GSERNUM";

/// Request for the battery charge.
pub const TAG_GET_BATTERY_CHARGE: &str = "GBATTCHARGE";

/// Marker preceding a serial number in a tag response.
pub const TAG_SERIAL_MARKER: &str = "SERNUM=";

/// Marker preceding a battery charge in a tag response.
pub const TAG_BATTERY_MARKER: &str = "BATTCHARGE=";

/// Terminator of a `KEY=value;` marker.
pub const TAG_VALUE_TERMINATOR: char = ';';

/// Line terminator appended to every tag request.
pub const TAG_LINE_ENDING: &str = "\n";

// ============================================================================
// Serial Defaults
// ============================================================================

/// Default baud rate for both device families.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Write timeout for ports opened on hotplug (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Write timeout for ports opened on demand by a command (milliseconds).
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 1_000;

// ============================================================================
// Hotplug Monitoring
// ============================================================================

/// Directory holding one symlink per attached tag reader.
pub const DEFAULT_DEVICE_DIR: &str = "/dev/serial/by-path";

/// System device root watched for recreation of the device directory tree.
pub const DEFAULT_DEVICE_ROOT: &str = "/dev";

/// Delay after the device directory reappears before it is enumerated
/// (milliseconds). Freshly created directories are not reliably listable.
pub const DEFAULT_SETTLE_INTERVAL_MS: u64 = 100;

/// Marker prefixed to transient symlink names created during hotplug.
pub const TEMP_NAME_MARKER: &str = ".#";

/// Length of the random suffix appended to transient symlink names.
pub const DEFAULT_TEMP_SUFFIX_LEN: usize = 16;
