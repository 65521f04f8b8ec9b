//! Shared helpers for the protocol integration tests.

#![allow(dead_code)]

use lockerlink_protocol::crc16;

/// Build an inbound frame with a correct CRC.
///
/// The payload length field is filled in from `payload`.
pub fn inbound_frame(sender: u16, receiver: u16, code: u16, payload: &str) -> String {
    let header = format!(
        "POST:{sender},{receiver},{code},{len},{payload}=",
        len = payload.len()
    );
    let checksum = crc16::checksum_hex(header.as_bytes());
    format!("{header}{checksum}\r\n")
}

/// Status report from locker part `part` asserting the cells in `mask`.
pub fn status_report(part: u16, mask: u16) -> String {
    inbound_frame(part, 1, 10, &format!("{mask:04X}"))
}

/// Split `bytes` into chunks whose lengths cycle through `sizes`.
pub fn chunk_by<'a>(bytes: &'a [u8], sizes: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut rest = bytes;
    let mut i = 0;
    while !rest.is_empty() {
        let size = sizes[i % sizes.len()].clamp(1, rest.len());
        let (head, tail) = rest.split_at(size);
        chunks.push(head);
        rest = tail;
        i += 1;
    }
    chunks
}
