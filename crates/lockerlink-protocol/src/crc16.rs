//! CRC16 used by the locker protocol.
//!
//! Reflected CRC16 with polynomial `0xA001` and initial value `0`
//! (the CRC-16/ARC parameter set). The lookup table is computed at compile
//! time, so every call is a plain table walk.
//!
//! ```
//! use lockerlink_protocol::crc16;
//!
//! assert_eq!(crc16::checksum(b"POST:1,128,8,4,0001="), 0x2269);
//! assert_eq!(crc16::checksum_hex(b"POST:1,128,8,4,0001="), "2269");
//! ```

use lockerlink_core::constants::{CRC16_INIT, CRC16_POLYNOMIAL};

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut value: u16 = 0;
        let mut temp = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if (value ^ temp) & 0x0001 != 0 {
                value = (value >> 1) ^ CRC16_POLYNOMIAL;
            } else {
                value >>= 1;
            }
            temp >>= 1;
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

/// Compute the CRC16 of `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(CRC16_INIT, |crc, &byte| {
        let index = (crc ^ u16::from(byte)) as u8;
        (crc >> 8) ^ TABLE[index as usize]
    })
}

/// Compute the CRC16 of `bytes` rendered as it appears on the wire:
/// four uppercase hex digits, high byte first.
pub fn checksum_hex(bytes: &[u8]) -> String {
    format!("{:04X}", checksum(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum_hex(&[]), "0000");
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(TABLE[0], 0x0000);
        assert_eq!(TABLE[1], 0xC0C1);
        assert_eq!(TABLE[2], 0xC181);
        assert_eq!(TABLE[3], 0x0140);
        assert_eq!(TABLE[255], 0x4040);
    }

    #[test]
    fn test_standard_check_value() {
        // CRC-16/ARC check value
        assert_eq!(checksum(b"123456789"), 0xBB3D);
    }

    #[rstest]
    #[case(b"POST:1,128,8,4,0001=", "2269")]
    #[case(b"POST:1,133,8,4,FFFF=", "6CA4")]
    #[case(b"POST:1,1,10,4,0001=", "DF26")]
    #[case(b"POST:1,1,8,4,FFFF=", "8922")]
    #[case(b"POST:1,1,10,4,0003=", "BF27")]
    #[case(b"POST:12,1,3,8,12345678=", "4052")]
    fn test_known_frames(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(checksum_hex(bytes), expected);
    }

    #[test]
    fn test_deterministic() {
        let frame = b"POST:1,7,10,4,FFFF=";
        assert_eq!(checksum(frame), checksum(frame));
        assert_eq!(checksum(frame), 0x7E3B);
    }

    #[test]
    fn test_hex_is_high_byte_first() {
        let crc = checksum(b"POST:1,128,8,4,0001=");
        let [low, high] = crc.to_le_bytes();
        assert_eq!(
            checksum_hex(b"POST:1,128,8,4,0001="),
            format!("{high:02X}{low:02X}")
        );
    }
}
