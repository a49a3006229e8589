//! Byte-level helpers shared by the codecs

use crate::error::{DlmsError, DlmsResult};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Format bytes as upper-case hex, optionally separated by single spaces.
pub fn to_hex(bytes: &[u8], add_space: bool) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if add_space && i != 0 {
            out.push(' ');
        }
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

fn hex_value(c: char) -> Option<u8> {
    c.to_digit(16).map(|v| v as u8)
}

/// Parse a hex string.
///
/// Digits may be grouped freely and separated with spaces, tabs, newlines,
/// `:` or `-`. Case is ignored. A single digit standing alone between
/// separators becomes one byte (`"A:B"` is `0A 0B`). Any other character
/// fails with [`DlmsError::MalformedInput`].
pub fn hex_to_bytes(hex: &str) -> DlmsResult<Vec<u8>> {
    let mut out = Vec::with_capacity(hex.len() / 2);
    let mut pending: Option<u8> = None;
    for (offset, c) in hex.chars().enumerate() {
        if let Some(v) = hex_value(c) {
            match pending.take() {
                Some(hi) => out.push((hi << 4) | v),
                None => pending = Some(v),
            }
        } else if c.is_whitespace() || c == ':' || c == '-' {
            if let Some(lone) = pending.take() {
                out.push(lone);
            }
        } else {
            return Err(DlmsError::malformed(
                offset,
                format!("unexpected character '{}' in hex string", c),
            ));
        }
    }
    if let Some(lone) = pending {
        out.push(lone);
    }
    Ok(out)
}

/// Number of bytes [`set_object_count`] writes for `count`.
pub fn object_count_size(count: usize) -> usize {
    if count < 0x80 {
        1
    } else if count < 0x100 {
        2
    } else if count < 0x10000 {
        3
    } else {
        5
    }
}

/// Append a BER object count (definite length) to `out`.
pub fn set_object_count(count: usize, out: &mut Vec<u8>) {
    if count < 0x80 {
        out.push(count as u8);
    } else if count < 0x100 {
        out.push(0x81);
        out.push(count as u8);
    } else if count < 0x10000 {
        out.push(0x82);
        out.extend_from_slice(&(count as u16).to_be_bytes());
    } else {
        out.push(0x84);
        out.extend_from_slice(&(count as u32).to_be_bytes());
    }
}

/// Reverse the bit order of a single byte.
pub fn swap_bits(value: u8) -> u8 {
    value.reverse_bits()
}

/// Return a reversed copy of `bytes`.
pub fn reverse(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerant_hex() {
        let bytes = hex_to_bytes("7E-A007:03 21 93 0F 01 7E").unwrap();
        assert_eq!(bytes, vec![0x7E, 0xA0, 0x07, 0x03, 0x21, 0x93, 0x0F, 0x01, 0x7E]);
        assert_eq!(to_hex(&bytes, true), "7E A0 07 03 21 93 0F 01 7E");
        assert_eq!(to_hex(&bytes, false), "7EA0070321930F017E");
    }

    #[test]
    fn test_hex_mixed_case_and_lone_digits() {
        assert_eq!(hex_to_bytes("aB cd").unwrap(), vec![0xAB, 0xCD]);
        assert_eq!(hex_to_bytes("A:B").unwrap(), vec![0x0A, 0x0B]);
        assert_eq!(hex_to_bytes("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_hex_rejects_garbage() {
        assert!(matches!(
            hex_to_bytes("12 3G"),
            Err(DlmsError::MalformedInput { offset: 4, .. })
        ));
    }

    #[test]
    fn test_swap_bits_and_reverse() {
        assert_eq!(swap_bits(0x01), 0x80);
        assert_eq!(swap_bits(0xA0), 0x05);
        assert_eq!(reverse(&[1, 2, 3]), vec![3, 2, 1]);
    }
}
