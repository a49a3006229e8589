//! Bit string type for DLMS/COSEM protocol

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arbitrary string of bits, most significant bit of the first byte first.
///
/// The unused low bits of the last byte are the pad bits (0..=7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BitString {
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitString {
    /// Construct a bit string holding the first `num_bits` bits of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is shorter than `ceil(num_bits / 8)` bytes.
    /// Surplus whole bytes are dropped.
    pub fn new(mut bytes: Vec<u8>, num_bits: usize) -> DlmsResult<Self> {
        let needed = num_bits.div_ceil(8);
        if bytes.len() < needed {
            return Err(DlmsError::InvalidData(format!(
                "bit string needs {} bytes for {} bits, got {}",
                needed,
                num_bits,
                bytes.len()
            )));
        }
        bytes.truncate(needed);
        Ok(Self { bytes, num_bits })
    }

    /// Build from the ASN.1 form: pad-bit count and the padded bytes.
    pub fn from_padded(pad_bits: u8, bytes: Vec<u8>) -> DlmsResult<Self> {
        if pad_bits > 7 || (bytes.is_empty() && pad_bits != 0) {
            return Err(DlmsError::InvalidData(format!(
                "invalid pad bit count {}",
                pad_bits
            )));
        }
        let num_bits = bytes.len() * 8 - pad_bits as usize;
        Ok(Self { bytes, num_bits })
    }

    /// A bit string of `num_bits` zero bits.
    pub fn zeros(num_bits: usize) -> Self {
        Self {
            bytes: vec![0; num_bits.div_ceil(8)],
            num_bits,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Unused bits in the final byte.
    pub fn pad_bits(&self) -> u8 {
        (self.bytes.len() * 8 - self.num_bits) as u8
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Get the bit at `index` (0-based, MSB first)
    pub fn get_bit(&self, index: usize) -> DlmsResult<bool> {
        if index >= self.num_bits {
            return Err(DlmsError::InvalidData(format!(
                "Bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        Ok((self.bytes[index / 8] >> (7 - index % 8)) & 1 == 1)
    }

    /// Set the bit at `index` (0-based, MSB first)
    pub fn set_bit(&mut self, index: usize, value: bool) -> DlmsResult<()> {
        if index >= self.num_bits {
            return Err(DlmsError::InvalidData(format!(
                "Bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        let mask = 1 << (7 - index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
        Ok(())
    }

    /// Interpret the bits as a little-endian flag word: bit 0 of the result
    /// is the first bit of the string.
    ///
    /// This is how ASN.1 named-bit lists such as X.509 `keyUsage` map onto
    /// flag values.
    pub fn to_integer(&self) -> u64 {
        self.bytes
            .iter()
            .take(8)
            .enumerate()
            .fold(0u64, |acc, (i, b)| acc | (u64::from(b.reverse_bits()) << (8 * i)))
    }

    /// Inverse of [`to_integer`](Self::to_integer), keeping only as many
    /// bits as the highest set flag needs.
    pub fn from_integer(value: u64) -> Self {
        if value == 0 {
            return Self::default();
        }
        let num_bits = 64 - value.leading_zeros() as usize;
        let bytes = (0..num_bits.div_ceil(8))
            .map(|i| ((value >> (8 * i)) as u8).reverse_bits())
            .collect();
        Self { bytes, num_bits }
    }
}

impl FromStr for BitString {
    type Err = DlmsError;

    /// Parse a string of `'0'`/`'1'` characters. Spaces are ignored.
    fn from_str(s: &str) -> DlmsResult<Self> {
        let bits: Vec<bool> = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(DlmsError::mismatch(format!("'{}'", other), "BitString")),
            })
            .collect::<DlmsResult<_>>()?;
        let mut result = Self::zeros(bits.len());
        for (i, bit) in bits.into_iter().enumerate() {
            result.set_bit(i, bit)?;
        }
        Ok(result)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.num_bits {
            let bit = (self.bytes[i / 8] >> (7 - i % 8)) & 1;
            f.write_str(if bit == 1 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_string_new() {
        let bytes = vec![0xFF, 0x00, 0xAA];
        let bit_string = BitString::new(bytes.clone(), 24).unwrap();
        assert_eq!(bit_string.as_bytes(), &bytes);
        assert_eq!(bit_string.pad_bits(), 0);
    }

    #[test]
    fn test_bit_string_too_short() {
        assert!(BitString::new(vec![0xFF], 16).is_err());
    }

    #[test]
    fn test_parse_and_display() {
        let bs: BitString = "1010 1".parse().unwrap();
        assert_eq!(bs.num_bits(), 5);
        assert_eq!(bs.pad_bits(), 3);
        assert_eq!(bs.as_bytes(), &[0xA8]);
        assert_eq!(bs.to_string(), "10101");
        assert!("102".parse::<BitString>().is_err());
    }

    #[test]
    fn test_from_padded() {
        let bs = BitString::from_padded(7, vec![0x80]).unwrap();
        assert_eq!(bs.num_bits(), 1);
        assert!(bs.get_bit(0).unwrap());
        assert!(BitString::from_padded(8, vec![0]).is_err());
    }

    #[test]
    fn test_integer_view_swaps_bit_order() {
        // keyUsage digitalSignature(0) + keyAgreement(4): bits 1000 1
        let bs = BitString::from_padded(3, vec![0x88]).unwrap();
        assert_eq!(bs.to_integer(), 0x11);
        let back = BitString::from_integer(0x11);
        assert_eq!(back.as_bytes(), &[0x88]);
        assert_eq!(back.pad_bits(), 3);
    }
}
