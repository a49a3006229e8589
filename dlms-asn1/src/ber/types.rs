//! BER encoding types (Tag, Length, etc.)

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};

/// Universal tag numbers understood by the parser
pub mod tags {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const SEQUENCE: u8 = 0x10;
    pub const SET: u8 = 0x11;
    pub const PRINTABLE_STRING: u8 = 0x13;
    pub const IA5_STRING: u8 = 0x16;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const BMP_STRING: u8 = 0x1E;
}

/// BER Tag Class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BerTagClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10)
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

impl BerTagClass {
    /// Get tag class from bits 7-6 of a tag byte
    pub fn from_bits(bits: u8) -> Self {
        match (bits >> 6) & 0x03 {
            0 => BerTagClass::Universal,
            1 => BerTagClass::Application,
            2 => BerTagClass::ContextSpecific,
            _ => BerTagClass::Private,
        }
    }

    /// Convert tag class to bits (for encoding)
    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// A single-byte BER tag
///
/// Only the short form (numbers 0-30) occurs in DLMS and certificate
/// structures; the extended form is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerTag {
    class: BerTagClass,
    constructed: bool,
    number: u8,
}

impl BerTag {
    pub fn new(class: BerTagClass, constructed: bool, number: u8) -> DlmsResult<Self> {
        if number > 30 {
            return Err(DlmsError::Asn1Encoding(format!(
                "tag number {} needs the extended form",
                number
            )));
        }
        Ok(Self {
            class,
            constructed,
            number,
        })
    }

    pub fn universal(constructed: bool, number: u8) -> Self {
        Self {
            class: BerTagClass::Universal,
            constructed,
            number: number & 0x1F,
        }
    }

    pub fn class(&self) -> BerTagClass {
        self.class
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn encode(&self) -> u8 {
        let constructed_bit = if self.constructed { 0x20 } else { 0x00 };
        self.class.to_bits() | constructed_bit | self.number
    }

    /// Decode the tag byte found at `offset`.
    pub fn decode(byte: u8, offset: usize) -> DlmsResult<Self> {
        let number = byte & 0x1F;
        if number == 0x1F {
            return Err(DlmsError::malformed(offset, "extended tag form is not supported"));
        }
        Ok(Self {
            class: BerTagClass::from_bits(byte),
            constructed: byte & 0x20 != 0,
            number,
        })
    }
}

/// BER definite length
pub struct BerLength;

impl BerLength {
    /// Append the DER (shortest) form of `length`.
    pub fn encode(length: usize, out: &mut Vec<u8>) {
        if length < 0x80 {
            out.push(length as u8);
            return;
        }
        let bytes = (length as u64).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (8 - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }

    /// Decode a length at `data[offset..]`, returning `(length, bytes used)`.
    pub fn decode(data: &[u8], offset: usize) -> DlmsResult<(usize, usize)> {
        let first = *data
            .get(offset)
            .ok_or_else(|| DlmsError::malformed(offset, "missing length"))?;
        if first & 0x80 == 0 {
            return Ok((first as usize, 1));
        }
        let num_bytes = (first & 0x7F) as usize;
        if num_bytes == 0 {
            return Err(DlmsError::malformed(offset, "indefinite length is not supported"));
        }
        if num_bytes > 4 {
            return Err(DlmsError::malformed(
                offset,
                format!("length uses {} bytes, at most 4 allowed", num_bytes),
            ));
        }
        let raw = data
            .get(offset + 1..offset + 1 + num_bytes)
            .ok_or_else(|| DlmsError::malformed(offset, "length bytes missing"))?;
        let length = raw.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        Ok((length, 1 + num_bytes))
    }
}
