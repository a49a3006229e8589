//! A-XDR data type tags

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One-byte A-XDR type tag of a DLMS data value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    None = 0,
    Array = 1,
    Structure = 2,
    Boolean = 3,
    BitString = 4,
    Int32 = 5,
    UInt32 = 6,
    OctetString = 9,
    String = 10,
    StringUtf8 = 12,
    Bcd = 13,
    Int8 = 15,
    Int16 = 16,
    UInt8 = 17,
    UInt16 = 18,
    CompactArray = 19,
    Int64 = 20,
    UInt64 = 21,
    Enum = 22,
    Float32 = 23,
    Float64 = 24,
    DateTime = 25,
    Date = 26,
    Time = 27,
    DeltaInt8 = 28,
    DeltaInt16 = 29,
    DeltaInt32 = 30,
    DeltaUInt8 = 31,
    DeltaUInt16 = 32,
    DeltaUInt32 = 33,
}

impl DataType {
    /// Look up a tag byte.
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        use DataType::*;
        Ok(match value {
            0 => None,
            1 => Array,
            2 => Structure,
            3 => Boolean,
            4 => BitString,
            5 => Int32,
            6 => UInt32,
            9 => OctetString,
            10 => String,
            12 => StringUtf8,
            13 => Bcd,
            15 => Int8,
            16 => Int16,
            17 => UInt8,
            18 => UInt16,
            19 => CompactArray,
            20 => Int64,
            21 => UInt64,
            22 => Enum,
            23 => Float32,
            24 => Float64,
            25 => DateTime,
            26 => Date,
            27 => Time,
            28 => DeltaInt8,
            29 => DeltaInt16,
            30 => DeltaInt32,
            31 => DeltaUInt8,
            32 => DeltaUInt16,
            33 => DeltaUInt32,
            other => {
                return Err(DlmsError::UnknownEnum(format!(
                    "A-XDR data type 0x{:02X}",
                    other
                )));
            }
        })
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Body width in bytes for fixed-size types, `None` for variable-length ones.
    pub fn size(self) -> Option<usize> {
        use DataType::*;
        match self {
            None => Some(0),
            Boolean | Int8 | UInt8 | Enum | Bcd | DeltaInt8 | DeltaUInt8 => Some(1),
            Int16 | UInt16 | DeltaInt16 | DeltaUInt16 => Some(2),
            Int32 | UInt32 | Float32 | DeltaInt32 | DeltaUInt32 => Some(4),
            Int64 | UInt64 | Float64 => Some(8),
            DateTime => Some(12),
            Date => Some(5),
            Time => Some(4),
            Array | Structure | BitString | OctetString | String | StringUtf8
            | CompactArray => Option::None,
        }
    }

    /// Whether the body carries a BER object-count length prefix.
    pub fn is_variable_length(self) -> bool {
        self.size().is_none()
    }

    /// Name used in translator output, e.g. `"OctetString"`.
    pub fn name(self) -> &'static str {
        use DataType::*;
        match self {
            None => "None",
            Array => "Array",
            Structure => "Structure",
            Boolean => "Boolean",
            BitString => "BitString",
            Int32 => "Int32",
            UInt32 => "UInt32",
            OctetString => "OctetString",
            String => "String",
            StringUtf8 => "StringUTF8",
            Bcd => "Bcd",
            Int8 => "Int8",
            Int16 => "Int16",
            UInt8 => "UInt8",
            UInt16 => "UInt16",
            CompactArray => "CompactArray",
            Int64 => "Int64",
            UInt64 => "UInt64",
            Enum => "Enum",
            Float32 => "Float32",
            Float64 => "Float64",
            DateTime => "DateTime",
            Date => "Date",
            Time => "Time",
            DeltaInt8 => "DeltaInt8",
            DeltaInt16 => "DeltaInt16",
            DeltaInt32 => "DeltaInt32",
            DeltaUInt8 => "DeltaUInt8",
            DeltaUInt16 => "DeltaUInt16",
            DeltaUInt32 => "DeltaUInt32",
        }
    }
}

impl TryFrom<u8> for DataType {
    type Error = DlmsError;

    fn try_from(value: u8) -> DlmsResult<Self> {
        Self::from_u8(value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_table_round_trip() {
        for tag in 0u8..=40 {
            if let Ok(dt) = DataType::from_u8(tag) {
                assert_eq!(dt.to_u8(), tag);
            }
        }
        assert_eq!(DataType::from_u8(0x13).unwrap(), DataType::CompactArray);
        assert_eq!(DataType::from_u8(0x21).unwrap(), DataType::DeltaUInt32);
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(DataType::from_u8(7), Err(DlmsError::UnknownEnum(_))));
        assert!(matches!(DataType::from_u8(0xFF), Err(DlmsError::UnknownEnum(_))));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::DateTime.size(), Some(12));
        assert_eq!(DataType::UInt64.size(), Some(8));
        assert!(DataType::OctetString.is_variable_length());
        assert!(!DataType::Enum.is_variable_length());
    }
}
