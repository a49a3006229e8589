//! Data object types for DLMS/COSEM protocol

use crate::datatypes::bit_string::BitString;
use crate::datatypes::compact_array::CompactArray;
use crate::datatypes::cosem_date_time::{CosemDateTime, DateTimeKind};
use crate::datatypes::data_type::DataType;
use crate::error::{DlmsError, DlmsResult};
use crate::helpers;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DLMS data value
///
/// Every variant maps to exactly one A-XDR tag (see [`DataObject::data_type`]).
/// `Array` and `Structure` share a body shape but are kept apart so the
/// encoder never has to guess which tag to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataObject {
    Null,
    Boolean(bool),
    Integer8(i8),
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),
    Unsigned8(u8),
    Unsigned16(u16),
    Unsigned32(u32),
    Unsigned64(u64),
    Enumerate(u8),
    Float32(f32),
    Float64(f64),
    OctetString(#[serde(with = "serde_bytes")] Vec<u8>),
    /// ASCII (visible) string
    VisibleString(String),
    Utf8String(String),
    BitString(BitString),
    Bcd(u8),
    Array(Vec<DataObject>),
    Structure(Vec<DataObject>),
    CompactArray(CompactArray),
    DateTime(CosemDateTime),
    Date(CosemDateTime),
    Time(CosemDateTime),
    DeltaInteger8(i8),
    DeltaInteger16(i16),
    DeltaInteger32(i32),
    DeltaUnsigned8(u8),
    DeltaUnsigned16(u16),
    DeltaUnsigned32(u32),
}

impl DataObject {
    /// The A-XDR tag of this value
    pub fn data_type(&self) -> DataType {
        use DataObject as D;
        match self {
            D::Null => DataType::None,
            D::Boolean(_) => DataType::Boolean,
            D::Integer8(_) => DataType::Int8,
            D::Integer16(_) => DataType::Int16,
            D::Integer32(_) => DataType::Int32,
            D::Integer64(_) => DataType::Int64,
            D::Unsigned8(_) => DataType::UInt8,
            D::Unsigned16(_) => DataType::UInt16,
            D::Unsigned32(_) => DataType::UInt32,
            D::Unsigned64(_) => DataType::UInt64,
            D::Enumerate(_) => DataType::Enum,
            D::Float32(_) => DataType::Float32,
            D::Float64(_) => DataType::Float64,
            D::OctetString(_) => DataType::OctetString,
            D::VisibleString(_) => DataType::String,
            D::Utf8String(_) => DataType::StringUtf8,
            D::BitString(_) => DataType::BitString,
            D::Bcd(_) => DataType::Bcd,
            D::Array(_) => DataType::Array,
            D::Structure(_) => DataType::Structure,
            D::CompactArray(_) => DataType::CompactArray,
            D::DateTime(_) => DataType::DateTime,
            D::Date(_) => DataType::Date,
            D::Time(_) => DataType::Time,
            D::DeltaInteger8(_) => DataType::DeltaInt8,
            D::DeltaInteger16(_) => DataType::DeltaInt16,
            D::DeltaInteger32(_) => DataType::DeltaInt32,
            D::DeltaUnsigned8(_) => DataType::DeltaUInt8,
            D::DeltaUnsigned16(_) => DataType::DeltaUInt16,
            D::DeltaUnsigned32(_) => DataType::DeltaUInt32,
        }
    }

    pub fn new_octet_string(bytes: impl Into<Vec<u8>>) -> Self {
        DataObject::OctetString(bytes.into())
    }

    /// Build a visible string. Fails if `s` is not ASCII.
    pub fn new_visible_string(s: impl Into<String>) -> DlmsResult<Self> {
        let s = s.into();
        if !s.is_ascii() {
            return Err(DlmsError::mismatch("non-ASCII text", "String"));
        }
        Ok(DataObject::VisibleString(s))
    }

    pub fn new_utf8_string(s: impl Into<String>) -> Self {
        DataObject::Utf8String(s.into())
    }

    pub fn new_array(items: Vec<DataObject>) -> Self {
        DataObject::Array(items)
    }

    pub fn new_structure(items: Vec<DataObject>) -> Self {
        DataObject::Structure(items)
    }

    pub fn new_date_time(value: CosemDateTime, kind: DateTimeKind) -> Self {
        match kind {
            DateTimeKind::DateTime => DataObject::DateTime(value),
            DateTimeKind::Date => DataObject::Date(value),
            DateTimeKind::Time => DataObject::Time(value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataObject::Null)
    }

    /// Integer, float, enum, BCD or delta value
    pub fn is_number(&self) -> bool {
        self.as_i128().is_some() || matches!(self, DataObject::Float32(_) | DataObject::Float64(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            DataObject::Array(_) | DataObject::Structure(_) | DataObject::CompactArray(_)
        )
    }

    pub fn is_date_time(&self) -> bool {
        matches!(
            self,
            DataObject::DateTime(_) | DataObject::Date(_) | DataObject::Time(_)
        )
    }

    /// Any integer-like value widened to `i128`
    pub fn as_i128(&self) -> Option<i128> {
        use DataObject as D;
        Some(match *self {
            D::Integer8(v) | D::DeltaInteger8(v) => v as i128,
            D::Integer16(v) | D::DeltaInteger16(v) => v as i128,
            D::Integer32(v) | D::DeltaInteger32(v) => v as i128,
            D::Integer64(v) => v as i128,
            D::Unsigned8(v) | D::DeltaUnsigned8(v) | D::Enumerate(v) | D::Bcd(v) => v as i128,
            D::Unsigned16(v) | D::DeltaUnsigned16(v) => v as i128,
            D::Unsigned32(v) | D::DeltaUnsigned32(v) => v as i128,
            D::Unsigned64(v) => v as i128,
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> DlmsResult<bool> {
        match self {
            DataObject::Boolean(b) => Ok(*b),
            other => Err(DlmsError::mismatch(other.data_type().name(), "Boolean")),
        }
    }

    pub fn as_i64(&self) -> DlmsResult<i64> {
        self.as_i128()
            .and_then(|v| i64::try_from(v).ok())
            .ok_or_else(|| DlmsError::mismatch(self.data_type().name(), "Int64"))
    }

    pub fn as_u64(&self) -> DlmsResult<u64> {
        self.as_i128()
            .and_then(|v| u64::try_from(v).ok())
            .ok_or_else(|| DlmsError::mismatch(self.data_type().name(), "UInt64"))
    }

    pub fn as_f64(&self) -> DlmsResult<f64> {
        match self {
            DataObject::Float32(f) => Ok(*f as f64),
            DataObject::Float64(f) => Ok(*f),
            other => other
                .as_i128()
                .map(|v| v as f64)
                .ok_or_else(|| DlmsError::mismatch(other.data_type().name(), "Float64")),
        }
    }

    pub fn as_octet_string(&self) -> DlmsResult<&[u8]> {
        match self {
            DataObject::OctetString(v) => Ok(v),
            other => Err(DlmsError::mismatch(other.data_type().name(), "OctetString")),
        }
    }

    pub fn as_str(&self) -> DlmsResult<&str> {
        match self {
            DataObject::VisibleString(s) | DataObject::Utf8String(s) => Ok(s),
            other => Err(DlmsError::mismatch(other.data_type().name(), "String")),
        }
    }

    /// Elements of an array or structure
    pub fn as_items(&self) -> DlmsResult<&[DataObject]> {
        match self {
            DataObject::Array(v) | DataObject::Structure(v) => Ok(v),
            DataObject::CompactArray(ca) => Ok(ca.values()),
            other => Err(DlmsError::mismatch(other.data_type().name(), "Array")),
        }
    }

    pub fn as_date_time(&self) -> DlmsResult<&CosemDateTime> {
        match self {
            DataObject::DateTime(v) | DataObject::Date(v) | DataObject::Time(v) => Ok(v),
            other => Err(DlmsError::mismatch(other.data_type().name(), "DateTime")),
        }
    }
}

impl fmt::Display for DataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DataObject as D;
        match self {
            D::Null => f.write_str("null"),
            D::Boolean(b) => write!(f, "{}", b),
            D::Float32(v) => write!(f, "{}", v),
            D::Float64(v) => write!(f, "{}", v),
            D::OctetString(v) => f.write_str(&helpers::to_hex(v, true)),
            D::VisibleString(s) | D::Utf8String(s) => f.write_str(s),
            D::BitString(bs) => write!(f, "{}", bs),
            D::Array(items) | D::Structure(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("}")
            }
            D::CompactArray(ca) => write!(f, "{}", D::Array(ca.values().to_vec())),
            D::DateTime(dt) => write!(f, "{}", dt),
            D::Date(dt) => f.write_str(&dt.format_with_pattern("yyyy-MM-dd")),
            D::Time(dt) => f.write_str(&dt.format_with_pattern("HH:mm:ss")),
            other => match other.as_i128() {
                Some(v) => write!(f, "{}", v),
                None => Ok(()),
            },
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for DataObject {
            fn from(v: $ty) -> Self {
                DataObject::$variant(v)
            }
        })*
    };
}

impl_from! {
    bool => Boolean,
    i8 => Integer8,
    i16 => Integer16,
    i32 => Integer32,
    i64 => Integer64,
    u8 => Unsigned8,
    u16 => Unsigned16,
    u32 => Unsigned32,
    u64 => Unsigned64,
    f32 => Float32,
    f64 => Float64,
    Vec<u8> => OctetString,
    BitString => BitString,
}
