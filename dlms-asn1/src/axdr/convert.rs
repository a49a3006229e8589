//! Coercion of host values into typed DLMS values

use crate::error::{DlmsError, DlmsResult};
use dlms_core::datatypes::{
    BitString, CodecOptions, CosemDateTime, DataObject, DataType, DateTimeKind,
};
use dlms_core::helpers;

/// A loosely typed value supplied by application code
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Str(String),
    Int(i128),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Data(DataObject),
}

impl HostValue {
    fn kind(&self) -> String {
        match self {
            HostValue::Str(_) => "string".to_string(),
            HostValue::Int(_) => "integer".to_string(),
            HostValue::Float(_) => "float".to_string(),
            HostValue::Bool(_) => "boolean".to_string(),
            HostValue::Bytes(_) => "bytes".to_string(),
            HostValue::Data(d) => d.data_type().name().to_string(),
        }
    }
}

macro_rules! host_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for HostValue {
            fn from(v: $ty) -> Self {
                HostValue::Int(v as i128)
            }
        })*
    };
}

host_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}

impl From<f32> for HostValue {
    fn from(v: f32) -> Self {
        HostValue::Float(v as f64)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(v: Vec<u8>) -> Self {
        HostValue::Bytes(v)
    }
}

impl From<&[u8]> for HostValue {
    fn from(v: &[u8]) -> Self {
        HostValue::Bytes(v.to_vec())
    }
}

impl From<DataObject> for HostValue {
    fn from(v: DataObject) -> Self {
        HostValue::Data(v)
    }
}

/// Coerce `value` into the canonical [`DataObject`] for `target`.
///
/// Strings become octet strings through hex parsing, integers through
/// base-10 parsing and booleans through `true`/`false`/`1`/`0`. Integers
/// are range checked against the target width. Anything else fails with
/// [`DlmsError::TypeMismatch`].
pub fn convert(value: impl Into<HostValue>, target: DataType) -> DlmsResult<DataObject> {
    let value = value.into();
    let fail = |v: &HostValue| DlmsError::mismatch(v.kind(), target.name());

    match target {
        DataType::None => Ok(DataObject::Null),
        DataType::Boolean => to_bool(&value).map(DataObject::Boolean).ok_or_else(|| fail(&value)),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Enum
        | DataType::Bcd
        | DataType::DeltaInt8
        | DataType::DeltaInt16
        | DataType::DeltaInt32
        | DataType::DeltaUInt8
        | DataType::DeltaUInt16
        | DataType::DeltaUInt32 => to_integer(&value)
            .and_then(|v| integer_as(v, target))
            .ok_or_else(|| fail(&value)),
        DataType::Float32 => to_float(&value)
            .map(|f| DataObject::Float32(f as f32))
            .ok_or_else(|| fail(&value)),
        DataType::Float64 => to_float(&value).map(DataObject::Float64).ok_or_else(|| fail(&value)),
        DataType::OctetString => match &value {
            HostValue::Str(s) => helpers::hex_to_bytes(s)
                .map(DataObject::OctetString)
                .map_err(|_| fail(&value)),
            HostValue::Bytes(b) => Ok(DataObject::OctetString(b.clone())),
            HostValue::Data(DataObject::OctetString(b)) => Ok(DataObject::OctetString(b.clone())),
            HostValue::Data(DataObject::VisibleString(s) | DataObject::Utf8String(s)) => {
                Ok(DataObject::OctetString(s.as_bytes().to_vec()))
            }
            HostValue::Data(d @ (DataObject::DateTime(_) | DataObject::Date(_) | DataObject::Time(_))) => {
                let (dt, kind) = date_time_parts(d).ok_or_else(|| fail(&value))?;
                Ok(DataObject::OctetString(dt.to_bytes(kind, &CodecOptions::default())))
            }
            _ => Err(fail(&value)),
        },
        DataType::String | DataType::StringUtf8 => {
            let text = match &value {
                HostValue::Str(s) => s.clone(),
                HostValue::Int(i) => i.to_string(),
                HostValue::Float(f) => f.to_string(),
                HostValue::Bool(b) => b.to_string(),
                HostValue::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| fail(&value))?,
                HostValue::Data(DataObject::VisibleString(s) | DataObject::Utf8String(s)) => {
                    s.clone()
                }
                HostValue::Data(DataObject::OctetString(b)) => {
                    String::from_utf8(b.clone()).map_err(|_| fail(&value))?
                }
                HostValue::Data(d) if d.is_number() => d.to_string(),
                _ => return Err(fail(&value)),
            };
            if target == DataType::String {
                if !text.is_ascii() {
                    return Err(fail(&value));
                }
                Ok(DataObject::VisibleString(text))
            } else {
                Ok(DataObject::Utf8String(text))
            }
        }
        DataType::BitString => match &value {
            HostValue::Str(s) => s
                .parse::<BitString>()
                .map(DataObject::BitString)
                .map_err(|_| fail(&value)),
            HostValue::Data(DataObject::BitString(b)) => Ok(DataObject::BitString(b.clone())),
            HostValue::Int(i) if *i >= 0 && *i <= u64::MAX as i128 => {
                Ok(DataObject::BitString(BitString::from_integer(*i as u64)))
            }
            _ => Err(fail(&value)),
        },
        DataType::DateTime | DataType::Date | DataType::Time => {
            let kind = match target {
                DataType::Date => DateTimeKind::Date,
                DataType::Time => DateTimeKind::Time,
                _ => DateTimeKind::DateTime,
            };
            let dt = match &value {
                HostValue::Str(s) => {
                    let parsed = match kind {
                        DateTimeKind::DateTime => CosemDateTime::parse(s, ""),
                        DateTimeKind::Date => CosemDateTime::parse_date(s, ""),
                        DateTimeKind::Time => CosemDateTime::parse_time(s, ""),
                    };
                    parsed.map_err(|_| fail(&value))?
                }
                HostValue::Bytes(b) | HostValue::Data(DataObject::OctetString(b)) => {
                    CosemDateTime::from_bytes(kind, b, &CodecOptions::default())
                        .map_err(|_| fail(&value))?
                }
                HostValue::Data(d) => date_time_parts(d).ok_or_else(|| fail(&value))?.0.clone(),
                _ => return Err(fail(&value)),
            };
            Ok(DataObject::new_date_time(dt, kind))
        }
        DataType::Array | DataType::Structure => match value {
            HostValue::Data(
                DataObject::Array(items) | DataObject::Structure(items),
            ) => Ok(if target == DataType::Array {
                DataObject::Array(items)
            } else {
                DataObject::Structure(items)
            }),
            HostValue::Data(DataObject::CompactArray(ca)) if target == DataType::Array => {
                Ok(DataObject::Array(ca.into_values()))
            }
            other => Err(fail(&other)),
        },
        DataType::CompactArray => match value {
            HostValue::Data(DataObject::CompactArray(ca)) => Ok(DataObject::CompactArray(ca)),
            HostValue::Data(DataObject::Array(items)) => {
                dlms_core::datatypes::CompactArray::from_values(items)
                    .map(DataObject::CompactArray)
                    .map_err(|_| DlmsError::mismatch("Array", target.name()))
            }
            other => Err(fail(&other)),
        },
    }
}

fn date_time_parts(d: &DataObject) -> Option<(&CosemDateTime, DateTimeKind)> {
    match d {
        DataObject::DateTime(v) => Some((v, DateTimeKind::DateTime)),
        DataObject::Date(v) => Some((v, DateTimeKind::Date)),
        DataObject::Time(v) => Some((v, DateTimeKind::Time)),
        _ => None,
    }
}

fn to_bool(value: &HostValue) -> Option<bool> {
    match value {
        HostValue::Bool(b) => Some(*b),
        HostValue::Int(i) => Some(*i != 0),
        HostValue::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        HostValue::Data(DataObject::Boolean(b)) => Some(*b),
        HostValue::Data(d) => d.as_i128().map(|i| i != 0),
        _ => None,
    }
}

fn to_integer(value: &HostValue) -> Option<i128> {
    match value {
        HostValue::Int(i) => Some(*i),
        HostValue::Bool(b) => Some(*b as i128),
        HostValue::Str(s) => s.trim().parse::<i128>().ok(),
        HostValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e38 => Some(*f as i128),
        HostValue::Data(DataObject::Boolean(b)) => Some(*b as i128),
        HostValue::Data(d) => d.as_i128(),
        _ => None,
    }
}

fn to_float(value: &HostValue) -> Option<f64> {
    match value {
        HostValue::Float(f) => Some(*f),
        HostValue::Int(i) => Some(*i as f64),
        HostValue::Str(s) => s.trim().parse::<f64>().ok(),
        HostValue::Data(d) => d.as_f64().ok(),
        _ => None,
    }
}

fn integer_as(v: i128, target: DataType) -> Option<DataObject> {
    Some(match target {
        DataType::Int8 => DataObject::Integer8(i8::try_from(v).ok()?),
        DataType::Int16 => DataObject::Integer16(i16::try_from(v).ok()?),
        DataType::Int32 => DataObject::Integer32(i32::try_from(v).ok()?),
        DataType::Int64 => DataObject::Integer64(i64::try_from(v).ok()?),
        DataType::UInt8 => DataObject::Unsigned8(u8::try_from(v).ok()?),
        DataType::UInt16 => DataObject::Unsigned16(u16::try_from(v).ok()?),
        DataType::UInt32 => DataObject::Unsigned32(u32::try_from(v).ok()?),
        DataType::UInt64 => DataObject::Unsigned64(u64::try_from(v).ok()?),
        DataType::Enum => DataObject::Enumerate(u8::try_from(v).ok()?),
        DataType::Bcd => DataObject::Bcd(u8::try_from(v).ok()?),
        DataType::DeltaInt8 => DataObject::DeltaInteger8(i8::try_from(v).ok()?),
        DataType::DeltaInt16 => DataObject::DeltaInteger16(i16::try_from(v).ok()?),
        DataType::DeltaInt32 => DataObject::DeltaInteger32(i32::try_from(v).ok()?),
        DataType::DeltaUInt8 => DataObject::DeltaUnsigned8(u8::try_from(v).ok()?),
        DataType::DeltaUInt16 => DataObject::DeltaUnsigned16(u16::try_from(v).ok()?),
        DataType::DeltaUInt32 => DataObject::DeltaUnsigned32(u32::try_from(v).ok()?),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_octet_string() {
        assert_eq!(
            convert("01 02 0A", DataType::OctetString).unwrap(),
            DataObject::OctetString(vec![1, 2, 10])
        );
        assert!(convert("zz", DataType::OctetString).is_err());
    }

    #[test]
    fn test_string_to_integer() {
        assert_eq!(convert(" -12 ", DataType::Int16).unwrap(), DataObject::Integer16(-12));
        assert!(matches!(
            convert("300", DataType::UInt8),
            Err(DlmsError::TypeMismatch { .. })
        ));
        assert!(convert("abc", DataType::Int32).is_err());
    }

    #[test]
    fn test_integer_widening() {
        assert_eq!(convert(200u8, DataType::UInt32).unwrap(), DataObject::Unsigned32(200));
        assert_eq!(
            convert(DataObject::Unsigned16(7), DataType::Enum).unwrap(),
            DataObject::Enumerate(7)
        );
        assert!(convert(-1i32, DataType::UInt64).is_err());
    }

    #[test]
    fn test_string_to_boolean() {
        assert_eq!(convert("TRUE", DataType::Boolean).unwrap(), DataObject::Boolean(true));
        assert_eq!(convert("0", DataType::Boolean).unwrap(), DataObject::Boolean(false));
        assert!(convert("maybe", DataType::Boolean).is_err());
    }

    #[test]
    fn test_incompatible_runtime_type() {
        assert!(matches!(
            convert(vec![1u8, 2], DataType::Structure),
            Err(DlmsError::TypeMismatch { .. })
        ));
        assert!(convert(1.5f64, DataType::Int32).is_err());
    }

    #[test]
    fn test_structure_retag() {
        let arr = DataObject::Array(vec![DataObject::Unsigned8(1)]);
        assert_eq!(
            convert(arr, DataType::Structure).unwrap(),
            DataObject::Structure(vec![DataObject::Unsigned8(1)])
        );
    }

    #[test]
    fn test_string_to_date_time() {
        let v = convert("2024-12-31 15:04:05", DataType::DateTime).unwrap();
        let dt = v.as_date_time().unwrap();
        assert_eq!(dt.to_string(), "2024-12-31 15:04:05");
        assert_eq!(v.data_type(), DataType::DateTime);
    }
}
