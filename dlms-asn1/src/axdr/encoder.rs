//! A-XDR encoder for DLMS/COSEM

use crate::axdr::convert::{HostValue, convert};
use crate::error::{DlmsError, DlmsResult};
use dlms_core::ByteBuffer;
use dlms_core::datatypes::*;

/// A-XDR encoder writing into an owned [`ByteBuffer`]
#[derive(Debug, Default)]
pub struct AxdrEncoder {
    buffer: ByteBuffer,
    options: CodecOptions,
}

impl AxdrEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: ByteBuffer::with_capacity(capacity),
            options: CodecOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Encode a value as tag followed by body.
    pub fn encode_data_object(&mut self, obj: &DataObject) -> DlmsResult<()> {
        self.buffer.push_u8(obj.data_type().to_u8());
        self.encode_body(obj)
    }

    /// Coerce `value` to `data_type` and encode it with its tag.
    pub fn set_data(&mut self, data_type: DataType, value: impl Into<HostValue>) -> DlmsResult<()> {
        let obj = convert(value, data_type)?;
        self.encode_data_object(&obj)
    }

    /// Encode the body of `obj` without its tag.
    pub fn encode_body(&mut self, obj: &DataObject) -> DlmsResult<()> {
        use DataObject as D;
        let b = &mut self.buffer;
        match obj {
            D::Null => {}
            D::Boolean(v) => b.push_u8(u8::from(*v)),
            D::Integer8(v) | D::DeltaInteger8(v) => b.push_i8(*v),
            D::Integer16(v) | D::DeltaInteger16(v) => b.push_i16(*v),
            D::Integer32(v) | D::DeltaInteger32(v) => b.push_i32(*v),
            D::Integer64(v) => b.push_i64(*v),
            D::Unsigned8(v) | D::DeltaUnsigned8(v) | D::Enumerate(v) | D::Bcd(v) => {
                b.push_u8(*v)
            }
            D::Unsigned16(v) | D::DeltaUnsigned16(v) => b.push_u16(*v),
            D::Unsigned32(v) | D::DeltaUnsigned32(v) => b.push_u32(*v),
            D::Unsigned64(v) => b.push_u64(*v),
            D::Float32(v) => b.push_f32(*v),
            D::Float64(v) => b.push_f64(*v),
            D::OctetString(v) => {
                b.set_object_count(v.len());
                b.push_slice(v);
            }
            D::VisibleString(s) | D::Utf8String(s) => {
                b.set_object_count(s.len());
                b.push_slice(s.as_bytes());
            }
            D::BitString(bs) => {
                b.set_object_count(bs.num_bits());
                b.push_slice(bs.as_bytes());
            }
            D::Array(items) | D::Structure(items) => {
                b.set_object_count(items.len());
                for item in items {
                    self.encode_data_object(item)?;
                }
            }
            D::CompactArray(ca) => self.encode_compact_array(ca)?,
            D::DateTime(dt) => b.push_slice(&dt.to_bytes(DateTimeKind::DateTime, &self.options)),
            D::Date(dt) => b.push_slice(&dt.to_bytes(DateTimeKind::Date, &self.options)),
            D::Time(dt) => b.push_slice(&dt.to_bytes(DateTimeKind::Time, &self.options)),
        }
        Ok(())
    }

    /// Write a compact array type description.
    pub fn encode_type_description(&mut self, description: &TypeDescription) {
        match description {
            TypeDescription::Simple(dt) => self.buffer.push_u8(dt.to_u8()),
            TypeDescription::Array { count, element } => {
                self.buffer.push_u8(DataType::Array.to_u8());
                self.buffer.push_u16(*count);
                self.encode_type_description(element);
            }
            TypeDescription::Structure(fields) => {
                self.buffer.push_u8(DataType::Structure.to_u8());
                self.buffer.set_object_count(fields.len());
                for field in fields {
                    self.encode_type_description(field);
                }
            }
        }
    }

    fn encode_compact_array(&mut self, ca: &CompactArray) -> DlmsResult<()> {
        self.encode_type_description(ca.description());
        let mut content = AxdrEncoder::new().with_options(self.options);
        for value in ca.values() {
            content.encode_described(ca.description(), value)?;
        }
        self.buffer.set_object_count(content.buffer.size());
        self.buffer.push_buffer(&content.buffer);
        Ok(())
    }

    fn encode_described(&mut self, description: &TypeDescription, value: &DataObject) -> DlmsResult<()> {
        match (description, value) {
            (TypeDescription::Structure(fields), DataObject::Structure(items))
                if fields.len() == items.len() =>
            {
                for (field, item) in fields.iter().zip(items) {
                    self.encode_described(field, item)?;
                }
                Ok(())
            }
            (TypeDescription::Array { count, element }, DataObject::Array(items))
                if *count as usize == items.len() =>
            {
                for item in items {
                    self.encode_described(element, item)?;
                }
                Ok(())
            }
            (TypeDescription::Simple(dt), v) if *dt == v.data_type() => self.encode_body(v),
            (_, v) => Err(DlmsError::mismatch(
                v.data_type().name(),
                description.data_type().name(),
            )),
        }
    }

    /// Append raw bytes.
    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        self.buffer.push_slice(bytes);
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> ByteBuffer {
        self.buffer
    }

    /// Get encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.data()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Encode `value` as `data_type` into `buffer`, tag included.
pub fn set_data(buffer: &mut ByteBuffer, data_type: DataType, value: impl Into<HostValue>) -> DlmsResult<()> {
    let mut encoder = AxdrEncoder::new();
    encoder.set_data(data_type, value)?;
    buffer.push_buffer(&encoder.buffer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axdr::decoder::AxdrDecoder;
    use crate::axdr::types::DataInfo;
    use dlms_core::helpers::to_hex;

    fn encode(obj: &DataObject) -> String {
        let mut enc = AxdrEncoder::new();
        enc.encode_data_object(obj).unwrap();
        to_hex(enc.as_bytes(), true)
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&DataObject::Null), "00");
        assert_eq!(encode(&DataObject::Boolean(true)), "03 01");
        assert_eq!(encode(&DataObject::Integer32(-2)), "05 FF FF FF FE");
        assert_eq!(encode(&DataObject::Unsigned16(0x1234)), "12 12 34");
        assert_eq!(encode(&DataObject::Enumerate(1)), "16 01");
        assert_eq!(encode(&DataObject::Float64(1.0)), "18 3F F0 00 00 00 00 00 00");
    }

    #[test]
    fn test_encode_variable_length() {
        assert_eq!(
            encode(&DataObject::OctetString(vec![0, 0, 1, 0, 0, 255])),
            "09 06 00 00 01 00 00 FF"
        );
        assert_eq!(encode(&DataObject::VisibleString("AB".into())), "0A 02 41 42");
        let bs: BitString = "1000000001".parse().unwrap();
        assert_eq!(encode(&DataObject::BitString(bs)), "04 0A 80 40");
    }

    #[test]
    fn test_long_octet_string_length() {
        let mut enc = AxdrEncoder::new();
        enc.encode_data_object(&DataObject::OctetString(vec![0xAA; 0x81]))
            .unwrap();
        assert_eq!(&enc.as_bytes()[..3], &[0x09, 0x81, 0x81]);
        assert_eq!(enc.as_bytes().len(), 3 + 0x81);
    }

    #[test]
    fn test_encode_structure() {
        let v = DataObject::Structure(vec![
            DataObject::Unsigned8(5),
            DataObject::Array(vec![DataObject::Unsigned16(7)]),
        ]);
        assert_eq!(encode(&v), "02 02 11 05 01 01 12 00 07");
    }

    #[test]
    fn test_set_data_converts() {
        let mut bb = ByteBuffer::new();
        set_data(&mut bb, DataType::OctetString, "0102").unwrap();
        set_data(&mut bb, DataType::UInt8, "200").unwrap();
        assert_eq!(bb.to_string(), "09 02 01 02 11 C8");
        assert!(set_data(&mut bb, DataType::UInt8, "256").is_err());
    }

    #[test]
    fn test_compact_array_round_trip() {
        let hex = "13 02 02 11 10 06 01 FF FF 02 00 05";
        let mut bb = ByteBuffer::from_hex(hex).unwrap();
        let v = AxdrDecoder::new(&mut bb).get_data(&mut DataInfo::new()).unwrap();
        assert_eq!(encode(&v), hex);
    }

    #[test]
    fn test_decode_then_encode_is_identity() {
        for hex in [
            "02 03 09 06 00 00 01 00 00 FF 0F 02 16 1E",
            "01 02 04 03 A0 0C 02 41 42",
            "19 07 E8 0C 1F 02 0F 04 05 00 FF C4 00",
            "02 03 1C FF 1D 00 01 20 00 02",
        ] {
            let mut bb = ByteBuffer::from_hex(hex).unwrap();
            let v = AxdrDecoder::new(&mut bb).get_data(&mut DataInfo::new()).unwrap();
            assert_eq!(encode(&v), hex, "{}", hex);
        }
    }
}
