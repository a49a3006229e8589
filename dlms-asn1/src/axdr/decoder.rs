//! A-XDR decoder for DLMS/COSEM

use crate::axdr::types::DataInfo;
use crate::error::{DlmsError, DlmsResult};
use crate::translator::TranslatorSink;
use dlms_core::ByteBuffer;
use dlms_core::datatypes::*;
use log::trace;

/// Deepest container nesting accepted in one value.
pub const MAX_DEPTH: usize = 64;

/// A-XDR decoder reading from a shared [`ByteBuffer`]
///
/// The decoder never owns the bytes: on an incomplete read the buffer
/// cursor is rewound so the caller can append more data and retry.
pub struct AxdrDecoder<'a> {
    buffer: &'a mut ByteBuffer,
    options: CodecOptions,
    sink: Option<&'a mut dyn TranslatorSink>,
    depth: usize,
}

impl<'a> AxdrDecoder<'a> {
    /// Create a new decoder
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Self {
            buffer,
            options: CodecOptions::default(),
            sink: None,
            depth: 0,
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Mirror every decoded value into `sink`.
    pub fn with_sink(mut self, sink: &'a mut dyn TranslatorSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Decode one value.
    ///
    /// Returns [`DlmsError::IncompletePdu`] with `info.complete == false` when
    /// the buffer ends early. For scalars the cursor is back where it was
    /// before the call. For a top level array or structure the elements
    /// already decoded are kept in `info` and the cursor stops at the first
    /// unfinished element, so the next call continues from there.
    pub fn get_data(&mut self, info: &mut DataInfo) -> DlmsResult<DataObject> {
        let start = self.buffer.position();
        self.depth = 0;
        let result = match info.resume_type {
            Some(dt) if !info.complete => self.resume_items(dt, info),
            _ => self.get_fresh(info),
        };
        match result {
            Ok(value) => {
                info.complete = true;
                Ok(value)
            }
            Err(e) if is_short_read(&e) => {
                info.complete = false;
                if info.resume_type.is_none() {
                    self.buffer.set_position(start)?;
                }
                trace!(
                    "A-XDR decode incomplete at {} ({} of {} elements)",
                    self.buffer.position(),
                    info.index,
                    info.count
                );
                Err(DlmsError::IncompletePdu(format!(
                    "{} bytes available at position {}",
                    self.buffer.available(),
                    self.buffer.position()
                )))
            }
            Err(e) => {
                info.resume_type = None;
                info.partial.clear();
                Err(e)
            }
        }
    }

    fn get_fresh(&mut self, info: &mut DataInfo) -> DlmsResult<DataObject> {
        info.index = 0;
        info.count = 0;
        info.partial.clear();
        let (dt, known) = match info.data_type {
            Some(dt) => (dt, true),
            None => (self.read_tag()?, false),
        };
        match dt {
            DataType::Array | DataType::Structure => {
                let count = self.buffer.get_object_count()?;
                info.count = count;
                self.open_items(dt, count);
                self.resume_items(dt, info)
            }
            DataType::OctetString | DataType::String | DataType::StringUtf8 if known => {
                // The enclosing PDU already told us how long the value is.
                let len = self.buffer.available();
                self.read_string_body(dt, len)
            }
            other => self.read_body(other),
        }
    }

    fn resume_items(&mut self, dt: DataType, info: &mut DataInfo) -> DlmsResult<DataObject> {
        while info.index < info.count {
            let element_start = self.buffer.position();
            match self.read_value() {
                Ok(v) => {
                    info.partial.push(v);
                    info.index += 1;
                }
                Err(e) => {
                    if is_short_read(&e) {
                        self.buffer.set_position(element_start)?;
                        info.resume_type = Some(dt);
                    }
                    return Err(e);
                }
            }
        }
        info.resume_type = None;
        let items = std::mem::take(&mut info.partial);
        self.close(dt);
        Ok(if dt == DataType::Array {
            DataObject::Array(items)
        } else {
            DataObject::Structure(items)
        })
    }

    fn read_tag(&mut self) -> DlmsResult<DataType> {
        let offset = self.buffer.position();
        let tag = self.buffer.pop_u8()?;
        DataType::from_u8(tag).map_err(|_| {
            let _ = self.buffer.set_position(offset);
            DlmsError::malformed(offset, format!("unsupported A-XDR tag 0x{:02X}", tag))
        })
    }

    /// Tag followed by body
    fn read_value(&mut self) -> DlmsResult<DataObject> {
        let dt = self.read_tag()?;
        self.read_body(dt)
    }

    fn read_body(&mut self, dt: DataType) -> DlmsResult<DataObject> {
        let b = &mut *self.buffer;
        let value = match dt {
            DataType::None => DataObject::Null,
            DataType::Boolean => DataObject::Boolean(b.pop_u8()? != 0),
            DataType::Int8 => DataObject::Integer8(b.pop_i8()?),
            DataType::Int16 => DataObject::Integer16(b.pop_i16()?),
            DataType::Int32 => DataObject::Integer32(b.pop_i32()?),
            DataType::Int64 => DataObject::Integer64(b.pop_i64()?),
            DataType::UInt8 => DataObject::Unsigned8(b.pop_u8()?),
            DataType::UInt16 => DataObject::Unsigned16(b.pop_u16()?),
            DataType::UInt32 => DataObject::Unsigned32(b.pop_u32()?),
            DataType::UInt64 => DataObject::Unsigned64(b.pop_u64()?),
            DataType::Enum => DataObject::Enumerate(b.pop_u8()?),
            DataType::Bcd => DataObject::Bcd(b.pop_u8()?),
            DataType::Float32 => DataObject::Float32(b.pop_f32()?),
            DataType::Float64 => DataObject::Float64(b.pop_f64()?),
            DataType::DeltaInt8 => DataObject::DeltaInteger8(b.pop_i8()?),
            DataType::DeltaInt16 => DataObject::DeltaInteger16(b.pop_i16()?),
            DataType::DeltaInt32 => DataObject::DeltaInteger32(b.pop_i32()?),
            DataType::DeltaUInt8 => DataObject::DeltaUnsigned8(b.pop_u8()?),
            DataType::DeltaUInt16 => DataObject::DeltaUnsigned16(b.pop_u16()?),
            DataType::DeltaUInt32 => DataObject::DeltaUnsigned32(b.pop_u32()?),
            DataType::BitString => {
                let bits = b.get_object_count()?;
                let bytes = b.pop_vec(bits.div_ceil(8))?;
                DataObject::BitString(BitString::new(bytes, bits)?)
            }
            DataType::OctetString | DataType::String | DataType::StringUtf8 => {
                let len = b.get_object_count()?;
                return self.read_string_body(dt, len);
            }
            DataType::Array | DataType::Structure => {
                let count = b.get_object_count()?;
                self.enter()?;
                self.open_items(dt, count);
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.read_value()?);
                }
                self.depth -= 1;
                self.close(dt);
                return Ok(if dt == DataType::Array {
                    DataObject::Array(items)
                } else {
                    DataObject::Structure(items)
                });
            }
            DataType::CompactArray => return self.read_compact_array(),
            DataType::DateTime | DataType::Date | DataType::Time => {
                return self.read_date_time(dt);
            }
        };
        self.emit_leaf(dt, &value);
        Ok(value)
    }

    fn enter(&mut self) -> DlmsResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(DlmsError::malformed(
                self.buffer.position(),
                format!("nesting deeper than {}", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    fn read_string_body(&mut self, dt: DataType, len: usize) -> DlmsResult<DataObject> {
        let offset = self.buffer.position();
        let bytes = self.buffer.pop_vec(len)?;
        let value = match dt {
            DataType::OctetString => DataObject::OctetString(bytes),
            _ => {
                let text = String::from_utf8(bytes).map_err(|_| {
                    DlmsError::malformed(offset, "string is not valid UTF-8")
                })?;
                if dt == DataType::String {
                    DataObject::VisibleString(text)
                } else {
                    DataObject::Utf8String(text)
                }
            }
        };
        self.emit_leaf(dt, &value);
        Ok(value)
    }

    fn read_date_time(&mut self, dt: DataType) -> DlmsResult<DataObject> {
        let mut kind = match dt {
            DataType::Date => DateTimeKind::Date,
            DataType::Time => DateTimeKind::Time,
            _ => DateTimeKind::DateTime,
        };
        let available = self.buffer.available();
        if kind == DateTimeKind::DateTime && available < kind.len() {
            // Some meters answer a date-time attribute with a bare date or time.
            kind = match available {
                5 => DateTimeKind::Date,
                4 => DateTimeKind::Time,
                _ => kind,
            };
        }
        let bytes = self.buffer.pop_slice(kind.len())?;
        let value = DataObject::new_date_time(
            CosemDateTime::from_bytes(kind, bytes, &self.options)?,
            kind,
        );
        self.emit_leaf(value.data_type(), &value);
        Ok(value)
    }

    fn read_compact_array(&mut self) -> DlmsResult<DataObject> {
        let description = self.read_type_description(0)?;
        let len = self.buffer.get_object_count()?;
        let end = self.buffer.position() + len;
        if end > self.buffer.size() {
            return Err(DlmsError::IncompletePdu(format!(
                "compact array needs {} bytes",
                len
            )));
        }
        self.open_items(DataType::CompactArray, len);
        let mut values = Vec::new();
        while self.buffer.position() < end {
            values.push(self.read_described(&description)?);
        }
        if self.buffer.position() != end {
            return Err(DlmsError::malformed(
                self.buffer.position(),
                "compact array content overruns its length",
            ));
        }
        self.close(DataType::CompactArray);
        Ok(DataObject::CompactArray(CompactArray::new(description, values)?))
    }

    fn read_type_description(&mut self, depth: usize) -> DlmsResult<TypeDescription> {
        if depth > MAX_DEPTH {
            return Err(DlmsError::malformed(
                self.buffer.position(),
                format!("type description deeper than {}", MAX_DEPTH),
            ));
        }
        Ok(match self.read_tag()? {
            DataType::Array => {
                let count = self.buffer.pop_u16()?;
                TypeDescription::Array {
                    count,
                    element: Box::new(self.read_type_description(depth + 1)?),
                }
            }
            DataType::Structure => {
                let count = self.buffer.get_object_count()?;
                let mut fields = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    fields.push(self.read_type_description(depth + 1)?);
                }
                TypeDescription::Structure(fields)
            }
            DataType::CompactArray => {
                return Err(DlmsError::malformed(
                    self.buffer.position() - 1,
                    "compact arrays do not nest",
                ));
            }
            simple => TypeDescription::Simple(simple),
        })
    }

    fn read_described(&mut self, description: &TypeDescription) -> DlmsResult<DataObject> {
        match description {
            TypeDescription::Simple(dt) => self.read_body(*dt),
            TypeDescription::Array { count, element } => {
                let mut items = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    items.push(self.read_described(element)?);
                }
                Ok(DataObject::Array(items))
            }
            TypeDescription::Structure(fields) => {
                let mut items = Vec::with_capacity(fields.len());
                for field in fields {
                    items.push(self.read_described(field)?);
                }
                Ok(DataObject::Structure(items))
            }
        }
    }

    fn emit_leaf(&mut self, dt: DataType, value: &DataObject) {
        if let Some(sink) = self.sink.as_deref_mut() {
            let tag = sink.data_type_tag(dt);
            let text = match value.as_i128() {
                Some(v) if matches!(dt, DataType::Enum | DataType::UInt8 | DataType::UInt16) => {
                    sink.integer_to_hex(v as u64, 2, false)
                }
                _ => value.to_string(),
            };
            sink.leaf(&tag, &text);
        }
    }

    fn open_items(&mut self, dt: DataType, count: usize) {
        if let Some(sink) = self.sink.as_deref_mut() {
            let tag = sink.data_type_tag(dt);
            let qty = sink.integer_to_hex(count as u64, 2, false);
            sink.open(&tag, &[("Qty".to_string(), qty)]);
        }
    }

    fn close(&mut self, dt: DataType) {
        if let Some(sink) = self.sink.as_deref_mut() {
            let tag = sink.data_type_tag(dt);
            sink.close(&tag);
        }
    }
}

fn is_short_read(e: &DlmsError) -> bool {
    matches!(e, DlmsError::IndexOutOfRange { .. }) || e.is_incomplete()
}

/// Decode one value from `buffer`, see [`AxdrDecoder::get_data`].
pub fn get_data<'a>(
    buffer: &'a mut ByteBuffer,
    info: &mut DataInfo,
    options: &CodecOptions,
    sink: Option<&'a mut dyn TranslatorSink>,
) -> DlmsResult<DataObject> {
    let mut decoder = AxdrDecoder::new(buffer).with_options(*options);
    if let Some(sink) = sink {
        decoder = decoder.with_sink(sink);
    }
    decoder.get_data(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::{MockTranslatorSink, XmlTranslator};
    use mockall::predicate::eq;

    fn decode(hex: &str) -> DlmsResult<DataObject> {
        let mut bb = ByteBuffer::from_hex(hex).unwrap();
        AxdrDecoder::new(&mut bb).get_data(&mut DataInfo::new())
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode("03 01").unwrap(), DataObject::Boolean(true));
        assert_eq!(decode("03 7F").unwrap(), DataObject::Boolean(true));
        assert_eq!(decode("0F FE").unwrap(), DataObject::Integer8(-2));
        assert_eq!(decode("12 01 02").unwrap(), DataObject::Unsigned16(0x0102));
        assert_eq!(decode("05 FF FF FF FF").unwrap(), DataObject::Integer32(-1));
        assert_eq!(decode("16 03").unwrap(), DataObject::Enumerate(3));
        assert_eq!(decode("17 3F C0 00 00").unwrap(), DataObject::Float32(1.5));
        assert_eq!(decode("00").unwrap(), DataObject::Null);
    }

    #[test]
    fn test_decode_strings() {
        assert_eq!(
            decode("09 03 01 02 03").unwrap(),
            DataObject::OctetString(vec![1, 2, 3])
        );
        assert_eq!(
            decode("0A 02 41 42").unwrap(),
            DataObject::VisibleString("AB".to_string())
        );
        assert!(matches!(
            decode("0C 01 FF"),
            Err(DlmsError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_decode_bit_string() {
        let v = decode("04 0A 80 40").unwrap();
        let DataObject::BitString(bs) = v else {
            panic!("not a bit string");
        };
        assert_eq!(bs.num_bits(), 10);
        assert_eq!(bs.to_string(), "1000000001");
    }

    #[test]
    fn test_decode_structure() {
        let v = decode("02 02 11 05 01 01 12 00 07").unwrap();
        assert_eq!(
            v,
            DataObject::Structure(vec![
                DataObject::Unsigned8(5),
                DataObject::Array(vec![DataObject::Unsigned16(7)]),
            ])
        );
    }

    #[test]
    fn test_unknown_tag_is_malformed() {
        let mut bb = ByteBuffer::from_hex("02 01 07").unwrap();
        let err = AxdrDecoder::new(&mut bb)
            .get_data(&mut DataInfo::new())
            .unwrap_err();
        assert!(matches!(err, DlmsError::MalformedInput { offset: 2, .. }));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut bytes = [0x02, 0x01].repeat(100_000);
        bytes.push(0x00);
        let mut bb = ByteBuffer::from(bytes);
        let err = AxdrDecoder::new(&mut bb)
            .get_data(&mut DataInfo::new())
            .unwrap_err();
        assert!(matches!(err, DlmsError::MalformedInput { .. }));

        let mut bytes = [0x01, 0x01].repeat(MAX_DEPTH);
        bytes.push(0x00);
        let mut bb = ByteBuffer::from(bytes);
        assert!(AxdrDecoder::new(&mut bb).get_data(&mut DataInfo::new()).is_ok());
    }

    #[test]
    fn test_deep_compact_array_description_rejected() {
        let mut bytes = vec![0x13];
        bytes.extend([0x02, 0x01].repeat(10_000));
        bytes.extend([0x11, 0x00]);
        let mut bb = ByteBuffer::from(bytes);
        let err = AxdrDecoder::new(&mut bb)
            .get_data(&mut DataInfo::new())
            .unwrap_err();
        assert!(matches!(err, DlmsError::MalformedInput { .. }));
    }

    #[test]
    fn test_inner_length_past_end() {
        // Octet string claiming 255 bytes inside a structure.
        let err = decode("02 01 09 81 FF 01 02").unwrap_err();
        assert!(err.is_incomplete());
        // Nested array claiming 0x7FFFFFFF elements.
        let err = decode("02 01 01 84 7F FF FF FF 00 00").unwrap_err();
        assert!(err.is_incomplete());
        // Compact array content length beyond the buffer.
        let err = decode("13 11 82 FF FF 01").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn test_incomplete_scalar_rewinds() {
        let mut bb = ByteBuffer::from_hex("06 00 00").unwrap();
        let mut info = DataInfo::new();
        let err = AxdrDecoder::new(&mut bb).get_data(&mut info).unwrap_err();
        assert!(err.is_incomplete());
        assert!(!info.complete);
        assert_eq!(bb.position(), 0);

        bb.push_slice(&[0x01, 0x02]);
        let v = AxdrDecoder::new(&mut bb).get_data(&mut info).unwrap();
        assert_eq!(v, DataObject::Unsigned32(0x0102));
        assert!(info.complete);
        assert_eq!(bb.available(), 0);
    }

    #[test]
    fn test_array_resumes() {
        // Array of three u16, the last one cut in half.
        let mut bb = ByteBuffer::from_hex("01 03 12 00 01 12 00 02 12 00").unwrap();
        let mut info = DataInfo::new();
        assert!(AxdrDecoder::new(&mut bb).get_data(&mut info).is_err());
        assert!(info.is_resuming());
        assert_eq!(info.index, 2);
        assert_eq!(info.count, 3);
        assert_eq!(info.decoded(), 2);
        assert_eq!(bb.position(), 8);

        bb.push_u8(0x03);
        let v = AxdrDecoder::new(&mut bb).get_data(&mut info).unwrap();
        assert_eq!(
            v,
            DataObject::Array(vec![1u16.into(), 2u16.into(), 3u16.into()])
        );
        assert!(info.complete);
        assert!(!info.is_resuming());
    }

    #[test]
    fn test_known_type_octet_string_takes_remainder() {
        let mut bb = ByteBuffer::from_hex("01 02 03 04").unwrap();
        let mut info = DataInfo::with_type(DataType::OctetString);
        let v = AxdrDecoder::new(&mut bb).get_data(&mut info).unwrap();
        assert_eq!(v, DataObject::OctetString(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_known_type_scalar() {
        let mut bb = ByteBuffer::from_hex("00 2A").unwrap();
        let mut info = DataInfo::with_type(DataType::UInt16);
        let v = AxdrDecoder::new(&mut bb).get_data(&mut info).unwrap();
        assert_eq!(v, DataObject::Unsigned16(42));
    }

    #[test]
    fn test_date_time_falls_back_to_date() {
        let v = decode("19 07 E8 0C 1F 02").unwrap();
        assert_eq!(v.data_type(), DataType::Date);
        assert_eq!(v.to_string(), "2024-12-31");

        let v = decode("19 0F 04 05 00").unwrap();
        assert_eq!(v.data_type(), DataType::Time);
        assert_eq!(v.to_string(), "15:04:05");
    }

    #[test]
    fn test_date_time_incomplete() {
        let mut bb = ByteBuffer::from_hex("19 07 E8 0C 1F 02 0F 04").unwrap();
        let mut info = DataInfo::new();
        let err = AxdrDecoder::new(&mut bb).get_data(&mut info).unwrap_err();
        assert!(err.is_incomplete());
        assert_eq!(bb.position(), 0);
    }

    #[test]
    fn test_compact_array() {
        // Description: structure { u8, i16 }, two rows, 6 content bytes.
        let v = decode("13 02 02 11 10 06 01 FF FF 02 00 05").unwrap();
        let DataObject::CompactArray(ca) = v else {
            panic!("not a compact array");
        };
        assert_eq!(ca.len(), 2);
        assert_eq!(
            ca.values()[0],
            DataObject::Structure(vec![DataObject::Unsigned8(1), DataObject::Integer16(-1)])
        );
    }

    #[test]
    fn test_sink_receives_tree() {
        let mut bb = ByteBuffer::from_hex("02 02 11 05 09 01 AA").unwrap();
        let mut xml = XmlTranslator::new();
        AxdrDecoder::new(&mut bb)
            .with_sink(&mut xml)
            .get_data(&mut DataInfo::new())
            .unwrap();
        assert_eq!(
            xml.as_str(),
            "<Structure Qty=\"2\">\n  <UInt8 Value=\"5\" />\n  <OctetString Value=\"AA\" />\n</Structure>\n"
        );
    }

    #[test]
    fn test_sink_does_not_affect_consumption() {
        let mut sink = MockTranslatorSink::new();
        sink.expect_data_type_tag()
            .with(eq(DataType::Int8))
            .returning(|_| "Int8".to_string());
        sink.expect_leaf()
            .withf(|tag, value| tag == "Int8" && value == "-1")
            .times(1)
            .return_const(());
        let mut bb = ByteBuffer::from_hex("0F FF 0F").unwrap();
        let v = get_data(&mut bb, &mut DataInfo::new(), &CodecOptions::default(), Some(&mut sink))
            .unwrap();
        assert_eq!(v, DataObject::Integer8(-1));
        assert_eq!(bb.position(), 2);
    }
}
