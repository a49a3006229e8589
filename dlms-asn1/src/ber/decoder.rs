//! BER decoder for ASN.1 structures
//!
//! Parses DER/BER input into an [`Asn1Tree`]. Definite lengths only.

use crate::ber::oid::{Oid, X509Name};
use crate::ber::tree::{Asn1Integer, Asn1Node, Asn1Time, Asn1Tree, Asn1Value, NodeId, TaggedContent};
use crate::ber::types::{BerLength, BerTag, BerTagClass, tags};
use crate::error::{DlmsError, DlmsResult};
use crate::translator::TranslatorSink;
use dlms_core::datatypes::BitString;
use log::trace;

/// Deepest constructed nesting accepted in one document.
pub const MAX_DEPTH: usize = 64;

/// BER decoder building an arena tree
pub struct BerDecoder<'a> {
    data: &'a [u8],
    position: usize,
    sink: Option<&'a mut dyn TranslatorSink>,
}

impl<'a> BerDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            sink: None,
        }
    }

    /// Mirror the parsed structure into `sink`.
    pub fn with_sink(mut self, sink: &'a mut dyn TranslatorSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Get current position in buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Parse one TLV (and everything nested in it) into `tree`.
    pub fn decode(&mut self, tree: &mut Asn1Tree) -> DlmsResult<NodeId> {
        self.decode_within(tree, self.data.len(), 0)
    }

    /// Parse one TLV that must end at or before `limit`.
    fn decode_within(
        &mut self,
        tree: &mut Asn1Tree,
        limit: usize,
        depth: usize,
    ) -> DlmsResult<NodeId> {
        let data = self.data;
        let tag_offset = self.position;
        if tag_offset >= limit {
            return Err(DlmsError::malformed(tag_offset, "missing tag"));
        }
        if depth > MAX_DEPTH {
            return Err(DlmsError::malformed(
                tag_offset,
                format!("nesting deeper than {}", MAX_DEPTH),
            ));
        }
        let tag_byte = data[tag_offset];
        let tag = BerTag::decode(tag_byte, tag_offset)?;
        let (len, used) = BerLength::decode(&data[..limit], tag_offset + 1)?;
        let start = tag_offset + 1 + used;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= limit)
            .ok_or_else(|| {
                DlmsError::malformed(
                    tag_offset,
                    format!("length {} exceeds the {} bytes left", len, limit - start),
                )
            })?;
        trace!("BER tag 0x{:02X} at {} length {}", tag_byte, tag_offset, len);
        self.position = start;

        let node = match (tag.class(), tag.is_constructed()) {
            (BerTagClass::Universal, true) => {
                let name = match tag.number() {
                    tags::SEQUENCE => "Sequence",
                    tags::SET => "Set",
                    _ => {
                        return Err(DlmsError::malformed(
                            tag_offset,
                            format!("unsupported constructed tag 0x{:02X}", tag_byte),
                        ));
                    }
                };
                self.open(name);
                let children = self.decode_children(tree, end, depth + 1)?;
                self.close(name);
                if tag.number() == tags::SEQUENCE {
                    Asn1Node::Sequence(children)
                } else {
                    Asn1Node::Set(children)
                }
            }
            (BerTagClass::Universal, false) => {
                self.position = end;
                let value = parse_primitive(tag.number(), &data[start..end], start)?;
                if let Some(sink) = self.sink.as_deref_mut() {
                    sink.leaf(primitive_name(tag.number()), &describe(&value));
                }
                Asn1Node::Value(value)
            }
            (class, true) => {
                let name = format!("{:?}{}", class, tag.number());
                self.open(&name);
                let children = self.decode_children(tree, end, depth + 1)?;
                self.close(&name);
                Asn1Node::Tagged {
                    class,
                    index: tag.number(),
                    content: TaggedContent::Constructed(children),
                }
            }
            (class, false) => {
                let bytes = data[start..end].to_vec();
                self.position = end;
                if let Some(sink) = self.sink.as_deref_mut() {
                    let name = format!("{:?}{}", class, tag.number());
                    sink.leaf(&name, &dlms_core::helpers::to_hex(&bytes, true));
                }
                Asn1Node::Tagged {
                    class,
                    index: tag.number(),
                    content: TaggedContent::Primitive(bytes),
                }
            }
        };
        Ok(tree.add(node))
    }

    fn decode_children(
        &mut self,
        tree: &mut Asn1Tree,
        end: usize,
        depth: usize,
    ) -> DlmsResult<Vec<NodeId>> {
        let mut children = Vec::new();
        while self.position < end {
            children.push(self.decode_within(tree, end, depth)?);
        }
        Ok(children)
    }

    fn open(&mut self, name: &str) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.open(name, &[]);
        }
    }

    fn close(&mut self, name: &str) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.close(name);
        }
    }
}

fn primitive_name(number: u8) -> &'static str {
    match number {
        tags::BOOLEAN => "Boolean",
        tags::INTEGER => "Integer",
        tags::BIT_STRING => "BitString",
        tags::OCTET_STRING => "OctetString",
        tags::NULL => "Null",
        tags::OBJECT_IDENTIFIER => "ObjectIdentifier",
        tags::UTF8_STRING => "Utf8String",
        tags::PRINTABLE_STRING => "PrintableString",
        tags::IA5_STRING => "Ia5String",
        tags::UTC_TIME => "UtcTime",
        tags::GENERALIZED_TIME => "GeneralizedTime",
        tags::BMP_STRING => "BmpString",
        _ => "Other",
    }
}

fn describe(value: &Asn1Value) -> String {
    match value {
        Asn1Value::ObjectIdentifier(oid) => match X509Name::from_oid(oid) {
            Some(name) => format!("{} ({})", oid, name),
            None => oid.to_string(),
        },
        other => other.to_string(),
    }
}

fn text(bytes: &[u8], offset: usize) -> DlmsResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DlmsError::malformed(offset, "invalid string content"))
}

fn parse_primitive(number: u8, bytes: &[u8], offset: usize) -> DlmsResult<Asn1Value> {
    Ok(match number {
        tags::BOOLEAN => {
            if bytes.len() != 1 {
                return Err(DlmsError::malformed(offset, "BOOLEAN must be one byte"));
            }
            Asn1Value::Boolean(bytes[0] != 0)
        }
        tags::INTEGER => {
            if bytes.is_empty() {
                return Err(DlmsError::malformed(offset, "empty INTEGER"));
            }
            Asn1Value::Integer(Asn1Integer::from_bytes(bytes.to_vec()))
        }
        tags::BIT_STRING => {
            let (&pad, rest) = bytes
                .split_first()
                .ok_or_else(|| DlmsError::malformed(offset, "empty BIT STRING"))?;
            Asn1Value::BitString(
                BitString::from_padded(pad, rest.to_vec())
                    .map_err(|_| DlmsError::malformed(offset, format!("bad pad count {}", pad)))?,
            )
        }
        tags::OCTET_STRING => Asn1Value::OctetString(bytes.to_vec()),
        tags::NULL => {
            if !bytes.is_empty() {
                return Err(DlmsError::malformed(offset, "NULL with content"));
            }
            Asn1Value::Null
        }
        tags::OBJECT_IDENTIFIER => Asn1Value::ObjectIdentifier(Oid::from_der(bytes, offset)?),
        tags::UTF8_STRING => Asn1Value::Utf8String(text(bytes, offset)?),
        tags::PRINTABLE_STRING => Asn1Value::PrintableString(text(bytes, offset)?),
        tags::IA5_STRING => Asn1Value::Ia5String(text(bytes, offset)?),
        tags::BMP_STRING => {
            if bytes.len() % 2 != 0 {
                return Err(DlmsError::malformed(offset, "odd BMPString length"));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Asn1Value::BmpString(
                String::from_utf16(&units)
                    .map_err(|_| DlmsError::malformed(offset, "invalid BMPString"))?,
            )
        }
        tags::UTC_TIME => Asn1Value::UtcTime(Asn1Time::parse_utc(&text(bytes, offset)?)?),
        tags::GENERALIZED_TIME => {
            Asn1Value::GeneralizedTime(Asn1Time::parse_generalized(&text(bytes, offset)?)?)
        }
        other => Asn1Value::Other {
            tag: other,
            bytes: bytes.to_vec(),
        },
    })
}

/// Parse a complete DER document.
pub fn parse(der: &[u8]) -> DlmsResult<(Asn1Tree, NodeId)> {
    let mut tree = Asn1Tree::new();
    let mut decoder = BerDecoder::new(der);
    let root = decoder.decode(&mut tree)?;
    if decoder.remaining() != 0 {
        return Err(DlmsError::malformed(
            decoder.position(),
            format!("{} trailing bytes", decoder.remaining()),
        ));
    }
    Ok((tree, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::XmlTranslator;

    #[test]
    fn test_parse_sequence() {
        // SEQUENCE { INTEGER 5, OID 2.5.4.3, NULL, BOOLEAN TRUE }
        let der = [
            0x30, 0x0B, 0x02, 0x01, 0x05, 0x06, 0x03, 0x55, 0x04, 0x03, 0x05, 0x00, 0x01, 0x01, 0xFF,
        ];
        let (tree, root) = parse(&der).unwrap();
        let items = tree.sequence_items(root).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(tree.as_integer(items[0]).unwrap().to_i8(), Some(5));
        assert_eq!(tree.as_oid(items[1]).unwrap().to_string(), "2.5.4.3");
        assert_eq!(tree.leaf(items[2]).unwrap(), &Asn1Value::Null);
        assert!(tree.as_bool(items[3]).unwrap());
    }

    #[test]
    fn test_parse_context_tags() {
        // [0] { INTEGER 2 }, [1] primitive 0xAB
        let der = [0x30, 0x08, 0xA0, 0x03, 0x02, 0x01, 0x02, 0x81, 0x01, 0xAB];
        let (tree, root) = parse(&der).unwrap();
        let a = tree.child(root, 0).unwrap();
        let b = tree.child(root, 1).unwrap();
        assert_eq!(tree.context_index(a), Some(0));
        assert_eq!(tree.context_index(b), Some(1));
        assert_eq!(
            tree.node(b).unwrap(),
            &Asn1Node::Tagged {
                class: BerTagClass::ContextSpecific,
                index: 1,
                content: TaggedContent::Primitive(vec![0xAB]),
            }
        );
    }

    #[test]
    fn test_bit_string_integer_view() {
        // KeyUsage digitalSignature | keyAgreement: 03 02 03 88
        let (tree, root) = parse(&[0x03, 0x02, 0x03, 0x88]).unwrap();
        let bs = tree.as_bit_string(root).unwrap();
        assert_eq!(bs.pad_bits(), 3);
        assert_eq!(bs.to_integer(), 0x11);
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            parse(&[0x30, 0x05, 0x02, 0x01]),
            Err(DlmsError::MalformedInput { offset: 0, .. })
        ));
        assert!(matches!(
            parse(&[0x30, 0x80, 0x00, 0x00]),
            Err(DlmsError::MalformedInput { offset: 1, .. })
        ));
        // Child claims more than its parent holds.
        assert!(parse(&[0x30, 0x02, 0x04, 0x05, 0x00]).is_err());
        assert!(parse(&[0x05, 0x00, 0x05]).is_err());
    }

    fn nested_sequences(levels: usize) -> Vec<u8> {
        let mut der = Vec::with_capacity(levels * 6 + 2);
        for i in 0..levels {
            let len = (2 + 6 * (levels - 1 - i)) as u32;
            der.extend([0x30, 0x84]);
            der.extend(len.to_be_bytes());
        }
        der.extend([0x05, 0x00]);
        der
    }

    #[test]
    fn test_deep_nesting_rejected() {
        assert!(matches!(
            parse(&nested_sequences(50_000)),
            Err(DlmsError::MalformedInput { .. })
        ));
        let err = parse(&nested_sequences(MAX_DEPTH + 1)).unwrap_err();
        assert!(matches!(err, DlmsError::MalformedInput { offset, .. } if offset == (MAX_DEPTH + 1) * 6));
        let (tree, root) = parse(&nested_sequences(MAX_DEPTH)).unwrap();
        assert_eq!(tree.sequence_items(root).unwrap().len(), 1);
    }

    #[test]
    fn test_nested_length_past_end() {
        // Inner OCTET STRING claims 0x7FFFFFFF bytes inside a short parent.
        let der = [0x30, 0x07, 0x04, 0x84, 0x7F, 0xFF, 0xFF, 0xFF, 0x00];
        assert!(matches!(
            parse(&der),
            Err(DlmsError::MalformedInput { offset: 2, .. })
        ));
        // Outer length beyond the input.
        let der = [0x30, 0x84, 0xFF, 0xFF, 0xFF, 0xFF, 0x05, 0x00];
        assert!(matches!(
            parse(&der),
            Err(DlmsError::MalformedInput { offset: 0, .. })
        ));
        // Length bytes cut off by the parent.
        let der = [0x30, 0x03, 0x04, 0x82, 0x00, 0x00];
        assert!(parse(&der).is_err());
    }

    #[test]
    fn test_sink_mirror() {
        let der = [0x30, 0x03, 0x02, 0x01, 0x07];
        let mut xml = XmlTranslator::new();
        let mut tree = Asn1Tree::new();
        let mut decoder = BerDecoder::new(&der).with_sink(&mut xml);
        decoder.decode(&mut tree).unwrap();
        assert_eq!(decoder.position(), der.len());
        assert_eq!(
            xml.as_str(),
            "<Sequence>\n  <Integer Value=\"7\" />\n</Sequence>\n"
        );
    }
}
