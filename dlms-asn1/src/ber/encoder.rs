//! BER encoder for ASN.1 structures
//!
//! Emits DER: definite lengths, minimal integers, `0xFF` for TRUE.

use crate::ber::tree::{Asn1Integer, Asn1Node, Asn1Tree, Asn1Value, NodeId, TaggedContent};
use crate::ber::types::{BerLength, BerTag, tags};
use crate::error::{DlmsError, DlmsResult};

/// BER encoder writing the subtree of an [`Asn1Tree`]
#[derive(Debug, Default)]
pub struct BerEncoder {
    buffer: Vec<u8>,
}

impl BerEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the encoding of `id` and everything below it.
    pub fn encode(&mut self, tree: &Asn1Tree, id: NodeId) -> DlmsResult<()> {
        let (tag, content) = match tree.node(id)? {
            Asn1Node::Sequence(children) => (
                BerTag::universal(true, tags::SEQUENCE).encode(),
                encode_children(tree, children)?,
            ),
            Asn1Node::Set(children) => (
                BerTag::universal(true, tags::SET).encode(),
                encode_children(tree, children)?,
            ),
            Asn1Node::Tagged {
                class,
                index,
                content,
            } => match content {
                TaggedContent::Constructed(children) => (
                    BerTag::new(*class, true, *index)?.encode(),
                    encode_children(tree, children)?,
                ),
                TaggedContent::Primitive(bytes) => {
                    (BerTag::new(*class, false, *index)?.encode(), bytes.clone())
                }
            },
            Asn1Node::Value(value) => encode_value(value)?,
        };
        self.buffer.push(tag);
        BerLength::encode(content.len(), &mut self.buffer);
        self.buffer.extend_from_slice(&content);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn encode_children(tree: &Asn1Tree, children: &[NodeId]) -> DlmsResult<Vec<u8>> {
    let mut inner = BerEncoder::new();
    for child in children {
        inner.encode(tree, *child)?;
    }
    Ok(inner.buffer)
}

fn encode_value(value: &Asn1Value) -> DlmsResult<(u8, Vec<u8>)> {
    Ok(match value {
        Asn1Value::ObjectIdentifier(oid) => (tags::OBJECT_IDENTIFIER, oid.to_der()),
        Asn1Value::BitString(bs) => {
            let mut content = vec![bs.pad_bits()];
            content.extend_from_slice(bs.as_bytes());
            (tags::BIT_STRING, content)
        }
        Asn1Value::Integer(i) => {
            let mut minimal: Asn1Integer = i.clone();
            minimal.minimize();
            (tags::INTEGER, minimal.as_bytes().to_vec())
        }
        Asn1Value::Null => (tags::NULL, Vec::new()),
        Asn1Value::Boolean(b) => (tags::BOOLEAN, vec![if *b { 0xFF } else { 0x00 }]),
        Asn1Value::UtcTime(t) => (tags::UTC_TIME, t.text().as_bytes().to_vec()),
        Asn1Value::GeneralizedTime(t) => (tags::GENERALIZED_TIME, t.text().as_bytes().to_vec()),
        Asn1Value::PrintableString(s) => (tags::PRINTABLE_STRING, s.as_bytes().to_vec()),
        Asn1Value::Utf8String(s) => (tags::UTF8_STRING, s.as_bytes().to_vec()),
        Asn1Value::Ia5String(s) => (tags::IA5_STRING, s.as_bytes().to_vec()),
        Asn1Value::BmpString(s) => (
            tags::BMP_STRING,
            s.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        ),
        Asn1Value::OctetString(b) => (tags::OCTET_STRING, b.clone()),
        Asn1Value::PublicKey(point) => {
            if point.len() != 64 && point.len() != 96 {
                return Err(DlmsError::Asn1Encoding(format!(
                    "public key point must be 64 or 96 bytes, got {}",
                    point.len()
                )));
            }
            let mut content = vec![0x00, 0x04];
            content.extend_from_slice(point);
            (tags::BIT_STRING, content)
        }
        Asn1Value::Other { tag, bytes } => (*tag, bytes.clone()),
    })
}

/// Encode the subtree rooted at `id`.
pub fn encode(tree: &Asn1Tree, id: NodeId) -> DlmsResult<Vec<u8>> {
    let mut encoder = BerEncoder::new();
    encoder.encode(tree, id)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::decoder::parse;
    use crate::ber::tree::Asn1Time;
    use chrono::{FixedOffset, TimeZone};
    use dlms_core::helpers::hex_to_bytes;

    #[test]
    fn test_round_trip() {
        let hex = "30 2F 02 01 05 06 03 55 04 03 05 00 01 01 FF 31 09 06 03 55 04 06 13 02 46 49 \
                   A0 03 02 01 02 81 01 AB 17 0D 32 34 30 31 33 31 31 32 30 30 30 30 5A";
        let der = hex_to_bytes(hex).unwrap();
        let (tree, root) = parse(&der).unwrap();
        assert_eq!(encode(&tree, root).unwrap(), der);
    }

    #[test]
    fn test_boolean_canonical() {
        let (tree, root) = parse(&[0x01, 0x01, 0x01]).unwrap();
        assert_eq!(encode(&tree, root).unwrap(), vec![0x01, 0x01, 0xFF]);
    }

    #[test]
    fn test_built_tree() {
        let mut tree = Asn1Tree::new();
        let n = tree.integer(300);
        let t = tree.value(Asn1Value::UtcTime(Asn1Time::utc(
            FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap(),
        )));
        let ctx = tree.context(3, vec![n]);
        let root = tree.sequence(vec![ctx, t]);
        let der = encode(&tree, root).unwrap();
        assert_eq!(
            der,
            hex_to_bytes("30 15 A3 04 02 02 01 2C 17 0D 33 30 30 36 30 31 30 30 30 30 30 30 5A")
                .unwrap()
        );
        let (again, root) = parse(&der).unwrap();
        assert_eq!(encode(&again, root).unwrap(), der);
    }

    #[test]
    fn test_public_key_leaf() {
        let mut tree = Asn1Tree::new();
        let pk = tree.value(Asn1Value::PublicKey(vec![1; 64]));
        let der = encode(&tree, pk).unwrap();
        assert_eq!(&der[..4], &[0x03, 0x42, 0x00, 0x04]);
        let bad = tree.value(Asn1Value::PublicKey(vec![1; 10]));
        assert!(encode(&tree, bad).is_err());
    }

    #[test]
    fn test_long_length() {
        let mut tree = Asn1Tree::new();
        let os = tree.value(Asn1Value::OctetString(vec![0; 200]));
        let der = encode(&tree, os).unwrap();
        assert_eq!(&der[..3], &[0x04, 0x81, 0xC8]);
        assert_eq!(der.len(), 203);
    }
}
