//! Arena-allocated ASN.1 trees

use crate::ber::oid::Oid;
use crate::ber::types::BerTagClass;
use crate::error::{DlmsError, DlmsResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use dlms_core::datatypes::BitString;
use std::fmt;

/// Handle of a node inside an [`Asn1Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Content of an explicitly tagged (context, application or private) node
#[derive(Debug, Clone, PartialEq)]
pub enum TaggedContent {
    Constructed(Vec<NodeId>),
    Primitive(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Asn1Node {
    Sequence(Vec<NodeId>),
    /// A SET, usually a single attribute key/value pair
    Set(Vec<NodeId>),
    Tagged {
        class: BerTagClass,
        index: u8,
        content: TaggedContent,
    },
    Value(Asn1Value),
}

/// Arbitrary precision two's complement integer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asn1Integer {
    bytes: Vec<u8>,
}

impl Asn1Integer {
    /// Wrap raw two's complement content octets.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: if bytes.is_empty() { vec![0] } else { bytes },
        }
    }

    /// Positive integer from unsigned big-endian magnitude.
    pub fn from_unsigned(magnitude: &[u8]) -> Self {
        let trimmed: Vec<u8> = magnitude.iter().copied().skip_while(|b| *b == 0).collect();
        let mut bytes = Vec::with_capacity(trimmed.len() + 1);
        if trimmed.first().is_none_or(|b| b & 0x80 != 0) {
            bytes.push(0);
        }
        bytes.extend(trimmed);
        Self { bytes }
    }

    pub fn from_i64(value: i64) -> Self {
        let mut i = Self {
            bytes: value.to_be_bytes().to_vec(),
        };
        i.minimize();
        i
    }

    /// Drop redundant sign bytes.
    pub fn minimize(&mut self) {
        while self.bytes.len() > 1 {
            let (a, b) = (self.bytes[0], self.bytes[1]);
            if (a == 0 && b & 0x80 == 0) || (a == 0xFF && b & 0x80 != 0) {
                self.bytes.remove(0);
            } else {
                break;
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_negative(&self) -> bool {
        self.bytes[0] & 0x80 != 0
    }

    /// Magnitude without the sign byte, for non-negative values.
    pub fn unsigned_bytes(&self) -> &[u8] {
        if self.bytes.len() > 1 && self.bytes[0] == 0 {
            &self.bytes[1..]
        } else {
            &self.bytes
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        if self.bytes.len() > 8 {
            return None;
        }
        let fill = if self.is_negative() { 0xFF } else { 0 };
        let mut raw = [fill; 8];
        raw[8 - self.bytes.len()..].copy_from_slice(&self.bytes);
        Some(i64::from_be_bytes(raw))
    }

    pub fn to_i8(&self) -> Option<i8> {
        self.to_i64().and_then(|v| i8::try_from(v).ok())
    }

    pub fn to_i16(&self) -> Option<i16> {
        self.to_i64().and_then(|v| i16::try_from(v).ok())
    }

    pub fn to_i32(&self) -> Option<i32> {
        self.to_i64().and_then(|v| i32::try_from(v).ok())
    }
}

impl fmt::Display for Asn1Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_i64() {
            Some(v) => write!(f, "{}", v),
            None => f.write_str(&dlms_core::helpers::to_hex(&self.bytes, false)),
        }
    }
}

/// A UTCTime or GeneralizedTime with its source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asn1Time {
    value: DateTime<FixedOffset>,
    text: String,
}

impl Asn1Time {
    pub fn value(&self) -> DateTime<FixedOffset> {
        self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `YYMMDDHHMMSSZ` rendering of `value` in UTC.
    pub fn utc(value: DateTime<FixedOffset>) -> Self {
        let text = value.with_timezone(&Utc).format("%y%m%d%H%M%SZ").to_string();
        Self { value, text }
    }

    /// `YYYYMMDDHHMMSSZ` rendering of `value` in UTC.
    pub fn generalized(value: DateTime<FixedOffset>) -> Self {
        let text = value.with_timezone(&Utc).format("%Y%m%d%H%M%SZ").to_string();
        Self { value, text }
    }

    /// Parse `YYMMDDHHMM[SS](Z|+HHMM|-HHMM)`.
    pub fn parse_utc(text: &str) -> DlmsResult<Self> {
        let err = || DlmsError::Asn1Decoding(format!("invalid UTCTime '{}'", text));
        let (body, offset) = split_zone(text).ok_or_else(err)?;
        if !(body.len() == 10 || body.len() == 12) || !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let yy = num(body, 0, 2).ok_or_else(err)?;
        let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
        let sec = if body.len() == 12 { num(body, 10, 2).ok_or_else(err)? } else { 0 };
        let naive = naive(
            year,
            num(body, 2, 2).ok_or_else(err)?,
            num(body, 4, 2).ok_or_else(err)?,
            num(body, 6, 2).ok_or_else(err)?,
            num(body, 8, 2).ok_or_else(err)?,
            sec,
            0,
        )
        .ok_or_else(err)?;
        Ok(Self {
            value: at_offset(naive, offset).ok_or_else(err)?,
            text: text.to_string(),
        })
    }

    /// Parse `YYYYMMDDHHMMSS[.fff][Z|+HHMM|-HHMM]`.
    pub fn parse_generalized(text: &str) -> DlmsResult<Self> {
        let err = || DlmsError::Asn1Decoding(format!("invalid GeneralizedTime '{}'", text));
        let (body, offset) = split_zone(text).unwrap_or((text, 0));
        let (main, fraction) = match body.split_once('.') {
            Some((m, f)) => (m, Some(f)),
            None => (body, None),
        };
        if main.len() != 14 || !main.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let millis = match fraction {
            Some(f) if !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()) => {
                let padded = format!("{:0<3}", f);
                padded[..3].parse::<u32>().map_err(|_| err())?
            }
            Some(_) => return Err(err()),
            None => 0,
        };
        let naive = naive(
            num(main, 0, 4).ok_or_else(err)?,
            num(main, 4, 2).ok_or_else(err)?,
            num(main, 6, 2).ok_or_else(err)?,
            num(main, 8, 2).ok_or_else(err)?,
            num(main, 10, 2).ok_or_else(err)?,
            num(main, 12, 2).ok_or_else(err)?,
            millis,
        )
        .ok_or_else(err)?;
        Ok(Self {
            value: at_offset(naive, offset).ok_or_else(err)?,
            text: text.to_string(),
        })
    }
}

fn num(s: &str, start: usize, len: usize) -> Option<i32> {
    s.get(start..start + len)?.parse().ok()
}

fn naive(y: i32, mo: i32, d: i32, h: i32, mi: i32, s: i32, ms: u32) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(y, mo as u32, d as u32)?;
    let time = NaiveTime::from_hms_milli_opt(h as u32, mi as u32, s as u32, ms)?;
    Some(NaiveDateTime::new(date, time))
}

/// Split a trailing `Z` or `±HHMM` zone, returning the offset in seconds.
fn split_zone(text: &str) -> Option<(&str, i32)> {
    if let Some(body) = text.strip_suffix('Z') {
        return Some((body, 0));
    }
    let pos = text.rfind(['+', '-'])?;
    let zone = &text[pos + 1..];
    if zone.len() != 4 || !zone.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let minutes = num(zone, 0, 2)? * 60 + num(zone, 2, 2)?;
    let sign = if text.as_bytes()[pos] == b'-' { -1 } else { 1 };
    Some((&text[..pos], sign * minutes * 60))
}

fn at_offset(naive: NaiveDateTime, offset_seconds: i32) -> Option<DateTime<FixedOffset>> {
    FixedOffset::east_opt(offset_seconds)?
        .from_local_datetime(&naive)
        .single()
}

/// Leaf values of an ASN.1 tree
#[derive(Debug, Clone, PartialEq)]
pub enum Asn1Value {
    ObjectIdentifier(Oid),
    BitString(BitString),
    Integer(Asn1Integer),
    Null,
    Boolean(bool),
    UtcTime(Asn1Time),
    GeneralizedTime(Asn1Time),
    PrintableString(String),
    Utf8String(String),
    Ia5String(String),
    BmpString(String),
    OctetString(Vec<u8>),
    /// Raw `x || y` curve point (64 or 96 bytes), emitted as a BIT STRING
    /// holding an uncompressed point
    PublicKey(Vec<u8>),
    /// Universal primitive the parser does not interpret
    Other { tag: u8, bytes: Vec<u8> },
}

impl Asn1Value {
    /// Text of any of the string kinds.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Asn1Value::PrintableString(s)
            | Asn1Value::Utf8String(s)
            | Asn1Value::Ia5String(s)
            | Asn1Value::BmpString(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Asn1Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asn1Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Asn1Value::BitString(bs) => write!(f, "{}", bs),
            Asn1Value::Integer(i) => write!(f, "{}", i),
            Asn1Value::Null => f.write_str("NULL"),
            Asn1Value::Boolean(b) => write!(f, "{}", b),
            Asn1Value::UtcTime(t) | Asn1Value::GeneralizedTime(t) => f.write_str(t.text()),
            Asn1Value::PrintableString(s)
            | Asn1Value::Utf8String(s)
            | Asn1Value::Ia5String(s)
            | Asn1Value::BmpString(s) => f.write_str(s),
            Asn1Value::OctetString(b) | Asn1Value::PublicKey(b) | Asn1Value::Other { bytes: b, .. } => {
                f.write_str(&dlms_core::helpers::to_hex(b, true))
            }
        }
    }
}

/// Arena holding every node of one or more ASN.1 trees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Asn1Tree {
    nodes: Vec<Asn1Node>,
}

impl Asn1Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, node: Asn1Node) -> NodeId {
        self.nodes.push(node);
        NodeId((self.nodes.len() - 1) as u32)
    }

    /// Node behind `id`; fails for a handle of another arena.
    pub fn node(&self, id: NodeId) -> DlmsResult<&Asn1Node> {
        self.nodes.get(id.index()).ok_or_else(|| {
            DlmsError::Asn1Decoding(format!(
                "node {} is outside a tree of {} nodes",
                id.index(),
                self.nodes.len()
            ))
        })
    }

    // ---------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------

    pub fn sequence(&mut self, children: Vec<NodeId>) -> NodeId {
        self.add(Asn1Node::Sequence(children))
    }

    pub fn set(&mut self, children: Vec<NodeId>) -> NodeId {
        self.add(Asn1Node::Set(children))
    }

    pub fn context(&mut self, index: u8, children: Vec<NodeId>) -> NodeId {
        self.add(Asn1Node::Tagged {
            class: BerTagClass::ContextSpecific,
            index,
            content: TaggedContent::Constructed(children),
        })
    }

    pub fn context_primitive(&mut self, index: u8, bytes: Vec<u8>) -> NodeId {
        self.add(Asn1Node::Tagged {
            class: BerTagClass::ContextSpecific,
            index,
            content: TaggedContent::Primitive(bytes),
        })
    }

    pub fn value(&mut self, value: Asn1Value) -> NodeId {
        self.add(Asn1Node::Value(value))
    }

    pub fn oid(&mut self, oid: Oid) -> NodeId {
        self.value(Asn1Value::ObjectIdentifier(oid))
    }

    pub fn integer(&mut self, value: i64) -> NodeId {
        self.value(Asn1Value::Integer(Asn1Integer::from_i64(value)))
    }

    pub fn null(&mut self) -> NodeId {
        self.value(Asn1Value::Null)
    }

    // ---------------------------------------------------------------
    // Typed access
    // ---------------------------------------------------------------

    fn unexpected(&self, id: NodeId, wanted: &str) -> DlmsError {
        DlmsError::Asn1Decoding(format!(
            "node {} is not {}: {:?}",
            id.index(),
            wanted,
            self.nodes.get(id.index())
        ))
    }

    /// Children of a constructed node, empty for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Ok(Asn1Node::Sequence(c) | Asn1Node::Set(c)) => c,
            Ok(Asn1Node::Tagged {
                content: TaggedContent::Constructed(c),
                ..
            }) => c,
            _ => &[],
        }
    }

    /// `n`th child, failing if absent.
    pub fn child(&self, id: NodeId, n: usize) -> DlmsResult<NodeId> {
        self.children(id)
            .get(n)
            .copied()
            .ok_or_else(|| self.unexpected(id, &format!("a node with {} children", n + 1)))
    }

    pub fn sequence_items(&self, id: NodeId) -> DlmsResult<&[NodeId]> {
        match self.node(id)? {
            Asn1Node::Sequence(c) => Ok(c),
            _ => Err(self.unexpected(id, "a SEQUENCE")),
        }
    }

    /// Key and optional value of a SET.
    pub fn key_value(&self, id: NodeId) -> DlmsResult<(NodeId, Option<NodeId>)> {
        match self.node(id)? {
            Asn1Node::Set(c) if !c.is_empty() => Ok((c[0], c.get(1).copied())),
            _ => Err(self.unexpected(id, "a SET")),
        }
    }

    /// Index of a context tag, if `id` is one.
    pub fn context_index(&self, id: NodeId) -> Option<u8> {
        match self.node(id).ok()? {
            Asn1Node::Tagged {
                class: BerTagClass::ContextSpecific,
                index,
                ..
            } => Some(*index),
            _ => None,
        }
    }

    pub fn leaf(&self, id: NodeId) -> DlmsResult<&Asn1Value> {
        match self.node(id)? {
            Asn1Node::Value(v) => Ok(v),
            _ => Err(self.unexpected(id, "a value")),
        }
    }

    pub fn as_oid(&self, id: NodeId) -> DlmsResult<&Oid> {
        match self.leaf(id)? {
            Asn1Value::ObjectIdentifier(o) => Ok(o),
            _ => Err(self.unexpected(id, "an OBJECT IDENTIFIER")),
        }
    }

    pub fn as_integer(&self, id: NodeId) -> DlmsResult<&Asn1Integer> {
        match self.leaf(id)? {
            Asn1Value::Integer(i) => Ok(i),
            _ => Err(self.unexpected(id, "an INTEGER")),
        }
    }

    pub fn as_bit_string(&self, id: NodeId) -> DlmsResult<&BitString> {
        match self.leaf(id)? {
            Asn1Value::BitString(b) => Ok(b),
            _ => Err(self.unexpected(id, "a BIT STRING")),
        }
    }

    pub fn as_octet_string(&self, id: NodeId) -> DlmsResult<&[u8]> {
        match self.leaf(id)? {
            Asn1Value::OctetString(b) => Ok(b),
            _ => Err(self.unexpected(id, "an OCTET STRING")),
        }
    }

    pub fn as_str(&self, id: NodeId) -> DlmsResult<&str> {
        self.leaf(id)?
            .as_str()
            .ok_or_else(|| self.unexpected(id, "a string"))
    }

    pub fn as_time(&self, id: NodeId) -> DlmsResult<&Asn1Time> {
        match self.leaf(id)? {
            Asn1Value::UtcTime(t) | Asn1Value::GeneralizedTime(t) => Ok(t),
            _ => Err(self.unexpected(id, "a time")),
        }
    }

    pub fn as_bool(&self, id: NodeId) -> DlmsResult<bool> {
        match self.leaf(id)? {
            Asn1Value::Boolean(b) => Ok(*b),
            _ => Err(self.unexpected(id, "a BOOLEAN")),
        }
    }

    /// Copy the subtree rooted at `id` in `other` into this arena.
    pub fn import(&mut self, other: &Asn1Tree, id: NodeId) -> DlmsResult<NodeId> {
        let node = match other.node(id)? {
            Asn1Node::Sequence(c) => Asn1Node::Sequence(self.import_all(other, c)?),
            Asn1Node::Set(c) => Asn1Node::Set(self.import_all(other, c)?),
            Asn1Node::Tagged {
                class,
                index,
                content,
            } => Asn1Node::Tagged {
                class: *class,
                index: *index,
                content: match content {
                    TaggedContent::Constructed(c) => {
                        TaggedContent::Constructed(self.import_all(other, c)?)
                    }
                    TaggedContent::Primitive(b) => TaggedContent::Primitive(b.clone()),
                },
            },
            Asn1Node::Value(v) => Asn1Node::Value(v.clone()),
        };
        Ok(self.add(node))
    }

    fn import_all(&mut self, other: &Asn1Tree, ids: &[NodeId]) -> DlmsResult<Vec<NodeId>> {
        ids.iter().map(|id| self.import(other, *id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_views() {
        assert_eq!(Asn1Integer::from_i64(0).as_bytes(), &[0]);
        assert_eq!(Asn1Integer::from_i64(128).as_bytes(), &[0x00, 0x80]);
        assert_eq!(Asn1Integer::from_i64(-129).as_bytes(), &[0xFF, 0x7F]);
        assert_eq!(Asn1Integer::from_bytes(vec![0xFF]).to_i8(), Some(-1));
        assert_eq!(Asn1Integer::from_bytes(vec![0x01, 0x00]).to_i16(), Some(256));
        assert_eq!(Asn1Integer::from_unsigned(&[0x00, 0x80, 0x01]).as_bytes(), &[0x00, 0x80, 0x01]);
        assert_eq!(Asn1Integer::from_unsigned(&[0x80, 0x01]).unsigned_bytes(), &[0x80, 0x01]);
        assert_eq!(Asn1Integer::from_bytes(vec![1; 9]).to_i64(), None);
    }

    #[test]
    fn test_utc_time() {
        let t = Asn1Time::parse_utc("240131120000Z").unwrap();
        assert_eq!(t.value().to_rfc3339(), "2024-01-31T12:00:00+00:00");
        let t = Asn1Time::parse_utc("9912312359+0200").unwrap();
        assert_eq!(t.value().to_rfc3339(), "1999-12-31T23:59:00+02:00");
        assert!(Asn1Time::parse_utc("2401311200Q").is_err());
    }

    #[test]
    fn test_generalized_time() {
        let t = Asn1Time::parse_generalized("20500101000000.5Z").unwrap();
        assert_eq!(t.value().timestamp_subsec_millis(), 500);
        assert_eq!(t.text(), "20500101000000.5Z");
        let t = Asn1Time::parse_generalized("20240101010203-0130").unwrap();
        assert_eq!(t.value().offset().local_minus_utc(), -5400);
    }

    #[test]
    fn test_builder_and_access() {
        let mut tree = Asn1Tree::new();
        let key = tree.oid("2.5.4.3".parse().unwrap());
        let value = tree.value(Asn1Value::Utf8String("x".into()));
        let set = tree.set(vec![key, value]);
        let seq = tree.sequence(vec![set]);
        let (k, v) = tree.key_value(tree.child(seq, 0).unwrap()).unwrap();
        assert_eq!(tree.as_oid(k).unwrap().to_string(), "2.5.4.3");
        assert_eq!(tree.as_str(v.unwrap()).unwrap(), "x");
        assert!(tree.child(seq, 1).is_err());
        assert!(tree.as_integer(k).is_err());

        let mut copy = Asn1Tree::new();
        let root = copy.import(&tree, seq).unwrap();
        assert_eq!(copy.len(), 4);
        assert_eq!(copy.children(root).len(), 1);
    }

    #[test]
    fn test_foreign_node_id() {
        let mut big = Asn1Tree::new();
        for _ in 0..5 {
            big.null();
        }
        let foreign = big.null();
        let mut small = Asn1Tree::new();
        small.null();
        assert!(matches!(small.node(foreign), Err(DlmsError::Asn1Decoding(_))));
        assert!(small.leaf(foreign).is_err());
        assert!(small.sequence_items(foreign).is_err());
        assert!(small.children(foreign).is_empty());
        assert_eq!(small.context_index(foreign), None);
        assert!(Asn1Tree::new().import(&small, foreign).is_err());
        assert!(crate::ber::encoder::BerEncoder::new().encode(&small, foreign).is_err());
    }
}
