//! Distinguished names as `KEY=value, KEY=value` text

use crate::ber::oid::{Oid, X509Name};
use crate::ber::tree::{Asn1Tree, Asn1Value, NodeId};
use crate::ber::types::tags;
use crate::error::{DlmsError, DlmsResult};

/// Split `CN=..., O=...` into attribute OIDs and values.
///
/// Keys are the short names of [`X509Name`] or dotted OIDs.
pub fn parse_subject(text: &str) -> DlmsResult<Vec<(Oid, String)>> {
    let mut attributes = Vec::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| DlmsError::InvalidData(format!("subject part '{}' has no '='", part)))?;
        let key = key.trim();
        let oid = match X509Name::from_name(key) {
            Some(name) => name.oid(),
            None => key
                .parse::<Oid>()
                .map_err(|_| DlmsError::UnknownEnum(format!("subject key '{}'", key)))?,
        };
        attributes.push((oid, value.trim().to_string()));
    }
    Ok(attributes)
}

/// Build `SEQUENCE OF SET { SEQUENCE { oid, value } }` for `text`.
pub fn encode_subject(tree: &mut Asn1Tree, text: &str) -> DlmsResult<NodeId> {
    let mut sets = Vec::new();
    for (oid, value) in parse_subject(text)? {
        let tag = X509Name::from_oid(&oid).map_or(tags::UTF8_STRING, X509Name::string_tag);
        let value = match tag {
            tags::PRINTABLE_STRING => Asn1Value::PrintableString(value),
            tags::IA5_STRING => Asn1Value::Ia5String(value),
            _ => Asn1Value::Utf8String(value),
        };
        let key = tree.oid(oid);
        let value = tree.value(value);
        let pair = tree.sequence(vec![key, value]);
        sets.push(tree.set(vec![pair]));
    }
    Ok(tree.sequence(sets))
}

/// Render a parsed name back to `KEY=value, ...` text.
///
/// Unknown attribute types are shown by their dotted OID.
pub fn subject_to_string(tree: &Asn1Tree, id: NodeId) -> DlmsResult<String> {
    let mut parts = Vec::new();
    for set in tree.sequence_items(id)? {
        for pair in tree.children(*set) {
            let oid = tree.as_oid(tree.child(*pair, 0)?)?;
            let value = tree.leaf(tree.child(*pair, 1)?)?;
            let key = X509Name::from_oid(oid)
                .map(|n| n.name().to_string())
                .unwrap_or_else(|| oid.to_string());
            parts.push(format!("{}={}", key, value));
        }
    }
    Ok(parts.join(", "))
}
