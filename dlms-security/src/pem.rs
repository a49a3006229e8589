//! PEM containers and recognition of the DER structures they carry

use crate::error::{DlmsError, DlmsResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dlms_asn1::ber::{Asn1Node, Asn1Tree, Asn1Value, BerLength, NodeId, parse};

pub const CERTIFICATE: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST: &str = "CERTIFICATE REQUEST";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";
pub const PUBLIC_KEY: &str = "PUBLIC KEY";

/// A decoded PEM block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pem {
    /// Text between `BEGIN ` and the closing dashes, empty for bare base64
    pub label: String,
    pub der: Vec<u8>,
}

/// Wrap `der` in `-----BEGIN label-----` banners, 64 characters per line.
pub fn encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for line in body.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Decode the first PEM block in `text`.
///
/// Text without banners is decoded as bare base64 with an empty label.
pub fn decode(text: &str) -> DlmsResult<Pem> {
    let (label, body) = match text.find("-----BEGIN ") {
        Some(start) => {
            let rest = &text[start + 11..];
            let label_end = rest
                .find("-----")
                .ok_or_else(|| DlmsError::InvalidData("unterminated PEM banner".to_string()))?;
            let label = rest[..label_end].trim().to_string();
            let rest = &rest[label_end + 5..];
            let end_banner = format!("-----END {}-----", label);
            let end = rest.find(&end_banner).ok_or_else(|| {
                DlmsError::InvalidData(format!("missing '{}'", end_banner))
            })?;
            (label, &rest[..end])
        }
        None => (String::new(), text),
    };
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DlmsError::InvalidData(format!("invalid base64: {}", e)))?;
    Ok(Pem { label, der })
}

/// Decode `text` and check its banner against `expected`.
///
/// A banner naming another known structure fails with the error
/// [`expect_kind`] gives for it.
pub fn decode_as(text: &str, expected: DerKind) -> DlmsResult<Vec<u8>> {
    let pem = decode(text)?;
    let kind = match pem.label.as_str() {
        CERTIFICATE => Some(DerKind::X509),
        CERTIFICATE_REQUEST => Some(DerKind::Pkcs10),
        PRIVATE_KEY => Some(DerKind::Pkcs8),
        EC_PRIVATE_KEY => Some(DerKind::EcPrivateKey),
        PUBLIC_KEY => Some(DerKind::PublicKey),
        _ => None,
    };
    if let Some(kind) = kind {
        expect_kind(kind, expected)?;
    }
    Ok(pem.der)
}

/// The DER structures this crate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerKind {
    X509,
    Pkcs8,
    Pkcs10,
    EcPrivateKey,
    PublicKey,
    Unknown,
}

impl DerKind {
    pub fn name(&self) -> &'static str {
        match self {
            DerKind::X509 => "an X.509 certificate",
            DerKind::Pkcs8 => "a PKCS #8 private key",
            DerKind::Pkcs10 => "a PKCS #10 certificate request",
            DerKind::EcPrivateKey => "an EC private key",
            DerKind::PublicKey => "a public key",
            DerKind::Unknown => "an unknown structure",
        }
    }

    /// Recognize a parsed structure by its shape.
    pub fn of(tree: &Asn1Tree, root: NodeId) -> Self {
        let items = match tree.sequence_items(root) {
            Ok(items) => items,
            Err(_) => return DerKind::Unknown,
        };
        let is_seq = |id: NodeId| matches!(tree.node(id), Ok(Asn1Node::Sequence(_)));
        let is_int = |id: NodeId, v: i64| {
            tree.as_integer(id).ok().and_then(|i| i.to_i64()) == Some(v)
        };
        match items {
            [first, alg, key] if is_int(*first, 0) && is_seq(*alg) => {
                if matches!(tree.leaf(*key), Ok(Asn1Value::OctetString(_))) {
                    DerKind::Pkcs8
                } else {
                    DerKind::Unknown
                }
            }
            [first, d, ..] if is_int(*first, 1) => {
                if matches!(tree.leaf(*d), Ok(Asn1Value::OctetString(_))) {
                    DerKind::EcPrivateKey
                } else {
                    DerKind::Unknown
                }
            }
            [alg, key] if is_seq(*alg) && matches!(tree.leaf(*key), Ok(Asn1Value::BitString(_))) => {
                DerKind::PublicKey
            }
            [info, alg, _signature] if is_seq(*info) && is_seq(*alg) => {
                match tree.children(*info).first() {
                    Some(first) if tree.context_index(*first) == Some(0) => DerKind::X509,
                    Some(first) if is_int(*first, 0) => {
                        // v1 certificates have no [0] version; a request has
                        // its subject right after the version.
                        match tree.children(*info).get(1) {
                            Some(subject) if is_seq(*subject) => DerKind::Pkcs10,
                            _ => DerKind::X509,
                        }
                    }
                    Some(_) => DerKind::X509,
                    None => DerKind::Unknown,
                }
            }
            _ => DerKind::Unknown,
        }
    }

    /// Recognize raw DER.
    pub fn of_der(der: &[u8]) -> Self {
        match parse(der) {
            Ok((tree, root)) => Self::of(&tree, root),
            Err(_) => DerKind::Unknown,
        }
    }
}

/// Fail when `found` is a known structure other than `expected`.
pub fn expect_kind(found: DerKind, expected: DerKind) -> DlmsResult<()> {
    if found == expected || found == DerKind::Unknown {
        return Ok(());
    }
    let message = format!("this is {}, not {}", found.name(), expected.name());
    Err(match expected {
        DerKind::X509 => DlmsError::InvalidCertificate(message),
        _ => DlmsError::InvalidData(message),
    })
}

/// Bytes of the first element of the outer SEQUENCE: the signed part of
/// a certificate or a certificate request.
pub(crate) fn signed_part(der: &[u8]) -> DlmsResult<&[u8]> {
    let (_, outer) = BerLength::decode(der, 1)?;
    let start = 1 + outer;
    let (len, used) = BerLength::decode(der, start + 1)?;
    let end = start + 1 + used + len;
    der.get(start..end)
        .ok_or_else(|| DlmsError::malformed(start, "signed part exceeds the data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_round_trip() {
        let der: Vec<u8> = (0..=200u8).collect();
        let text = encode(CERTIFICATE, &der);
        assert!(text.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(text.ends_with("-----END CERTIFICATE-----\n"));
        assert!(text.lines().all(|l| l.len() <= 64));
        let pem = decode(&text).unwrap();
        assert_eq!(pem.label, CERTIFICATE);
        assert_eq!(pem.der, der);
    }

    #[test]
    fn test_bare_base64() {
        let pem = decode("AAEC\nAw==").unwrap();
        assert_eq!(pem.label, "");
        assert_eq!(pem.der, vec![0, 1, 2, 3]);
        assert!(decode("-----BEGIN X-----\nAAEC\n").is_err());
        assert!(decode("!!!!").is_err());
    }

    #[test]
    fn test_signed_part() {
        let der = [0x30, 0x07, 0x30, 0x02, 0x05, 0x00, 0x05, 0x00, 0x00];
        assert_eq!(signed_part(&der).unwrap(), &[0x30, 0x02, 0x05, 0x00]);
        assert!(signed_part(&[0x30, 0x02, 0x30, 0x05]).is_err());
    }

    #[test]
    fn test_wrong_banner() {
        let text = encode(PRIVATE_KEY, &[0x30, 0x00]);
        let err = decode_as(&text, DerKind::X509).unwrap_err();
        assert!(matches!(err, DlmsError::InvalidCertificate(_)));
        assert!(decode_as(&text, DerKind::Pkcs8).is_ok());
    }
}
