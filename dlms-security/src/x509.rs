//! X.509 v3 certificates for DLMS devices
//!
//! Only ECDSA with SHA-256 or SHA-384 over P-256/P-384 keys is accepted.
//! On load a certificate must satisfy the DLMS profile:
//! - `keyUsage` is present
//! - `basicConstraints` is present when the key signs certificates or CRLs
//! - `extKeyUsage` is present exactly for TLS keys (digitalSignature + keyAgreement)
//! - the subject of an end entity is `CN=<system title in hex>`

use crate::ecdsa::{Ecdsa, signature_from_der};
use crate::error::{DlmsError, DlmsResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::pem::{self, DerKind, signed_part};
use crate::pkcs10::{algorithm_tree, sign_structure, signature_algorithm, signature_curve};
use crate::suite::{CertificateType, ExtendedKeyUsage, KeyUsage};
use crate::system_title::SystemTitle;
use chrono::{DateTime, Datelike, FixedOffset};
use dlms_asn1::ber::{
    Asn1Integer, Asn1Node, Asn1Time, Asn1Tree, Asn1Value, KeyPurpose, NodeId, TaggedContent,
    X509Extension, X9ObjectIdentifier, encode, encode_subject, parse, subject_to_string,
};
use dlms_core::datatypes::BitString;
use log::{debug, warn};
use num_bigint::BigUint;

/// `basicConstraints` extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_len: Option<i64>,
}

/// `authorityKeyIdentifier` extension
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorityKeyIdentifier {
    pub key_identifier: Option<Vec<u8>>,
    /// Issuer directory name
    pub issuer: Option<String>,
    pub serial_number: Option<Vec<u8>>,
}

/// A parsed, validated certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Certificate {
    version: u8,
    serial_number: BigUint,
    signature_algorithm: X9ObjectIdentifier,
    issuer: String,
    valid_from: DateTime<FixedOffset>,
    valid_to: DateTime<FixedOffset>,
    subject: String,
    public_key: PublicKey,
    subject_key_identifier: Option<Vec<u8>>,
    authority_key_identifier: Option<AuthorityKeyIdentifier>,
    subject_alternative_name: Vec<String>,
    basic_constraints: Option<BasicConstraints>,
    key_usage: Option<KeyUsage>,
    extended_key_usage: Option<ExtendedKeyUsage>,
    /// Raw `r || s`
    signature: Vec<u8>,
    encoded: Vec<u8>,
}

/// Text of the primitive general names (`rfc822Name`, `dNSName`, `URI`).
fn general_names(tree: &Asn1Tree, id: NodeId) -> Vec<String> {
    tree.children(id)
        .iter()
        .filter_map(|name| match tree.node(*name) {
            Ok(Asn1Node::Tagged {
                content: TaggedContent::Primitive(bytes),
                ..
            }) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect()
}

fn primitive_bytes(tree: &Asn1Tree, id: NodeId) -> Option<Vec<u8>> {
    match tree.node(id) {
        Ok(Asn1Node::Tagged {
            content: TaggedContent::Primitive(bytes),
            ..
        }) => Some(bytes.clone()),
        _ => None,
    }
}

impl X509Certificate {
    /// Parse and validate DER.
    pub fn from_der(der: &[u8]) -> DlmsResult<Self> {
        let (tree, root) = parse(der)?;
        pem::expect_kind(DerKind::of(&tree, root), DerKind::X509)?;
        let tbs = tree.child(root, 0)?;
        let items = tree.sequence_items(tbs)?;
        let mut pos = 0;
        let mut version = 0u8;
        if let Some(first) = items.first() {
            if tree.context_index(*first) == Some(0) {
                version = tree
                    .as_integer(tree.child(*first, 0)?)?
                    .to_i64()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| DlmsError::InvalidCertificate("bad version".to_string()))?;
                pos = 1;
            }
        }
        let field = |n: usize| {
            items.get(pos + n).copied().ok_or_else(|| {
                DlmsError::InvalidCertificate("tbsCertificate is truncated".to_string())
            })
        };
        let serial = tree.as_integer(field(0)?)?;
        let serial_number = BigUint::from_bytes_be(serial.unsigned_bytes());
        let inner_alg = tree.as_oid(tree.child(field(1)?, 0)?)?.clone();
        let issuer = subject_to_string(&tree, field(2)?)?;
        let validity = field(3)?;
        let valid_from = tree.as_time(tree.child(validity, 0)?)?.value();
        let valid_to = tree.as_time(tree.child(validity, 1)?)?.value();
        let subject = subject_to_string(&tree, field(4)?)?;
        let public_key = PublicKey::from_spki_tree(&tree, field(5)?)?;

        let outer_alg = tree.as_oid(tree.child(tree.child(root, 1)?, 0)?)?;
        if outer_alg != &inner_alg {
            return Err(DlmsError::InvalidCertificate(
                "signature algorithms of the certificate and tbsCertificate differ".to_string(),
            ));
        }
        let curve = signature_curve(outer_alg)?;
        let signature = signature_from_der(tree.as_bit_string(tree.child(root, 2)?)?.as_bytes(), curve)?;

        let mut certificate = Self {
            version,
            serial_number,
            signature_algorithm: signature_algorithm(curve),
            issuer,
            valid_from,
            valid_to,
            subject,
            public_key,
            subject_key_identifier: None,
            authority_key_identifier: None,
            subject_alternative_name: Vec::new(),
            basic_constraints: None,
            key_usage: None,
            extended_key_usage: None,
            signature,
            encoded: der.to_vec(),
        };
        for item in &items[pos + 6..] {
            if tree.context_index(*item) == Some(3) {
                for extension in tree.sequence_items(tree.child(*item, 0)?)? {
                    certificate.read_extension(&tree, *extension)?;
                }
            }
        }
        certificate.validate()?;
        debug!(
            "Loaded certificate '{}' issued by '{}'",
            certificate.subject, certificate.issuer
        );
        Ok(certificate)
    }

    fn read_extension(&mut self, tree: &Asn1Tree, extension: NodeId) -> DlmsResult<()> {
        let children = tree.children(extension);
        let oid = tree.as_oid(tree.child(extension, 0)?)?;
        let value = children
            .last()
            .copied()
            .ok_or_else(|| DlmsError::InvalidCertificate("empty extension".to_string()))?;
        let (ext, ext_root) = parse(tree.as_octet_string(value)?)?;
        match X509Extension::from_oid(oid) {
            Some(X509Extension::SubjectKeyIdentifier) => {
                self.subject_key_identifier = Some(ext.as_octet_string(ext_root)?.to_vec());
            }
            Some(X509Extension::AuthorityKeyIdentifier) => {
                let mut aki = AuthorityKeyIdentifier::default();
                for part in ext.sequence_items(ext_root)? {
                    match ext.context_index(*part) {
                        Some(0) => aki.key_identifier = primitive_bytes(&ext, *part),
                        Some(1) => {
                            // [4] directoryName
                            if let Some(name) = ext.children(*part).first() {
                                let name = ext.child(*name, 0)?;
                                aki.issuer = Some(subject_to_string(&ext, name)?);
                            }
                        }
                        Some(2) => aki.serial_number = primitive_bytes(&ext, *part),
                        _ => {}
                    }
                }
                self.authority_key_identifier = Some(aki);
            }
            Some(X509Extension::SubjectAlternativeName) => {
                self.subject_alternative_name = general_names(&ext, ext_root);
            }
            Some(X509Extension::BasicConstraints) => {
                let mut constraints = BasicConstraints::default();
                for part in ext.sequence_items(ext_root)? {
                    match ext.leaf(*part)? {
                        Asn1Value::Boolean(ca) => constraints.ca = *ca,
                        Asn1Value::Integer(len) => constraints.path_len = len.to_i64(),
                        _ => {}
                    }
                }
                self.basic_constraints = Some(constraints);
            }
            Some(X509Extension::KeyUsage) => {
                let bits = ext.as_bit_string(ext_root)?.to_integer();
                self.key_usage = Some(KeyUsage::from_bits_truncate(bits as u16));
            }
            Some(X509Extension::ExtendedKeyUsage) => {
                let mut usage = ExtendedKeyUsage::empty();
                for purpose in ext.sequence_items(ext_root)? {
                    match KeyPurpose::from_oid(ext.as_oid(*purpose)?) {
                        Some(KeyPurpose::ServerAuth) => usage |= ExtendedKeyUsage::SERVER_AUTH,
                        Some(KeyPurpose::ClientAuth) => usage |= ExtendedKeyUsage::CLIENT_AUTH,
                        None => {}
                    }
                }
                self.extended_key_usage = Some(usage);
            }
            None => debug!("Skipping certificate extension {}", oid),
        }
        Ok(())
    }

    /// Check the DLMS certificate profile.
    pub fn validate(&self) -> DlmsResult<()> {
        let usage = self
            .key_usage
            .ok_or_else(|| DlmsError::InvalidCertificate("key usage is missing".to_string()))?;
        if usage.intersects(KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN)
            && self.basic_constraints.is_none()
        {
            return Err(DlmsError::InvalidCertificate(
                "basic constraints are missing from a signing certificate".to_string(),
            ));
        }
        let tls = usage == KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT;
        if tls != self.extended_key_usage.is_some() {
            return Err(DlmsError::InvalidCertificate(if tls {
                "extended key usage is missing from a TLS certificate".to_string()
            } else {
                "extended key usage is only allowed for TLS certificates".to_string()
            }));
        }
        if self.basic_constraints.is_none() && SystemTitle::from_subject(&self.subject).is_err() {
            return Err(DlmsError::InvalidCertificate(format!(
                "subject '{}' does not name a system title",
                self.subject
            )));
        }
        Ok(())
    }

    /// Whether the signature verifies under `issuer_key`.
    pub fn is_certified_by(&self, issuer_key: &PublicKey) -> DlmsResult<bool> {
        if signature_algorithm(issuer_key.curve()) != self.signature_algorithm {
            warn!(
                "{} certificate checked with a {:?} key",
                self.signature_algorithm,
                issuer_key.curve()
            );
            return Ok(false);
        }
        Ecdsa::verify(issuer_key, signed_part(&self.encoded)?, &self.signature)
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.encoded.clone()
    }

    pub fn from_pem(text: &str) -> DlmsResult<Self> {
        Self::from_der(&pem::decode_as(text, DerKind::X509)?)
    }

    pub fn to_pem(&self) -> String {
        pem::encode(pem::CERTIFICATE, &self.encoded)
    }

    /// X.509 version field: 2 for v3
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn serial_number(&self) -> &BigUint {
        &self.serial_number
    }

    pub fn signature_algorithm(&self) -> X9ObjectIdentifier {
        self.signature_algorithm
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn valid_from(&self) -> DateTime<FixedOffset> {
        self.valid_from
    }

    pub fn valid_to(&self) -> DateTime<FixedOffset> {
        self.valid_to
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn subject_key_identifier(&self) -> Option<&[u8]> {
        self.subject_key_identifier.as_deref()
    }

    pub fn authority_key_identifier(&self) -> Option<&AuthorityKeyIdentifier> {
        self.authority_key_identifier.as_ref()
    }

    pub fn subject_alternative_name(&self) -> &[String] {
        &self.subject_alternative_name
    }

    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        self.basic_constraints
    }

    pub fn key_usage(&self) -> KeyUsage {
        self.key_usage.unwrap_or_default()
    }

    pub fn extended_key_usage(&self) -> Option<ExtendedKeyUsage> {
        self.extended_key_usage
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn certificate_type(&self) -> CertificateType {
        CertificateType::from_key_usage(self.key_usage())
    }

    /// System title named by the subject, for end entity certificates
    pub fn system_title(&self) -> Option<SystemTitle> {
        SystemTitle::from_subject(&self.subject).ok()
    }

    /// Whether `at` lies inside the validity period.
    pub fn is_valid_at(&self, at: DateTime<FixedOffset>) -> bool {
        self.valid_from <= at && at <= self.valid_to
    }
}

/// Composes and signs a certificate
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    serial_number: BigUint,
    issuer: String,
    subject: String,
    valid_from: DateTime<FixedOffset>,
    valid_to: DateTime<FixedOffset>,
    public_key: PublicKey,
    key_usage: KeyUsage,
    extended_key_usage: Option<ExtendedKeyUsage>,
    basic_constraints: Option<BasicConstraints>,
    subject_key_identifier: Option<Vec<u8>>,
    authority_key_identifier: Option<AuthorityKeyIdentifier>,
    subject_alternative_name: Vec<String>,
}

impl CertificateBuilder {
    /// Self issued by default: the issuer equals `subject`.
    pub fn new(
        subject: &str,
        public_key: PublicKey,
        valid_from: DateTime<FixedOffset>,
        valid_to: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            serial_number: BigUint::from(1u32),
            issuer: subject.to_string(),
            subject: subject.to_string(),
            valid_from,
            valid_to,
            public_key,
            key_usage: KeyUsage::DIGITAL_SIGNATURE,
            extended_key_usage: None,
            basic_constraints: None,
            subject_key_identifier: None,
            authority_key_identifier: None,
            subject_alternative_name: Vec::new(),
        }
    }

    pub fn serial_number(mut self, serial_number: BigUint) -> Self {
        self.serial_number = serial_number;
        self
    }

    pub fn issuer(mut self, issuer: &str) -> Self {
        self.issuer = issuer.to_string();
        self
    }

    pub fn key_usage(mut self, key_usage: KeyUsage) -> Self {
        self.key_usage = key_usage;
        self
    }

    pub fn extended_key_usage(mut self, usage: ExtendedKeyUsage) -> Self {
        self.extended_key_usage = Some(usage);
        self
    }

    pub fn basic_constraints(mut self, constraints: BasicConstraints) -> Self {
        self.basic_constraints = Some(constraints);
        self
    }

    pub fn subject_key_identifier(mut self, id: Vec<u8>) -> Self {
        self.subject_key_identifier = Some(id);
        self
    }

    pub fn authority_key_identifier(mut self, aki: AuthorityKeyIdentifier) -> Self {
        self.authority_key_identifier = Some(aki);
        self
    }

    pub fn subject_alternative_name(mut self, name: &str) -> Self {
        self.subject_alternative_name.push(name.to_string());
        self
    }

    fn time(tree: &mut Asn1Tree, at: DateTime<FixedOffset>) -> NodeId {
        // UTCTime up to 2049
        if at.year() < 2050 {
            tree.value(Asn1Value::UtcTime(Asn1Time::utc(at)))
        } else {
            tree.value(Asn1Value::GeneralizedTime(Asn1Time::generalized(at)))
        }
    }

    fn extension(
        tree: &mut Asn1Tree,
        id: X509Extension,
        critical: bool,
        value: &Asn1Tree,
        value_root: NodeId,
    ) -> DlmsResult<NodeId> {
        let oid = tree.oid(id.oid());
        let mut items = vec![oid];
        if critical {
            items.push(tree.value(Asn1Value::Boolean(true)));
        }
        let der = encode(value, value_root)?;
        items.push(tree.value(Asn1Value::OctetString(der)));
        Ok(tree.sequence(items))
    }

    fn extensions(&self, tree: &mut Asn1Tree) -> DlmsResult<Vec<NodeId>> {
        let mut out = Vec::new();
        if let Some(ski) = &self.subject_key_identifier {
            let mut v = Asn1Tree::new();
            let root = v.value(Asn1Value::OctetString(ski.clone()));
            out.push(Self::extension(tree, X509Extension::SubjectKeyIdentifier, false, &v, root)?);
        }
        if let Some(aki) = &self.authority_key_identifier {
            let mut v = Asn1Tree::new();
            let mut parts = Vec::new();
            if let Some(id) = &aki.key_identifier {
                parts.push(v.context_primitive(0, id.clone()));
            }
            if let Some(issuer) = &aki.issuer {
                let name = encode_subject(&mut v, issuer)?;
                let directory = v.context(4, vec![name]);
                parts.push(v.context(1, vec![directory]));
            }
            if let Some(serial) = &aki.serial_number {
                parts.push(v.context_primitive(2, serial.clone()));
            }
            let root = v.sequence(parts);
            out.push(Self::extension(tree, X509Extension::AuthorityKeyIdentifier, false, &v, root)?);
        }
        if !self.subject_alternative_name.is_empty() {
            let mut v = Asn1Tree::new();
            let names = self
                .subject_alternative_name
                .iter()
                .map(|n| v.context_primitive(2, n.as_bytes().to_vec()))
                .collect();
            let root = v.sequence(names);
            out.push(Self::extension(tree, X509Extension::SubjectAlternativeName, false, &v, root)?);
        }
        if let Some(constraints) = self.basic_constraints {
            let mut v = Asn1Tree::new();
            let mut parts = Vec::new();
            // DER leaves out cA when it has its default FALSE.
            if constraints.ca {
                parts.push(v.value(Asn1Value::Boolean(true)));
            }
            if let Some(len) = constraints.path_len {
                parts.push(v.integer(len));
            }
            let root = v.sequence(parts);
            out.push(Self::extension(tree, X509Extension::BasicConstraints, true, &v, root)?);
        }
        let mut v = Asn1Tree::new();
        let root = v.value(Asn1Value::BitString(BitString::from_integer(u64::from(
            self.key_usage.bits(),
        ))));
        out.push(Self::extension(tree, X509Extension::KeyUsage, true, &v, root)?);
        if let Some(usage) = self.extended_key_usage {
            let mut v = Asn1Tree::new();
            let mut purposes = Vec::new();
            if usage.contains(ExtendedKeyUsage::SERVER_AUTH) {
                purposes.push(v.oid(KeyPurpose::ServerAuth.oid()));
            }
            if usage.contains(ExtendedKeyUsage::CLIENT_AUTH) {
                purposes.push(v.oid(KeyPurpose::ClientAuth.oid()));
            }
            let root = v.sequence(purposes);
            out.push(Self::extension(tree, X509Extension::ExtendedKeyUsage, false, &v, root)?);
        }
        Ok(out)
    }

    /// Sign with the issuer's key and validate the result.
    pub fn sign(&self, issuer_key: &PrivateKey) -> DlmsResult<X509Certificate> {
        let mut tree = Asn1Tree::new();
        let version = tree.integer(2);
        let version = tree.context(0, vec![version]);
        let serial = tree.value(Asn1Value::Integer(Asn1Integer::from_unsigned(
            &self.serial_number.to_bytes_be(),
        )));
        let algorithm = algorithm_tree(&mut tree, signature_algorithm(issuer_key.curve()));
        let issuer = encode_subject(&mut tree, &self.issuer)?;
        let from = Self::time(&mut tree, self.valid_from);
        let to = Self::time(&mut tree, self.valid_to);
        let validity = tree.sequence(vec![from, to]);
        let subject = encode_subject(&mut tree, &self.subject)?;
        let spki = self.public_key.spki_tree(&mut tree);
        let extensions = self.extensions(&mut tree)?;
        let extensions = tree.sequence(extensions);
        let extensions = tree.context(3, vec![extensions]);
        let tbs = tree.sequence(vec![
            version, serial, algorithm, issuer, validity, subject, spki, extensions,
        ]);
        let (der, _) = sign_structure(&encode(&tree, tbs)?, issuer_key)?;
        X509Certificate::from_der(&der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::EccCurve;
    use chrono::TimeZone;

    fn at(year: i32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .unwrap()
    }

    fn ca() -> (PrivateKey, X509Certificate) {
        let (key, public_key) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let certificate = CertificateBuilder::new("CN=Test CA, O=Metering", public_key, at(2024), at(2054))
            .key_usage(KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN)
            .basic_constraints(BasicConstraints { ca: true, path_len: Some(0) })
            .subject_key_identifier(vec![1, 2, 3, 4])
            .sign(&key)
            .unwrap();
        (key, certificate)
    }

    #[test]
    fn test_device_certificate() {
        let (ca_key, ca_certificate) = ca();
        let (_, device_key) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let certificate = CertificateBuilder::new("CN=4D4D4D0000BC614E", device_key.clone(), at(2024), at(2034))
            .issuer(ca_certificate.subject())
            .serial_number(BigUint::from(0x1234u32))
            .authority_key_identifier(AuthorityKeyIdentifier {
                key_identifier: Some(vec![1, 2, 3, 4]),
                issuer: Some("CN=Test CA, O=Metering".to_string()),
                serial_number: Some(vec![1]),
            })
            .sign(&ca_key)
            .unwrap();
        assert_eq!(certificate.version(), 2);
        assert_eq!(certificate.serial_number(), &BigUint::from(0x1234u32));
        assert_eq!(certificate.issuer(), "CN=Test CA, O=Metering");
        assert_eq!(certificate.public_key(), &device_key);
        assert_eq!(certificate.certificate_type(), CertificateType::DigitalSignature);
        assert_eq!(
            certificate.system_title().unwrap().as_slice(),
            &[0x4D, 0x4D, 0x4D, 0x00, 0x00, 0xBC, 0x61, 0x4E]
        );
        let aki = certificate.authority_key_identifier().unwrap();
        assert_eq!(aki.issuer.as_deref(), Some("CN=Test CA, O=Metering"));
        assert_eq!(aki.key_identifier.as_deref(), Some(&[1u8, 2, 3, 4][..]));
        assert!(certificate.is_certified_by(ca_certificate.public_key()).unwrap());
        assert!(!certificate.is_certified_by(&device_key).unwrap());
        assert!(certificate.is_valid_at(at(2030)));
        assert!(!certificate.is_valid_at(at(2040)));
    }

    #[test]
    fn test_ca_round_trip() {
        let (_, certificate) = ca();
        assert_eq!(certificate.basic_constraints(), Some(BasicConstraints { ca: true, path_len: Some(0) }));
        assert_eq!(certificate.valid_to(), at(2054));
        assert_eq!(certificate.subject_key_identifier(), Some(&[1u8, 2, 3, 4][..]));
        let again = X509Certificate::from_der(&certificate.to_der()).unwrap();
        assert_eq!(again, certificate);
        let text = certificate.to_pem();
        assert_eq!(X509Certificate::from_pem(&text).unwrap(), certificate);
        assert!(certificate.is_certified_by(certificate.public_key()).unwrap());
    }

    #[test]
    fn test_profile_violations() {
        let (key, public_key) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let builder = CertificateBuilder::new("CN=4D4D4D0000BC614E", public_key, at(2024), at(2034));
        // Certificate signing without basic constraints.
        let err = builder.clone().key_usage(KeyUsage::KEY_CERT_SIGN).sign(&key).unwrap_err();
        assert!(matches!(err, DlmsError::InvalidCertificate(_)));
        // TLS without extended key usage.
        let tls = KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT;
        assert!(builder.clone().key_usage(tls).sign(&key).is_err());
        let certificate = builder
            .clone()
            .key_usage(tls)
            .extended_key_usage(ExtendedKeyUsage::SERVER_AUTH | ExtendedKeyUsage::CLIENT_AUTH)
            .subject_alternative_name("meter.example")
            .sign(&key)
            .unwrap();
        assert_eq!(certificate.certificate_type(), CertificateType::Tls);
        assert_eq!(certificate.subject_alternative_name(), &["meter.example".to_string()]);
        // Extended key usage on a signing key.
        assert!(builder
            .clone()
            .extended_key_usage(ExtendedKeyUsage::SERVER_AUTH)
            .sign(&key)
            .is_err());
        // End entity without a system title.
        let (key, public_key) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let other = CertificateBuilder::new("CN=meter", public_key, at(2024), at(2034));
        assert!(other.sign(&key).is_err());
    }

    #[test]
    fn test_other_structures_are_refused() {
        let (key, _) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let err = X509Certificate::from_der(&key.to_der().unwrap()).unwrap_err();
        assert_eq!(
            err,
            DlmsError::InvalidCertificate(
                "this is a PKCS #8 private key, not an X.509 certificate".to_string()
            )
        );
        let request = crate::pkcs10::Pkcs10::create_certificate_request(&key, "CN=4D4D4D0000BC614E").unwrap();
        let err = X509Certificate::from_der(&request.to_der()).unwrap_err();
        assert!(matches!(err, DlmsError::InvalidCertificate(m) if m.contains("PKCS #10")));
    }

    #[test]
    fn test_p384_issuer() {
        let (ca_key, _) = Ecdsa::generate_key_pair(EccCurve::P384).unwrap();
        let (_, device_key) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let certificate = CertificateBuilder::new("CN=4D4D4D0000BC614E", device_key, at(2024), at(2060))
            .issuer("CN=Root")
            .sign(&ca_key)
            .unwrap();
        assert_eq!(certificate.signature_algorithm(), X9ObjectIdentifier::EcdsaWithSha384);
        assert_eq!(certificate.valid_to(), at(2060));
        assert!(certificate.is_certified_by(&ca_key.public_key().unwrap()).unwrap());
    }

    #[test]
    fn test_python_certificate() {
        use base64::Engine as _;
        use base64::engine::general_purpose::STANDARD;
        let der = STANDARD.decode(PYTHON_CERTIFICATE).unwrap();
        let certificate = X509Certificate::from_der(&der).unwrap();
        assert_eq!(certificate.subject(), "CN=4D4D4D0000BC614E");
        assert_eq!(certificate.issuer(), "CN=Test CA");
        assert_eq!(certificate.to_der(), der);
        assert_eq!(certificate.key_usage(), KeyUsage::DIGITAL_SIGNATURE);
        assert_eq!(certificate.basic_constraints(), Some(BasicConstraints::default()));
        assert_eq!(certificate.serial_number(), &BigUint::from(0x5A5Au32));
        let issuer = PublicKey::from_raw(&dlms_core::helpers::hex_to_bytes(PYTHON_ISSUER_KEY).unwrap()).unwrap();
        assert!(certificate.is_certified_by(&issuer).unwrap());
        assert!(!certificate.is_certified_by(certificate.public_key()).unwrap());
    }

    const PYTHON_CERTIFICATE: &str = "MIIBPTCB46ADAgECAgJaWjAKBggqhkjOPQQDAjASMRAwDgYDVQQDDAdUZXN0IENBMB4XDTI0MDEwMTAwMDAwMFoXDTM0MDEwMTAwMDAwMFowGzEZMBcGA1UEAwwQNEQ0RDREMDAwMEJDNjE0RTBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABJ7xEcCx5ubZ7wDGa7vJ+UhQyRXBziJSCBDd92e7iTsw/pV7EfNvnj3TBDYwYwv6N2JfGjIcu1SNyGrOqeY55BqjIDAeMA4GA1UdDwEB/wQEAwIHgDAMBgNVHRMBAf8EAjAAMAoGCCqGSM49BAMCA0kAMEYCIQCRS0FlU7GIBDkrMjlTOacr5SLQof6z1kRF82Cn5xNgTwIhAO/aAVx3cnDn08lnJrZuYABiqyNx5O65KLiTuzW4CgDH";

    const PYTHON_ISSUER_KEY: &str = "044CA4B83002EE1D798746C41AB22534267A877AF1667F9D536D90CCFC584DDA4C2D8D08EC5FA2165935F5655D1FB1CDA8F20031FC411954062C40576D53ED7642";
}
