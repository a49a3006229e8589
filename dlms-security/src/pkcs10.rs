//! PKCS #10 certificate requests (RFC 2986)

use crate::ecc::EccCurve;
use crate::ecdsa::{Ecdsa, signature_from_der, signature_to_der};
use crate::error::{DlmsError, DlmsResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::pem::{self, DerKind, signed_part};
use dlms_asn1::ber::{
    Asn1Tree, Asn1Value, NodeId, Oid, X9ObjectIdentifier, encode, encode_subject, parse,
    subject_to_string,
};
use dlms_core::datatypes::BitString;
use log::{debug, warn};

/// Signature algorithm matching the curve of a signing key
pub(crate) fn signature_algorithm(curve: EccCurve) -> X9ObjectIdentifier {
    match curve {
        EccCurve::P256 => X9ObjectIdentifier::EcdsaWithSha256,
        EccCurve::P384 => X9ObjectIdentifier::EcdsaWithSha384,
    }
}

/// Curve a signature algorithm hashes for
pub(crate) fn signature_curve(oid: &Oid) -> DlmsResult<EccCurve> {
    match X9ObjectIdentifier::from_oid(oid) {
        Some(X9ObjectIdentifier::EcdsaWithSha256) => Ok(EccCurve::P256),
        Some(X9ObjectIdentifier::EcdsaWithSha384) => Ok(EccCurve::P384),
        _ => Err(DlmsError::UnsupportedScheme(format!("signature algorithm {}", oid))),
    }
}

/// `AlgorithmIdentifier` of an ECDSA signature, without parameters
pub(crate) fn algorithm_tree(tree: &mut Asn1Tree, algorithm: X9ObjectIdentifier) -> NodeId {
    let oid = tree.oid(algorithm.oid());
    tree.sequence(vec![oid])
}

/// `SEQUENCE { info, algorithm, BIT STRING signature }` around signed `info` DER.
pub(crate) fn sign_structure(info_der: &[u8], key: &PrivateKey) -> DlmsResult<(Vec<u8>, Vec<u8>)> {
    let signature = Ecdsa::sign(key, info_der)?;
    let (info_tree, info_root) = parse(info_der)?;
    let mut tree = Asn1Tree::new();
    let info = tree.import(&info_tree, info_root)?;
    let algorithm = algorithm_tree(&mut tree, signature_algorithm(key.curve()));
    let bits = tree.value(Asn1Value::BitString(BitString::from_padded(
        0,
        signature_to_der(&signature)?,
    )?));
    let root = tree.sequence(vec![info, algorithm, bits]);
    Ok((encode(&tree, root)?, signature))
}

/// Certificate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkcs10 {
    version: u8,
    subject: String,
    public_key: PublicKey,
    algorithm: X9ObjectIdentifier,
    /// Raw `r || s`
    signature: Vec<u8>,
    /// DER of each request attribute
    attributes: Vec<Vec<u8>>,
    encoded: Vec<u8>,
}

impl Pkcs10 {
    /// Build and sign a request for the public key of `key`.
    pub fn create_certificate_request(key: &PrivateKey, subject: &str) -> DlmsResult<Self> {
        let public_key = key.public_key()?;
        let mut tree = Asn1Tree::new();
        let version = tree.integer(0);
        let name = encode_subject(&mut tree, subject)?;
        let spki = public_key.spki_tree(&mut tree);
        let attributes = tree.context(0, Vec::new());
        let info = tree.sequence(vec![version, name, spki, attributes]);
        let info_der = encode(&tree, info)?;
        let (encoded, signature) = sign_structure(&info_der, key)?;
        debug!("Created certificate request for '{}'", subject);
        Ok(Self {
            version: 0,
            subject: subject_to_string(&tree, name)?,
            public_key,
            algorithm: signature_algorithm(key.curve()),
            signature,
            attributes: Vec::new(),
            encoded,
        })
    }

    /// Parse a request; its signature must verify against its own key.
    pub fn from_der(der: &[u8]) -> DlmsResult<Self> {
        let (tree, root) = parse(der)?;
        pem::expect_kind(DerKind::of(&tree, root), DerKind::Pkcs10)?;
        let info = tree.child(root, 0)?;
        let version = tree
            .as_integer(tree.child(info, 0)?)?
            .to_i64()
            .filter(|v| *v == 0)
            .ok_or_else(|| DlmsError::InvalidData("PKCS #10 version must be 0".to_string()))?;
        let subject = subject_to_string(&tree, tree.child(info, 1)?)?;
        let public_key = PublicKey::from_spki_tree(&tree, tree.child(info, 2)?)?;
        let mut attributes = Vec::new();
        if let Ok(attrs) = tree.child(info, 3) {
            for attr in tree.children(attrs) {
                attributes.push(encode(&tree, *attr)?);
            }
        }
        let algorithm_oid = tree.as_oid(tree.child(tree.child(root, 1)?, 0)?)?;
        let curve = signature_curve(algorithm_oid)?;
        let algorithm = signature_algorithm(curve);
        let signature = signature_from_der(tree.as_bit_string(tree.child(root, 2)?)?.as_bytes(), curve)?;
        if curve != public_key.curve() {
            return Err(DlmsError::InvalidSignature(format!(
                "{} with a {:?} key",
                algorithm,
                public_key.curve()
            )));
        }
        if !Ecdsa::verify(&public_key, signed_part(der)?, &signature)? {
            warn!("Certificate request for '{}' has a bad signature", subject);
            return Err(DlmsError::InvalidSignature(
                "certificate request signature does not match its public key".to_string(),
            ));
        }
        Ok(Self {
            version: version as u8,
            subject,
            public_key,
            algorithm,
            signature,
            attributes,
            encoded: der.to_vec(),
        })
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.encoded.clone()
    }

    pub fn from_pem(text: &str) -> DlmsResult<Self> {
        Self::from_der(&pem::decode_as(text, DerKind::Pkcs10)?)
    }

    pub fn to_pem(&self) -> String {
        pem::encode(pem::CERTIFICATE_REQUEST, &self.encoded)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn algorithm(&self) -> X9ObjectIdentifier {
        self.algorithm
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn attributes(&self) -> &[Vec<u8>] {
        &self.attributes
    }
}
