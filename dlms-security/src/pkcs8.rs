//! PKCS #8 private key containers (RFC 5208) for EC keys

use crate::ecc::EccCurve;
use crate::error::{DlmsError, DlmsResult};
use crate::keys::{PrivateKey, PublicKey, curve_from_oid, curve_oid};
use crate::pem::{self, DerKind};
use dlms_asn1::ber::{Asn1Tree, Asn1Value, X9ObjectIdentifier, encode, parse};
use log::debug;

/// `PrivateKeyInfo` holding a SEC1 `ECPrivateKey`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkcs8 {
    version: u8,
    curve: EccCurve,
    private_key: PrivateKey,
    public_key: Option<PublicKey>,
    /// The inner key repeats the curve parameters
    inner_params: bool,
}

impl Pkcs8 {
    /// Container for `private_key` with its public key embedded.
    pub fn new(private_key: PrivateKey) -> DlmsResult<Self> {
        let public_key = private_key.public_key()?;
        Ok(Self {
            version: 0,
            curve: private_key.curve(),
            private_key,
            public_key: Some(public_key),
            inner_params: false,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn curve(&self) -> EccCurve {
        self.curve
    }

    /// Curve OID of the algorithm identifier
    pub fn algorithm(&self) -> X9ObjectIdentifier {
        match self.curve {
            EccCurve::P256 => X9ObjectIdentifier::Prime256v1,
            EccCurve::P384 => X9ObjectIdentifier::Secp384r1,
        }
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Embedded public key, if the container carries one
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn from_der(der: &[u8]) -> DlmsResult<Self> {
        let (tree, root) = parse(der)?;
        pem::expect_kind(DerKind::of(&tree, root), DerKind::Pkcs8)?;
        let version = tree
            .as_integer(tree.child(root, 0)?)?
            .to_i64()
            .filter(|v| *v == 0)
            .ok_or_else(|| DlmsError::InvalidKey("PKCS #8 version must be 0".to_string()))?;
        let algorithm = tree.child(root, 1)?;
        let alg = tree.as_oid(tree.child(algorithm, 0)?)?;
        if X9ObjectIdentifier::from_oid(alg) != Some(X9ObjectIdentifier::IdECPublicKey) {
            return Err(DlmsError::UnsupportedScheme(format!("key algorithm {}", alg)));
        }
        let curve = curve_from_oid(tree.as_oid(tree.child(algorithm, 1)?)?)?;
        let (inner, inner_root) = parse(tree.as_octet_string(tree.child(root, 2)?)?)?;
        let (private_key, public_key, inner_params) =
            PrivateKey::from_sec1_tree(&inner, inner_root, Some(curve))?;
        if let Some(public_key) = &public_key {
            if public_key != &private_key.public_key()? {
                return Err(DlmsError::InvalidKey(
                    "embedded public key does not belong to the private key".to_string(),
                ));
            }
        }
        debug!(
            "Read PKCS #8 {:?} key, public key {}",
            curve,
            if public_key.is_some() { "embedded" } else { "absent" }
        );
        Ok(Self {
            version: version as u8,
            curve,
            private_key,
            public_key,
            inner_params,
        })
    }

    pub fn to_der(&self) -> DlmsResult<Vec<u8>> {
        let mut inner = Asn1Tree::new();
        let inner_root = self
            .private_key
            .sec1_tree(&mut inner, self.inner_params, self.public_key.as_ref());
        let inner_der = encode(&inner, inner_root)?;

        let mut tree = Asn1Tree::new();
        let version = tree.integer(i64::from(self.version));
        let alg = tree.oid(X9ObjectIdentifier::IdECPublicKey.oid());
        let curve = tree.oid(curve_oid(self.curve));
        let algorithm = tree.sequence(vec![alg, curve]);
        let key = tree.value(Asn1Value::OctetString(inner_der));
        let root = tree.sequence(vec![version, algorithm, key]);
        encode(&tree, root)
    }

    pub fn from_pem(text: &str) -> DlmsResult<Self> {
        Self::from_der(&pem::decode_as(text, DerKind::Pkcs8)?)
    }

    pub fn to_pem(&self) -> DlmsResult<String> {
        Ok(pem::encode(pem::PRIVATE_KEY, &self.to_der()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    const P256_KEY: &str = "MIGHAgEAMBMGByqGSM49AgEGCCqGSM49AwEHBG0wawIBAQQgya+p2EW6dRZrXCFXZ7HWk05Qw9s26JsSe4piKxIPZyGhRANCAARg/tS6JVqdMclh63TGNW1owEm4kjth+mzmaWIuYPKftnkD/hAIuLyZpBrp6VYovGTy8bIMLX6fUXejwpTURiKZ";

    #[test]
    fn test_der_round_trip() {
        let der = STANDARD.decode(P256_KEY).unwrap();
        let pkcs8 = Pkcs8::from_der(&der).unwrap();
        assert_eq!(pkcs8.version(), 0);
        assert_eq!(pkcs8.algorithm(), X9ObjectIdentifier::Prime256v1);
        assert_eq!(pkcs8.private_key().raw_value().len(), 32);
        assert_eq!(pkcs8.public_key().unwrap().to_sec1().len(), 65);
        assert_eq!(pkcs8.to_der().unwrap(), der);
    }

    #[test]
    fn test_new_matches_common_layout() {
        let der = STANDARD.decode(P256_KEY).unwrap();
        let parsed = Pkcs8::from_der(&der).unwrap();
        let built = Pkcs8::new(parsed.private_key().clone()).unwrap();
        assert_eq!(built.to_der().unwrap(), der);
    }

    #[test]
    fn test_mismatched_public_key() {
        let mut der = STANDARD.decode(P256_KEY).unwrap();
        // Last byte of the embedded point.
        let last = der.len() - 1;
        der[last] ^= 1;
        assert!(Pkcs8::from_der(&der).is_err());
    }

    #[test]
    fn test_pem() {
        let der = STANDARD.decode(P256_KEY).unwrap();
        let pkcs8 = Pkcs8::from_der(&der).unwrap();
        let text = pkcs8.to_pem().unwrap();
        assert_eq!(Pkcs8::from_pem(&text).unwrap(), pkcs8);
        let wrong = pem::encode(pem::CERTIFICATE_REQUEST, &der);
        assert!(Pkcs8::from_pem(&wrong).is_err());
    }
}
