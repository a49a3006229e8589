//! ECDSA over P-256 (SHA-256) and P-384 (SHA-384)

use crate::ecc::{Ecc, EccCurve};
use crate::error::{DlmsError, DlmsResult};
use crate::keys::{PrivateKey, PublicKey};
use dlms_asn1::ber::{Asn1Integer, Asn1Tree, Asn1Value, encode, parse};
use log::{debug, warn};
use num_bigint::BigUint;
use num_traits::Zero;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256, Sha384};

/// Digest matching the curve: SHA-256 for P-256, SHA-384 for P-384.
pub fn hash(curve: EccCurve, data: &[u8]) -> Vec<u8> {
    match curve {
        EccCurve::P256 => Sha256::digest(data).to_vec(),
        EccCurve::P384 => Sha384::digest(data).to_vec(),
    }
}

/// Uniform scalar in `[1, n-1]` from the system RNG.
pub(crate) fn random_scalar(ecc: &Ecc) -> DlmsResult<BigUint> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; ecc.size()];
    loop {
        rng.fill(&mut bytes)
            .map_err(|_| DlmsError::Security("system random generator failed".to_string()))?;
        let k = BigUint::from_bytes_be(&bytes);
        if !k.is_zero() && k < ecc.n {
            return Ok(k);
        }
    }
}

/// ECDSA signing and verification with raw `r || s` signatures
pub struct Ecdsa;

impl Ecdsa {
    /// New random key pair on `curve`.
    pub fn generate_key_pair(curve: EccCurve) -> DlmsResult<(PrivateKey, PublicKey)> {
        let d = random_scalar(curve.ecc())?;
        let private_key = PrivateKey::from_scalar(curve, &d)?;
        let public_key = private_key.public_key()?;
        Ok((private_key, public_key))
    }

    /// Sign `data`; the result is `r || s`, each padded to the curve size.
    pub fn sign(key: &PrivateKey, data: &[u8]) -> DlmsResult<Vec<u8>> {
        let ecc = key.curve().ecc();
        let e = BigUint::from_bytes_be(&hash(key.curve(), data));
        let d = key.scalar();
        loop {
            let k = random_scalar(ecc)?;
            let point = ecc.multiply_base(&k)?;
            let r = &point.x % &ecc.n;
            if r.is_zero() {
                continue;
            }
            let k_inv = k
                .modinv(&ecc.n)
                .ok_or_else(|| DlmsError::Security("nonce is not invertible".to_string()))?;
            let s = (k_inv * ((&e + &d * &r) % &ecc.n)) % &ecc.n;
            if s.is_zero() {
                continue;
            }
            let mut signature = ecc.to_fixed_bytes(&r);
            signature.extend(ecc.to_fixed_bytes(&s));
            debug!("Signed {} bytes with {:?}", data.len(), key.curve());
            return Ok(signature);
        }
    }

    /// Check a raw `r || s` signature over `data`.
    ///
    /// Returns `Ok(false)` for a well formed signature that does not verify.
    pub fn verify(key: &PublicKey, data: &[u8], signature: &[u8]) -> DlmsResult<bool> {
        let ecc = key.curve().ecc();
        if signature.len() != 2 * ecc.size() {
            return Err(DlmsError::InvalidSignature(format!(
                "{:?} signature must be {} bytes, got {}",
                key.curve(),
                2 * ecc.size(),
                signature.len()
            )));
        }
        let (r, s) = signature.split_at(ecc.size());
        let r = BigUint::from_bytes_be(r);
        let s = BigUint::from_bytes_be(s);
        if r.is_zero() || s.is_zero() || r >= ecc.n || s >= ecc.n {
            warn!("Signature component out of range");
            return Ok(false);
        }
        let e = BigUint::from_bytes_be(&hash(key.curve(), data));
        let w = match s.modinv(&ecc.n) {
            Some(w) => w,
            None => return Ok(false),
        };
        let u1 = (&e * &w) % &ecc.n;
        let u2 = (&r * &w) % &ecc.n;
        let valid = match ecc.shamir(&u1, &ecc.g, &u2, key.point()) {
            Ok(point) => point.x % &ecc.n == r,
            Err(_) => false,
        };
        if !valid {
            warn!("ECDSA signature over {} bytes does not verify", data.len());
        }
        Ok(valid)
    }
}

/// `SEQUENCE { INTEGER r, INTEGER s }` of a raw signature
pub fn signature_to_der(signature: &[u8]) -> DlmsResult<Vec<u8>> {
    if signature.is_empty() || signature.len() % 2 != 0 {
        return Err(DlmsError::InvalidSignature(format!(
            "raw signature of {} bytes",
            signature.len()
        )));
    }
    let (r, s) = signature.split_at(signature.len() / 2);
    let mut tree = Asn1Tree::new();
    let r = tree.value(Asn1Value::Integer(Asn1Integer::from_unsigned(r)));
    let s = tree.value(Asn1Value::Integer(Asn1Integer::from_unsigned(s)));
    let root = tree.sequence(vec![r, s]);
    encode(&tree, root)
}

/// Raw `r || s` of a DER signature, padded to the size of `curve`.
pub fn signature_from_der(der: &[u8], curve: EccCurve) -> DlmsResult<Vec<u8>> {
    let (tree, root) = parse(der)?;
    let ecc = curve.ecc();
    let mut out = Vec::with_capacity(2 * ecc.size());
    for i in 0..2 {
        let value = tree.as_integer(tree.child(root, i)?)?;
        if value.is_negative() {
            return Err(DlmsError::InvalidSignature("negative signature component".to_string()));
        }
        let magnitude = BigUint::from_bytes_be(value.unsigned_bytes());
        if magnitude.bits() > (8 * ecc.size()) as u64 {
            return Err(DlmsError::InvalidSignature(
                "signature component wider than the curve".to_string(),
            ));
        }
        out.extend(ecc.to_fixed_bytes(&magnitude));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::helpers::hex_to_bytes;

    fn rfc6979_key() -> PrivateKey {
        PrivateKey::from_raw(
            &hex_to_bytes("C9AFA9D845BA75166B5C215767B1D6934E50C3DB36E89B127B8A622B120F6721").unwrap(),
        )
        .unwrap()
    }

    const SAMPLE_SIGNATURE: &str = "EFD48B2AACB6A8FD1140DD9CD45E81D69D2C877B56AAF991C34D0EA84EAF3716\
                                    F7CB1C942D657C41D436C7A1B6E29F65F3E900DBB9AFF4064DC4AB2F843ACDA8";

    #[test]
    fn test_verify_rfc6979_sample() {
        let public_key = rfc6979_key().public_key().unwrap();
        let signature = hex_to_bytes(SAMPLE_SIGNATURE).unwrap();
        assert!(Ecdsa::verify(&public_key, b"sample", &signature).unwrap());
        assert!(!Ecdsa::verify(&public_key, b"samplf", &signature).unwrap());
        let mut bad = signature.clone();
        bad[10] ^= 0x40;
        assert!(!Ecdsa::verify(&public_key, b"sample", &bad).unwrap());
        assert!(Ecdsa::verify(&public_key, b"sample", &signature[..63]).is_err());
    }

    #[test]
    fn test_sign_verify_both_curves() {
        for curve in [EccCurve::P256, EccCurve::P384] {
            let (private_key, public_key) = Ecdsa::generate_key_pair(curve).unwrap();
            let signature = Ecdsa::sign(&private_key, b"DLMS").unwrap();
            assert_eq!(signature.len(), 2 * curve.size());
            assert!(Ecdsa::verify(&public_key, b"DLMS", &signature).unwrap());
            assert!(!Ecdsa::verify(&public_key, b"DLMs", &signature).unwrap());
        }
    }

    #[test]
    fn test_p256_crate_accepts_our_signature() {
        use p256::ecdsa::signature::Verifier;
        let key = rfc6979_key();
        let signature = Ecdsa::sign(&key, b"message").unwrap();
        let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&key.public_key().unwrap().to_sec1())
            .unwrap();
        let signature = p256::ecdsa::Signature::from_slice(&signature).unwrap();
        assert!(vk.verify(b"message", &signature).is_ok());
    }

    #[test]
    fn test_we_accept_p384_crate_signature() {
        use p384::ecdsa::signature::Signer;
        let (private_key, public_key) = Ecdsa::generate_key_pair(EccCurve::P384).unwrap();
        let sk = p384::ecdsa::SigningKey::from_slice(private_key.raw_value()).unwrap();
        let signature: p384::ecdsa::Signature = sk.sign(b"message");
        assert!(Ecdsa::verify(&public_key, b"message", &signature.to_bytes()).unwrap());
    }

    #[test]
    fn test_der_signature() {
        let raw = hex_to_bytes(SAMPLE_SIGNATURE).unwrap();
        let der = signature_to_der(&raw).unwrap();
        assert_eq!(
            der,
            hex_to_bytes(
                "3046022100EFD48B2AACB6A8FD1140DD9CD45E81D69D2C877B56AAF991C34D0EA84EAF3716\
                 022100F7CB1C942D657C41D436C7A1B6E29F65F3E900DBB9AFF4064DC4AB2F843ACDA8"
            )
            .unwrap()
        );
        assert_eq!(signature_from_der(&der, EccCurve::P256).unwrap(), raw);
    }
}
