//! ECDH key agreement and the concatenation KDF of NIST SP 800-56A

use crate::error::{DlmsError, DlmsResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::suite::SecuritySuite;
use sha2::{Digest, Sha256, Sha384};

/// Shared secret computation
pub struct Ecdh;

impl Ecdh {
    /// `Z = (d * Q).x`, big endian and padded to the curve size.
    pub fn generate_secret(private_key: &PrivateKey, public_key: &PublicKey) -> DlmsResult<Vec<u8>> {
        if private_key.curve() != public_key.curve() {
            return Err(DlmsError::InvalidKey(format!(
                "{:?} private key with a {:?} public key",
                private_key.curve(),
                public_key.curve()
            )));
        }
        let ecc = private_key.curve().ecc();
        let shared = ecc.multiply(&private_key.scalar(), public_key.point())?;
        Ok(ecc.to_fixed_bytes(&shared.x))
    }
}

/// Algorithm identifiers used in `otherInfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfAlgorithm {
    AesGcm128 = 0,
    AesGcm256 = 1,
    AesWrap128 = 2,
    AesWrap256 = 3,
}

/// Length byte and DER body of the OID 2.16.756.5.8.3. The algorithm id is
/// appended as the last arc, so the length byte covers seven bytes.
const ALGORITHM_ID_PREFIX: [u8; 7] = [0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x03];

/// Key derivation functions
pub struct Kdf;

impl Kdf {
    /// Single pass concatenation KDF: `H(00000001 || Z || otherInfo)`,
    /// truncated to the block cipher key length of `suite`.
    pub fn concat(suite: SecuritySuite, z: &[u8], other_info: &[u8]) -> DlmsResult<Vec<u8>> {
        let counter = 1u32.to_be_bytes();
        let mut digest = match suite {
            SecuritySuite::Suite1 => Sha256::new()
                .chain_update(counter)
                .chain_update(z)
                .chain_update(other_info)
                .finalize()
                .to_vec(),
            SecuritySuite::Suite2 => Sha384::new()
                .chain_update(counter)
                .chain_update(z)
                .chain_update(other_info)
                .finalize()
                .to_vec(),
            SecuritySuite::Suite0 => {
                return Err(DlmsError::UnsupportedScheme(
                    "security suite 0 has no key agreement".to_string(),
                ));
            }
        };
        digest.truncate(suite.key_len());
        Ok(digest)
    }

    /// `otherInfo = AlgorithmID || PartyUInfo || PartyVInfo [|| SuppPubInfo] [|| SuppPrivInfo]`
    pub fn other_info(
        algorithm: KdfAlgorithm,
        party_u_info: &[u8],
        party_v_info: &[u8],
        supp_pub_info: Option<&[u8]>,
        supp_priv_info: Option<&[u8]>,
    ) -> Vec<u8> {
        let mut out = ALGORITHM_ID_PREFIX.to_vec();
        out.push(algorithm as u8);
        out.extend_from_slice(party_u_info);
        out.extend_from_slice(party_v_info);
        if let Some(info) = supp_pub_info {
            out.extend_from_slice(info);
        }
        if let Some(info) = supp_priv_info {
            out.extend_from_slice(info);
        }
        out
    }

    /// Key derivation as DLMS uses it, party infos being system titles.
    pub fn dlms(
        suite: SecuritySuite,
        z: &[u8],
        algorithm: KdfAlgorithm,
        party_u_info: &[u8],
        party_v_info: &[u8],
        supp_pub_info: Option<&[u8]>,
        supp_priv_info: Option<&[u8]>,
    ) -> DlmsResult<Vec<u8>> {
        let other_info =
            Self::other_info(algorithm, party_u_info, party_v_info, supp_pub_info, supp_priv_info);
        Self::concat(suite, z, &other_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::EccCurve;
    use crate::ecdsa::Ecdsa;

    #[test]
    fn test_shared_secret_agrees() {
        for curve in [EccCurve::P256, EccCurve::P384] {
            let (a, a_pub) = Ecdsa::generate_key_pair(curve).unwrap();
            let (b, b_pub) = Ecdsa::generate_key_pair(curve).unwrap();
            let z1 = Ecdh::generate_secret(&a, &b_pub).unwrap();
            let z2 = Ecdh::generate_secret(&b, &a_pub).unwrap();
            assert_eq!(z1, z2);
            assert_eq!(z1.len(), curve.size());
        }
    }

    #[test]
    fn test_secret_matches_p256_crate() {
        let (a, _) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let (_, b_pub) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let secret = p256::SecretKey::from_slice(a.raw_value()).unwrap();
        let public = p256::PublicKey::from_sec1_bytes(&b_pub.to_sec1()).unwrap();
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
        assert_eq!(
            Ecdh::generate_secret(&a, &b_pub).unwrap(),
            shared.raw_secret_bytes().to_vec()
        );
    }

    #[test]
    fn test_curve_mismatch() {
        let (a, _) = Ecdsa::generate_key_pair(EccCurve::P256).unwrap();
        let (_, b_pub) = Ecdsa::generate_key_pair(EccCurve::P384).unwrap();
        assert!(Ecdh::generate_secret(&a, &b_pub).is_err());
    }

    #[test]
    fn test_concat_kdf() {
        let z = [0x11u8; 32];
        let info = Kdf::other_info(KdfAlgorithm::AesGcm128, &[1; 8], &[2; 8], None, None);
        assert_eq!(info.len(), 8 + 16);
        assert_eq!(&info[..8], &[0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x03, 0x00]);
        assert_eq!(&info[8..16], &[1; 8]);
        let wrap = Kdf::other_info(KdfAlgorithm::AesWrap256, &[], &[], Some(&[9]), None);
        assert_eq!(wrap, vec![0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x03, 0x03, 0x09]);
        let key = Kdf::concat(SecuritySuite::Suite1, &z, &info).unwrap();
        let mut expected = Sha256::new();
        expected.update([0, 0, 0, 1]);
        expected.update(z);
        expected.update(&info);
        assert_eq!(key, expected.finalize()[..16].to_vec());
        let key = Kdf::dlms(SecuritySuite::Suite2, &z, KdfAlgorithm::AesGcm256, &[1; 8], &[2; 8], Some(&[3]), None)
            .unwrap();
        assert_eq!(key.len(), 32);
        assert!(Kdf::concat(SecuritySuite::Suite0, &z, &info).is_err());
    }
}
