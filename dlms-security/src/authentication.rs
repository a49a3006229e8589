//! High level authentication
//!
//! During association each side sends a challenge and the peer proves its
//! credentials by returning the challenge processed with the shared secret:
//!
//! | Mechanism    | Reply                                             |
//! |--------------|---------------------------------------------------|
//! | `High`       | AES-ECB of the challenge keyed with the secret    |
//! | `HighMd5`    | MD5 of challenge and secret                       |
//! | `HighSha1`   | SHA-1 of challenge and secret                     |
//! | `HighSha256` | SHA-256 of challenge and secret                   |
//! | `HighGmac`   | security control, invocation counter and GMAC tag |
//! | `HighEcdsa`  | ECDSA signature of the challenge                  |

use crate::block::AesBlock;
use crate::cipher::Cipher;
use crate::ecdsa::Ecdsa;
use crate::encryption::{TAG_LEN, gmac_password};
use crate::error::{DlmsError, DlmsResult};
use crate::suite::{Authentication, CertificateType, KeyType, Security};
use log::{debug, warn};
use md5::Md5;
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Shortest challenge
pub const MIN_CHALLENGE_SIZE: usize = 8;
/// Shortest challenge for ECDSA authentication
pub const MIN_ECDSA_CHALLENGE_SIZE: usize = 32;
/// Longest challenge
pub const MAX_CHALLENGE_SIZE: usize = 64;

fn digest<D: Digest>(data: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(data);
    hasher.update(secret);
    hasher.finalize().to_vec()
}

/// Process `data` with `secret` as the mechanism requires.
///
/// `invocation_counter` is only used by `HighGmac`; `HighEcdsa` signs with
/// the digital signature key pair of `cipher`.
pub fn secure(
    cipher: &Cipher,
    authentication: Authentication,
    invocation_counter: u32,
    data: &[u8],
    secret: &[u8],
) -> DlmsResult<Vec<u8>> {
    debug!("Securing {} byte challenge with {}", data.len(), authentication);
    match authentication {
        Authentication::None => Ok(Vec::new()),
        Authentication::Low => Ok(secret.to_vec()),
        Authentication::High => {
            if secret.len() != 16 {
                return Err(DlmsError::InvalidKey(format!(
                    "HLS secret must be 16 bytes, got {}",
                    secret.len()
                )));
            }
            Ok(AesBlock::new(secret)?.encrypt_ecb(data))
        }
        Authentication::HighMd5 => Ok(digest::<Md5>(data, secret)),
        Authentication::HighSha1 => Ok(digest::<Sha1>(data, secret)),
        Authentication::HighSha256 => Ok(digest::<Sha256>(data, secret)),
        Authentication::HighGmac => {
            let mut p = cipher.aes_gcm_parameter(Security::Authentication, false)?;
            p.invocation_counter = invocation_counter;
            gmac_password(&p, data)
        }
        Authentication::HighEcdsa => {
            let (key, _) = cipher.key_pair(KeyType::DigitalSignature).ok_or_else(|| {
                DlmsError::InvalidKey("digital signature key pair is not set".to_string())
            })?;
            Ecdsa::sign(key, data)
        }
    }
}

/// Check the peer's reply to our challenge.
///
/// GMAC replies carry their own invocation counter and are checked against
/// the recipient system title. ECDSA replies are verified with the digital
/// signature certificate of the recipient.
pub fn verify(
    cipher: &Cipher,
    authentication: Authentication,
    challenge: &[u8],
    secret: &[u8],
    reply: &[u8],
) -> DlmsResult<bool> {
    let valid = match authentication {
        Authentication::HighGmac => {
            if reply.len() != 5 + TAG_LEN {
                return Err(DlmsError::InvalidData(format!(
                    "GMAC reply must be {} bytes, got {}",
                    5 + TAG_LEN,
                    reply.len()
                )));
            }
            let mut p = cipher.peer_aes_gcm_parameter()?;
            p.security = Security::Authentication;
            p.invocation_counter = u32::from_be_bytes([reply[1], reply[2], reply[3], reply[4]]);
            bool::from(gmac_password(&p, challenge)?.ct_eq(reply))
        }
        Authentication::HighEcdsa => {
            let title = cipher.recipient_system_title().ok_or_else(|| {
                DlmsError::InvalidSystemTitle("recipient system title is not set".to_string())
            })?;
            let certificate = cipher
                .find_certificate(title, CertificateType::DigitalSignature)
                .ok_or_else(|| {
                    DlmsError::InvalidCertificate(format!(
                        "no digital signature certificate for {}",
                        title
                    ))
                })?;
            Ecdsa::verify(certificate.public_key(), challenge, reply)?
        }
        _ => bool::from(secure(cipher, authentication, 0, challenge, secret)?.ct_eq(reply)),
    };
    if !valid {
        warn!("{} authentication reply rejected", authentication);
    }
    Ok(valid)
}

/// Random challenge for `authentication`.
///
/// With `size == 0` the length is random in 8..=64, or 32..=64 for ECDSA.
/// Bytes are below 0x7A.
pub fn generate_challenge(authentication: Authentication, size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let len = if size != 0 {
        size
    } else if authentication == Authentication::HighEcdsa {
        rng.gen_range(MIN_ECDSA_CHALLENGE_SIZE..=MAX_CHALLENGE_SIZE)
    } else {
        rng.gen_range(MIN_CHALLENGE_SIZE..=MAX_CHALLENGE_SIZE)
    };
    (0..len).map(|_| rng.gen_range(0..0x7Au8)).collect()
}
