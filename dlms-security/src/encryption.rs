//! AES-GCM ciphering of DLMS APDUs
//!
//! The nonce is `system title (8) || invocation counter (4, big endian)` and
//! the tag is always 12 bytes. The additional authenticated data is
//! `security control || authentication key`, followed by the plaintext when
//! only authentication is requested.

use crate::block::AesBlock;
use crate::error::{DlmsError, DlmsResult};
use crate::suite::{CountType, Security, SecuritySuite, security_control};
use aes::{Aes128, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{AesGcm, Nonce};
use log::{debug, warn};

/// Length of the authentication tag
pub const TAG_LEN: usize = 12;

type Aes128Gcm12 = AesGcm<Aes128, U12, U12>;
type Aes256Gcm12 = AesGcm<Aes256, U12, U12>;

/// AES-GCM keyed with a 16 or 32 byte block cipher key
enum Gcm {
    Aes128(Aes128Gcm12),
    Aes256(Aes256Gcm12),
}

impl Gcm {
    fn new(key: &[u8]) -> DlmsResult<Self> {
        let invalid = |_| DlmsError::InvalidKey(format!("invalid AES-GCM key length {}", key.len()));
        match key.len() {
            16 => Ok(Gcm::Aes128(Aes128Gcm12::new_from_slice(key).map_err(invalid)?)),
            32 => Ok(Gcm::Aes256(Aes256Gcm12::new_from_slice(key).map_err(invalid)?)),
            n => Err(DlmsError::InvalidKey(format!(
                "block cipher key must be 16 or 32 bytes, got {}",
                n
            ))),
        }
    }

    /// Ciphertext followed by the tag.
    fn seal(&self, nonce: &[u8; 12], aad: &[u8], msg: &[u8]) -> DlmsResult<Vec<u8>> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        let payload = Payload { msg, aad };
        let sealed = match self {
            Gcm::Aes128(c) => c.encrypt(nonce, payload),
            Gcm::Aes256(c) => c.encrypt(nonce, payload),
        };
        sealed.map_err(|e| DlmsError::Security(format!("Encryption failed: {}", e)))
    }

    fn open(&self, nonce: &[u8; 12], aad: &[u8], msg: &[u8]) -> DlmsResult<Vec<u8>> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        let payload = Payload { msg, aad };
        let opened = match self {
            Gcm::Aes128(c) => c.decrypt(nonce, payload),
            Gcm::Aes256(c) => c.decrypt(nonce, payload),
        };
        opened.map_err(|_| DlmsError::InvalidTag)
    }
}

/// Everything the ciphering of one APDU depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesGcmParameter {
    pub security: Security,
    pub suite: SecuritySuite,
    pub invocation_counter: u32,
    /// System title of the sender
    pub system_title: Vec<u8>,
    pub block_cipher_key: Vec<u8>,
    pub authentication_key: Vec<u8>,
    pub broadcast: bool,
    pub count_type: CountType,
}

impl AesGcmParameter {
    pub fn new(
        security: Security,
        suite: SecuritySuite,
        invocation_counter: u32,
        system_title: &[u8],
        block_cipher_key: &[u8],
        authentication_key: &[u8],
    ) -> Self {
        Self {
            security,
            suite,
            invocation_counter,
            system_title: system_title.to_vec(),
            block_cipher_key: block_cipher_key.to_vec(),
            authentication_key: authentication_key.to_vec(),
            broadcast: false,
            count_type: CountType::Packet,
        }
    }

    pub fn with_count_type(mut self, count_type: CountType) -> Self {
        self.count_type = count_type;
        self
    }

    pub fn security_control(&self) -> u8 {
        security_control(self.security, self.suite, self.broadcast)
    }

    fn nonce(&self) -> DlmsResult<[u8; 12]> {
        if self.system_title.len() != 8 {
            return Err(DlmsError::InvalidSystemTitle(format!(
                "system title must be 8 bytes, got {}",
                self.system_title.len()
            )));
        }
        let mut nonce = [0u8; 12];
        nonce[..8].copy_from_slice(&self.system_title);
        nonce[8..].copy_from_slice(&self.invocation_counter.to_be_bytes());
        Ok(nonce)
    }

    fn aad(&self, sc: u8, plaintext: &[u8]) -> Vec<u8> {
        match self.security {
            Security::Authentication => {
                let mut aad = Vec::with_capacity(1 + self.authentication_key.len() + plaintext.len());
                aad.push(sc);
                aad.extend_from_slice(&self.authentication_key);
                aad.extend_from_slice(plaintext);
                aad
            }
            Security::AuthenticationEncryption => {
                let mut aad = Vec::with_capacity(1 + self.authentication_key.len());
                aad.push(sc);
                aad.extend_from_slice(&self.authentication_key);
                aad
            }
            _ => Vec::new(),
        }
    }
}

/// Cipher `plaintext` and package it as selected by `p.count_type`.
pub fn encrypt(p: &AesGcmParameter, plaintext: &[u8]) -> DlmsResult<Vec<u8>> {
    if p.security == Security::None {
        return Ok(plaintext.to_vec());
    }
    let sc = p.security_control();
    let gcm = Gcm::new(&p.block_cipher_key)?;
    let nonce = p.nonce()?;
    let aad = p.aad(sc, plaintext);
    debug!(
        "Ciphering {} bytes: sc 0x{:02X}, IC {}, {:?}",
        plaintext.len(),
        sc,
        p.invocation_counter,
        p.count_type
    );
    // For authentication only the plaintext travels in the AAD.
    let sealed = if p.security == Security::Authentication {
        let tag = gcm.seal(&nonce, &aad, &[])?;
        let mut out = plaintext.to_vec();
        out.extend_from_slice(&tag);
        out
    } else {
        gcm.seal(&nonce, &aad, plaintext)?
    };
    let (data, tag) = sealed.split_at(sealed.len() - TAG_LEN);
    Ok(match p.count_type {
        CountType::Packet => {
            let mut out = Vec::with_capacity(5 + sealed.len());
            out.push(sc);
            out.extend_from_slice(&p.invocation_counter.to_be_bytes());
            out.extend_from_slice(&sealed);
            out
        }
        CountType::DataOnly => data.to_vec(),
        CountType::TagOnly => tag.to_vec(),
        CountType::DataAndTag => sealed,
    })
}

/// Result of [`decrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deciphered {
    pub data: Vec<u8>,
    pub security: Security,
    pub suite: SecuritySuite,
    pub broadcast: bool,
    pub invocation_counter: u32,
}

/// Reverse of [`encrypt`].
///
/// For [`CountType::Packet`] the security control byte and invocation
/// counter are read from `data` and override the values in `p`.
/// [`CountType::DataOnly`] has no tag and is deciphered without
/// authentication. [`CountType::TagOnly`] is not decipherable.
pub fn decrypt(p: &AesGcmParameter, data: &[u8]) -> DlmsResult<Deciphered> {
    let mut p = p.clone();
    let body = match p.count_type {
        CountType::Packet => {
            if data.len() < 5 {
                return Err(DlmsError::IncompletePdu(format!(
                    "ciphered header needs 5 bytes, got {}",
                    data.len()
                )));
            }
            let sc = data[0];
            p.security = Security::from_control(sc);
            p.suite = SecuritySuite::from_id(sc & 0x0F)?;
            p.broadcast = sc & crate::suite::BROADCAST != 0;
            p.invocation_counter = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
            &data[5..]
        }
        CountType::TagOnly => {
            return Err(DlmsError::Security("a bare tag cannot be deciphered".to_string()));
        }
        _ => data,
    };
    let mut out = Deciphered {
        data: Vec::new(),
        security: p.security,
        suite: p.suite,
        broadcast: p.broadcast,
        invocation_counter: p.invocation_counter,
    };
    if p.security == Security::None {
        out.data = body.to_vec();
        return Ok(out);
    }
    let nonce = p.nonce()?;
    if p.count_type == CountType::DataOnly {
        out.data = if p.security == Security::Authentication {
            body.to_vec()
        } else {
            ctr_keystream_xor(&p.block_cipher_key, &nonce, body)?
        };
        return Ok(out);
    }
    if body.len() < TAG_LEN {
        return Err(DlmsError::IncompletePdu(format!(
            "ciphered data shorter than the {} byte tag",
            TAG_LEN
        )));
    }
    let sc = p.security_control();
    let gcm = Gcm::new(&p.block_cipher_key)?;
    let result = if p.security == Security::Authentication {
        let (plain, tag) = body.split_at(body.len() - TAG_LEN);
        let aad = p.aad(sc, plain);
        gcm.open(&nonce, &aad, tag).map(|_| plain.to_vec())
    } else {
        let aad = p.aad(sc, &[]);
        gcm.open(&nonce, &aad, body)
    };
    out.data = result.inspect_err(|_| {
        warn!(
            "Authentication tag mismatch (sc 0x{:02X}, IC {})",
            sc, p.invocation_counter
        )
    })?;
    Ok(out)
}

/// GCM counter mode without the tag: counter block 2 onwards.
fn ctr_keystream_xor(key: &[u8], nonce: &[u8; 12], data: &[u8]) -> DlmsResult<Vec<u8>> {
    let cipher = AesBlock::new(key)?;
    let mut out = Vec::with_capacity(data.len());
    for (i, chunk) in data.chunks(16).enumerate() {
        let mut block = [0u8; 16];
        block[..12].copy_from_slice(nonce);
        block[12..].copy_from_slice(&(i as u32 + 2).to_be_bytes());
        cipher.encrypt(&mut block);
        out.extend(chunk.iter().zip(block.iter()).map(|(d, k)| d ^ k));
    }
    Ok(out)
}

/// GMAC tag over `data` with the keys and counter of `p`.
pub fn gmac_tag(p: &AesGcmParameter, data: &[u8]) -> DlmsResult<Vec<u8>> {
    let p = AesGcmParameter {
        security: Security::Authentication,
        count_type: CountType::TagOnly,
        ..p.clone()
    };
    encrypt(&p, data)
}

/// Security control byte, invocation counter and GMAC tag of `challenge`,
/// as sent in the HLS GMAC reply.
pub fn gmac_password(p: &AesGcmParameter, challenge: &[u8]) -> DlmsResult<Vec<u8>> {
    let tag = gmac_tag(p, challenge)?;
    let mut out = Vec::with_capacity(5 + TAG_LEN);
    out.push(security_control(Security::Authentication, p.suite, p.broadcast));
    out.extend_from_slice(&p.invocation_counter.to_be_bytes());
    out.extend_from_slice(&tag);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::helpers::hex_to_bytes;

    fn params(security: Security) -> AesGcmParameter {
        AesGcmParameter::new(
            security,
            SecuritySuite::Suite0,
            0x01234567,
            &hex_to_bytes("4D4D4D0000BC614E").unwrap(),
            &hex_to_bytes("000102030405060708090A0B0C0D0E0F").unwrap(),
            &hex_to_bytes("D0D1D2D3D4D5D6D7D8D9DADBDCDDDEDF").unwrap(),
        )
    }

    fn plaintext() -> Vec<u8> {
        hex_to_bytes("C0 01 00 00 08 00 00 01 00 00 FF 02 00").unwrap()
    }

    #[test]
    fn test_authentication_tag() {
        let p = params(Security::Authentication).with_count_type(CountType::TagOnly);
        assert_eq!(
            encrypt(&p, &plaintext()).unwrap(),
            hex_to_bytes("06 72 5D 91 0F 92 21 D2 63 87 75 16").unwrap()
        );
    }

    #[test]
    fn test_authenticated_encryption_packet() {
        let p = params(Security::AuthenticationEncryption);
        let packet = encrypt(&p, &plaintext()).unwrap();
        assert_eq!(
            packet,
            hex_to_bytes(
                "30 01234567 411312FF935A47566827C467BC 7D825C3BE4A77C3FCC056B6B"
            )
            .unwrap()
        );
        let plain = decrypt(&p, &packet).unwrap();
        assert_eq!(plain.data, plaintext());
        assert_eq!(plain.invocation_counter, 0x01234567);
        assert_eq!(plain.security, Security::AuthenticationEncryption);
    }

    #[test]
    fn test_every_bit_flip_is_rejected() {
        for security in [Security::Authentication, Security::Encryption, Security::AuthenticationEncryption] {
            let p = params(security);
            let packet = encrypt(&p, &plaintext()).unwrap();
            assert_eq!(decrypt(&p, &packet).unwrap().data, plaintext());
            // Skip the security control byte: flipping it changes the mode.
            for i in 1..packet.len() {
                for bit in 0..8 {
                    let mut bad = packet.clone();
                    bad[i] ^= 1 << bit;
                    assert!(decrypt(&p, &bad).is_err(), "{:?} byte {} bit {}", security, i, bit);
                }
            }
        }
    }

    #[test]
    fn test_wrong_system_title_fails() {
        let p = params(Security::AuthenticationEncryption);
        let packet = encrypt(&p, &plaintext()).unwrap();
        let mut other = p.clone();
        other.system_title[7] ^= 1;
        assert_eq!(decrypt(&other, &packet).unwrap_err(), DlmsError::InvalidTag);
        let mut other = p.clone();
        other.authentication_key[0] ^= 1;
        assert_eq!(decrypt(&other, &packet).unwrap_err(), DlmsError::InvalidTag);
    }

    #[test]
    fn test_count_types() {
        let p = params(Security::AuthenticationEncryption);
        let packet = encrypt(&p, &plaintext()).unwrap();
        let data_and_tag = encrypt(&p.clone().with_count_type(CountType::DataAndTag), &plaintext()).unwrap();
        assert_eq!(&packet[5..], &data_and_tag[..]);
        let data = encrypt(&p.clone().with_count_type(CountType::DataOnly), &plaintext()).unwrap();
        assert_eq!(data, &packet[5..5 + plaintext().len()]);
        let p_data = p.clone().with_count_type(CountType::DataOnly);
        assert_eq!(decrypt(&p_data, &data).unwrap().data, plaintext());
        let p_dt = p.with_count_type(CountType::DataAndTag);
        assert_eq!(decrypt(&p_dt, &data_and_tag).unwrap().data, plaintext());
    }

    #[test]
    fn test_aes256() {
        let mut p = params(Security::AuthenticationEncryption);
        p.suite = SecuritySuite::Suite2;
        p.block_cipher_key = vec![0x11; 32];
        let packet = encrypt(&p, b"hello").unwrap();
        assert_eq!(packet[0], 0x32);
        assert_eq!(packet.len(), 5 + 5 + TAG_LEN);
        assert_eq!(decrypt(&p, &packet).unwrap().data, b"hello".to_vec());
    }

    #[test]
    fn test_invalid_inputs() {
        let mut p = params(Security::Encryption);
        p.block_cipher_key = vec![0; 15];
        assert!(matches!(encrypt(&p, b"x"), Err(DlmsError::InvalidKey(_))));
        let mut p = params(Security::Encryption);
        p.system_title = vec![0; 7];
        assert!(matches!(encrypt(&p, b"x"), Err(DlmsError::InvalidSystemTitle(_))));
        let p = params(Security::None);
        assert_eq!(encrypt(&p, b"x").unwrap(), b"x".to_vec());
    }

    #[test]
    fn test_gmac_password() {
        let p = params(Security::AuthenticationEncryption);
        let reply = gmac_password(&p, &plaintext()).unwrap();
        assert_eq!(reply.len(), 17);
        assert_eq!(reply[0], 0x10);
        assert_eq!(&reply[1..5], &[0x01, 0x23, 0x45, 0x67]);
        assert_eq!(&reply[5..], &hex_to_bytes("06725D910F9221D263877516").unwrap()[..]);
    }
}
