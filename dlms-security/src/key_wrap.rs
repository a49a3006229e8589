//! AES key wrap (RFC 3394)
//!
//! Used to transport the global keys to a meter under the KEK.

use crate::block::AesBlock;
use crate::error::{DlmsError, DlmsResult};
use log::warn;
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;

/// Default initial value of RFC 3394
const IV: [u8; 8] = [0xA6; 8];

fn check_lengths(kek: &[u8], data_len: usize, what: &str, allowed: &[usize]) -> DlmsResult<()> {
    if kek.len() != 16 && kek.len() != 32 {
        return Err(DlmsError::InvalidKey(format!(
            "KEK must be 16 or 32 bytes, got {}",
            kek.len()
        )));
    }
    if !allowed.contains(&data_len) {
        return Err(DlmsError::InvalidKey(format!(
            "{} must be {:?} bytes, got {}",
            what, allowed, data_len
        )));
    }
    Ok(())
}

/// Random 16 or 32 byte key.
pub fn generate_key(len: usize) -> DlmsResult<Vec<u8>> {
    if len != 16 && len != 32 {
        return Err(DlmsError::InvalidKey(format!("key must be 16 or 32 bytes, got {}", len)));
    }
    let mut key = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| DlmsError::Security("random generator failed".to_string()))?;
    Ok(key)
}

/// Wrap a 16 or 32 byte key under `kek`.
pub fn wrap(kek: &[u8], key: &[u8]) -> DlmsResult<Vec<u8>> {
    check_lengths(kek, key.len(), "wrapped key", &[16, 32])?;
    let cipher = AesBlock::new(kek)?;
    let n = key.len() / 8;
    let mut a = IV;
    let mut r: Vec<[u8; 8]> = key
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            b
        })
        .collect();
    let mut block = [0u8; 16];
    for j in 0..6 {
        for i in 0..n {
            block[..8].copy_from_slice(&a);
            block[8..].copy_from_slice(&r[i]);
            cipher.encrypt(&mut block);
            let t = ((n * j + i + 1) as u64).to_be_bytes();
            for k in 0..8 {
                a[k] = block[k] ^ t[k];
            }
            r[i].copy_from_slice(&block[8..]);
        }
    }
    let mut out = Vec::with_capacity(8 * (n + 1));
    out.extend_from_slice(&a);
    for b in &r {
        out.extend_from_slice(b);
    }
    Ok(out)
}

/// Inverse of [`wrap`]; fails if the integrity check value does not match.
pub fn unwrap(kek: &[u8], data: &[u8]) -> DlmsResult<Vec<u8>> {
    check_lengths(kek, data.len(), "wrapped data", &[24, 40])?;
    let cipher = AesBlock::new(kek)?;
    let n = data.len() / 8 - 1;
    let mut a = [0u8; 8];
    a.copy_from_slice(&data[..8]);
    let mut r: Vec<[u8; 8]> = data[8..]
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            b
        })
        .collect();
    let mut block = [0u8; 16];
    for j in (0..6).rev() {
        for i in (0..n).rev() {
            let t = ((n * j + i + 1) as u64).to_be_bytes();
            for k in 0..8 {
                block[k] = a[k] ^ t[k];
            }
            block[8..].copy_from_slice(&r[i]);
            cipher.decrypt(&mut block);
            a.copy_from_slice(&block[..8]);
            r[i].copy_from_slice(&block[8..]);
        }
    }
    if !bool::from(a[..].ct_eq(&IV[..])) {
        warn!("Key unwrap integrity check failed");
        return Err(DlmsError::InvalidKey("key unwrap integrity check failed".to_string()));
    }
    Ok(r.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::helpers::hex_to_bytes;

    #[test]
    fn test_rfc3394_128() {
        let kek = hex_to_bytes("000102030405060708090A0B0C0D0E0F").unwrap();
        let key = hex_to_bytes("00112233445566778899AABBCCDDEEFF").unwrap();
        let wrapped = wrap(&kek, &key).unwrap();
        assert_eq!(
            wrapped,
            hex_to_bytes("1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5").unwrap()
        );
        assert_eq!(unwrap(&kek, &wrapped).unwrap(), key);
    }

    #[test]
    fn test_rfc3394_256_key_256_kek() {
        let kek = hex_to_bytes(
            "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F",
        )
        .unwrap();
        let key = hex_to_bytes(
            "00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F",
        )
        .unwrap();
        let wrapped = wrap(&kek, &key).unwrap();
        assert_eq!(
            wrapped,
            hex_to_bytes(
                "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21"
            )
            .unwrap()
        );
        assert_eq!(unwrap(&kek, &wrapped).unwrap(), key);
    }

    #[test]
    fn test_tampered_wrap_fails() {
        let kek = [7u8; 16];
        let key = [9u8; 16];
        let wrapped = wrap(&kek, &key).unwrap();
        for i in 0..wrapped.len() {
            let mut bad = wrapped.clone();
            bad[i] ^= 0x01;
            assert!(unwrap(&kek, &bad).is_err(), "flip at {}", i);
        }
    }

    #[test]
    fn test_lengths() {
        assert!(wrap(&[0u8; 8], &[0u8; 16]).is_err());
        assert!(wrap(&[0u8; 16], &[0u8; 8]).is_err());
        assert!(unwrap(&[0u8; 16], &[0u8; 16]).is_err());
    }

    #[test]
    fn test_generated_key_wraps() {
        let kek = generate_key(32).unwrap();
        let key = generate_key(16).unwrap();
        assert_ne!(kek[..16], key[..]);
        assert_eq!(unwrap(&kek, &wrap(&kek, &key).unwrap()).unwrap(), key);
        assert!(generate_key(24).is_err());
    }
}
