//! Raw AES block operations (ECB) shared by key wrap, key derivation and
//! the manufacturer specific high level authentication.

use crate::error::{DlmsError, DlmsResult};
use aes::{Aes128, Aes192, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// AES keyed with a 16, 24 or 32 byte key
pub enum AesBlock {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl AesBlock {
    pub fn new(key: &[u8]) -> DlmsResult<Self> {
        Ok(match key.len() {
            16 => AesBlock::Aes128(Aes128::new(GenericArray::from_slice(key))),
            24 => AesBlock::Aes192(Aes192::new(GenericArray::from_slice(key))),
            32 => AesBlock::Aes256(Aes256::new(GenericArray::from_slice(key))),
            n => {
                return Err(DlmsError::InvalidKey(format!(
                    "AES key must be 16, 24 or 32 bytes, got {}",
                    n
                )));
            }
        })
    }

    pub fn encrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(block),
            AesBlock::Aes192(c) => c.encrypt_block(block),
            AesBlock::Aes256(c) => c.encrypt_block(block),
        }
    }

    pub fn decrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.decrypt_block(block),
            AesBlock::Aes192(c) => c.decrypt_block(block),
            AesBlock::Aes256(c) => c.decrypt_block(block),
        }
    }

    /// ECB over `data`, zero padded to a whole number of blocks.
    pub fn encrypt_ecb(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len().div_ceil(16) * 16);
        for chunk in data.chunks(16) {
            let mut block = [0u8; 16];
            block[..chunk.len()].copy_from_slice(chunk);
            self.encrypt(&mut block);
            out.extend_from_slice(&block);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::helpers::hex_to_bytes;

    #[test]
    fn test_fips197_vector() {
        let key = hex_to_bytes("000102030405060708090a0b0c0d0e0f").unwrap();
        let cipher = AesBlock::new(&key).unwrap();
        let mut block = [0u8; 16];
        block.copy_from_slice(&hex_to_bytes("00112233445566778899aabbccddeeff").unwrap());
        cipher.encrypt(&mut block);
        assert_eq!(
            block.to_vec(),
            hex_to_bytes("69c4e0d86a7b0430d8cdb78070b4c55a").unwrap()
        );
        cipher.decrypt(&mut block);
        assert_eq!(block[0], 0x00);
        assert_eq!(block[15], 0xFF);
    }

    #[test]
    fn test_key_length() {
        assert!(AesBlock::new(&[0u8; 15]).is_err());
        assert_eq!(AesBlock::new(&[0u8; 16]).unwrap().encrypt_ecb(&[1, 2, 3]).len(), 16);
    }
}
