//! System titles and key derivation
//!
//! # System Title
//!
//! An 8-byte identifier of a DLMS/COSEM communication partner. The first
//! three bytes carry the manufacturer FLAG ID as upper case letters, the
//! remaining five a manufacturer specific serial. It is used in:
//! - the AES-GCM nonce
//! - key derivation
//! - the subject of device certificates (`CN=<16 hex digits>`)
//!
//! # Manufacturer code
//!
//! Where a manufacturer has to fit in 15 bits the three letters are packed
//! five bits each: `(c0 << 10) | (c1 << 5) | c2` with `ci = letter - 0x40`.
//!
//! # Key Derivation Function (KDF)
//!
//! Derives the global keys from a master key (KEK):
//! 1. Input block: System Title (8 bytes) || Key ID (1 byte) || zero padding (7 bytes)
//! 2. The block is encrypted with AES-ECB under the master key
//! 3. The encrypted block is the derived key

use crate::block::AesBlock;
use crate::error::{DlmsError, DlmsResult};
use dlms_core::helpers::{hex_to_bytes, to_hex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pack three upper case letters into a 15-bit manufacturer code.
pub fn encode_manufacturer(flag: &str) -> DlmsResult<u16> {
    let bytes = flag.as_bytes();
    if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
        return Err(DlmsError::InvalidData(format!(
            "manufacturer must be three letters A-Z, got '{}'",
            flag
        )));
    }
    let c = |i: usize| u16::from(bytes[i] - 0x40);
    Ok((c(0) << 10) | (c(1) << 5) | c(2))
}

/// Inverse of [`encode_manufacturer`].
pub fn decode_manufacturer(value: u16) -> DlmsResult<String> {
    let letters = [(value >> 10) & 0x1F, (value >> 5) & 0x1F, value & 0x1F];
    if value > 0x7FFF || letters.iter().any(|c| *c == 0 || *c > 26) {
        return Err(DlmsError::InvalidData(format!(
            "0x{:04X} is not a manufacturer code",
            value
        )));
    }
    Ok(letters.iter().map(|c| char::from(*c as u8 + 0x40)).collect())
}

/// System Title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SystemTitle {
    value: [u8; 8],
}

impl SystemTitle {
    pub fn new(bytes: [u8; 8]) -> Self {
        Self { value: bytes }
    }

    /// Create System Title from a slice of exactly 8 bytes
    pub fn from_slice(bytes: &[u8]) -> DlmsResult<Self> {
        if bytes.len() != 8 {
            return Err(DlmsError::InvalidSystemTitle(format!(
                "System Title must be 8 bytes, got {}",
                bytes.len()
            )));
        }
        let mut value = [0u8; 8];
        value.copy_from_slice(bytes);
        Ok(Self { value })
    }

    /// Build a system title from a FLAG ID and a 5-byte serial.
    pub fn from_manufacturer(flag: &str, serial: u64) -> DlmsResult<Self> {
        encode_manufacturer(flag)?;
        if serial > 0xFF_FFFF_FFFF {
            return Err(DlmsError::InvalidSystemTitle(format!(
                "serial {} does not fit in 5 bytes",
                serial
            )));
        }
        let mut value = [0u8; 8];
        value[..3].copy_from_slice(flag.as_bytes());
        value[3..].copy_from_slice(&serial.to_be_bytes()[3..]);
        Ok(Self { value })
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.value
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.value
    }

    /// FLAG ID in the first three bytes, if they are letters
    pub fn manufacturer(&self) -> Option<String> {
        let flag = &self.value[..3];
        flag.iter()
            .all(u8::is_ascii_uppercase)
            .then(|| String::from_utf8_lossy(flag).into_owned())
    }

    /// Manufacturer specific part
    pub fn serial(&self) -> u64 {
        self.value[3..]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    /// Certificate subject naming this system title
    pub fn to_subject(&self) -> String {
        format!("CN={}", to_hex(&self.value, false))
    }

    /// System title named by the `CN` of a certificate subject.
    pub fn from_subject(subject: &str) -> DlmsResult<Self> {
        let cn = subject
            .split(',')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("CN="))
            .ok_or_else(|| DlmsError::InvalidSystemTitle(format!("no CN in '{}'", subject)))?;
        if cn.len() != 16 {
            return Err(DlmsError::InvalidSystemTitle(format!(
                "CN '{}' is not 16 hex digits",
                cn
            )));
        }
        Self::from_slice(&hex_to_bytes(cn)?)
    }
}

impl fmt::Display for SystemTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.value, false))
    }
}

/// Identifier of a derived key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// Global unicast encryption key
    GlobalUnicastEncryptionKey = 0,
    /// Global broadcast encryption key
    GlobalBroadcastEncryptionKey = 1,
    /// Authentication key
    AuthenticationKey = 2,
}

impl KeyId {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> DlmsResult<Self> {
        match id {
            0 => Ok(KeyId::GlobalUnicastEncryptionKey),
            1 => Ok(KeyId::GlobalBroadcastEncryptionKey),
            2 => Ok(KeyId::AuthenticationKey),
            _ => Err(DlmsError::UnknownEnum(format!("key id {}", id))),
        }
    }
}

/// Key Derivation Function (KDF)
///
/// # Supported Key Lengths
/// - AES-128: 16-byte master key
/// - AES-192: 24-byte master key
/// - AES-256: 32-byte master key
///
/// The derived key is always one AES block (16 bytes).
pub struct KeyDerivationFunction;

impl KeyDerivationFunction {
    /// Derive a key from the master key.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the master key is not 16, 24 or 32 bytes.
    ///
    /// # Example
    /// ```
    /// use dlms_security::system_title::{KeyDerivationFunction, KeyId, SystemTitle};
    ///
    /// let master_key = [0u8; 16];
    /// let system_title = SystemTitle::new([1, 2, 3, 4, 5, 6, 7, 8]);
    /// let derived_key = KeyDerivationFunction::derive_key(
    ///     &master_key,
    ///     &system_title,
    ///     KeyId::GlobalUnicastEncryptionKey,
    /// ).unwrap();
    /// assert_eq!(derived_key.len(), 16);
    /// ```
    pub fn derive_key(
        master_key: &[u8],
        system_title: &SystemTitle,
        key_id: KeyId,
    ) -> DlmsResult<Vec<u8>> {
        let cipher = AesBlock::new(master_key)?;
        let mut block = [0u8; 16];
        block[..8].copy_from_slice(system_title.as_bytes());
        block[8] = key_id.id();
        cipher.encrypt(&mut block);
        Ok(block.to_vec())
    }

    pub fn derive_unicast_encryption_key(
        master_key: &[u8],
        system_title: &SystemTitle,
    ) -> DlmsResult<Vec<u8>> {
        Self::derive_key(master_key, system_title, KeyId::GlobalUnicastEncryptionKey)
    }

    pub fn derive_broadcast_encryption_key(
        master_key: &[u8],
        system_title: &SystemTitle,
    ) -> DlmsResult<Vec<u8>> {
        Self::derive_key(master_key, system_title, KeyId::GlobalBroadcastEncryptionKey)
    }

    pub fn derive_authentication_key(
        master_key: &[u8],
        system_title: &SystemTitle,
    ) -> DlmsResult<Vec<u8>> {
        Self::derive_key(master_key, system_title, KeyId::AuthenticationKey)
    }
}
