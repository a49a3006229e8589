//! Security enumerations for DLMS/COSEM
//!
//! Security level, security suite, policy, signing mode and the
//! certificate related enums used by the cipher state.

use crate::error::{DlmsError, DlmsResult};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bit set in the security control byte for broadcast keys
pub const BROADCAST: u8 = 0x40;
/// Bit set in the security control byte when the payload is compressed
pub const COMPRESSION: u8 = 0x80;

/// Security level of a ciphered APDU
///
/// The value is the bit pattern used in the security control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Security {
    /// Plain transport
    #[default]
    None = 0,
    /// Messages are authenticated
    Authentication = 0x10,
    /// Messages are encrypted
    Encryption = 0x20,
    /// Messages are authenticated and encrypted
    AuthenticationEncryption = 0x30,
}

impl Security {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Security level from the bits 4 and 5 of a security control byte.
    pub fn from_control(sc: u8) -> Self {
        match sc & 0x30 {
            0x10 => Security::Authentication,
            0x20 => Security::Encryption,
            0x30 => Security::AuthenticationEncryption,
            _ => Security::None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Security::Authentication | Security::AuthenticationEncryption)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Security::Encryption | Security::AuthenticationEncryption)
    }
}

/// Security suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecuritySuite {
    /// AES-GCM-128, AES-128 key wrap
    #[default]
    Suite0 = 0,
    /// AES-GCM-128, ECDH P-256, ECDSA P-256, SHA-256
    Suite1 = 1,
    /// AES-GCM-256, ECDH P-384, ECDSA P-384, SHA-384
    Suite2 = 2,
}

impl SecuritySuite {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> DlmsResult<Self> {
        match id {
            0 => Ok(SecuritySuite::Suite0),
            1 => Ok(SecuritySuite::Suite1),
            2 => Ok(SecuritySuite::Suite2),
            _ => Err(DlmsError::UnknownEnum(format!("security suite {}", id))),
        }
    }

    /// Length of block cipher keys in bytes
    pub fn key_len(&self) -> usize {
        match self {
            SecuritySuite::Suite2 => 32,
            _ => 16,
        }
    }
}

bitflags! {
    /// Security policy of the Security Setup object (version 1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SecurityPolicy: u8 {
        const AUTHENTICATED_REQUEST = 0x04;
        const ENCRYPTED_REQUEST = 0x08;
        const DIGITALLY_SIGNED_REQUEST = 0x10;
        const AUTHENTICATED_RESPONSE = 0x20;
        const ENCRYPTED_RESPONSE = 0x40;
        const DIGITALLY_SIGNED_RESPONSE = 0x80;
    }
}

/// How ciphered APDUs are signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Signing {
    #[default]
    None,
    /// Ephemeral key agreement, one pass Diffie-Hellman C(1e, 1s)
    OnePassDiffieHellman,
    /// Static key agreement, C(0e, 2s)
    StaticUnifiedModel,
    /// General signing with ECDSA
    GeneralSigning,
}

/// Order of signing and ciphering when both are used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignCipherOrder {
    /// The APDU is ciphered first and the ciphered APDU is signed
    #[default]
    CipherThenSign,
    /// The APDU is signed first and the signed APDU is ciphered
    SignThenCipher,
}

/// Authentication mechanism of the association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Authentication {
    #[default]
    None = 0,
    /// Shared password
    Low = 1,
    /// Manufacturer specific high level authentication (AES-ECB)
    High = 2,
    HighMd5 = 3,
    HighSha1 = 4,
    HighGmac = 5,
    HighSha256 = 6,
    HighEcdsa = 7,
}

impl Authentication {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> DlmsResult<Self> {
        Ok(match id {
            0 => Authentication::None,
            1 => Authentication::Low,
            2 => Authentication::High,
            3 => Authentication::HighMd5,
            4 => Authentication::HighSha1,
            5 => Authentication::HighGmac,
            6 => Authentication::HighSha256,
            7 => Authentication::HighEcdsa,
            _ => return Err(DlmsError::UnknownEnum(format!("authentication {}", id))),
        })
    }

    /// High level authentication uses a challenge exchange.
    pub fn is_high(&self) -> bool {
        !matches!(self, Authentication::None | Authentication::Low)
    }

    fn name(&self) -> &'static str {
        match self {
            Authentication::None => "None",
            Authentication::Low => "Low",
            Authentication::High => "High",
            Authentication::HighMd5 => "HighMD5",
            Authentication::HighSha1 => "HighSHA1",
            Authentication::HighGmac => "HighGMAC",
            Authentication::HighSha256 => "HighSHA256",
            Authentication::HighEcdsa => "HighECDSA",
        }
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Authentication {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        (0..=7)
            .filter_map(|id| Authentication::from_id(id).ok())
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DlmsError::UnknownEnum(format!("authentication '{}'", s)))
    }
}

/// Purpose of a key pair held by the cipher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    DigitalSignature,
    KeyAgreement,
    Tls,
    Ephemeral,
}

/// Certificate entity type of the Security Setup object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateType {
    DigitalSignature = 0,
    KeyAgreement = 1,
    Tls = 2,
    Other = 3,
}

impl CertificateType {
    pub fn from_id(id: u8) -> DlmsResult<Self> {
        match id {
            0 => Ok(CertificateType::DigitalSignature),
            1 => Ok(CertificateType::KeyAgreement),
            2 => Ok(CertificateType::Tls),
            3 => Ok(CertificateType::Other),
            _ => Err(DlmsError::UnknownEnum(format!("certificate type {}", id))),
        }
    }

    /// Certificate type implied by a `keyUsage` extension.
    pub fn from_key_usage(usage: KeyUsage) -> Self {
        if usage == KeyUsage::DIGITAL_SIGNATURE {
            CertificateType::DigitalSignature
        } else if usage == KeyUsage::KEY_AGREEMENT {
            CertificateType::KeyAgreement
        } else if usage == KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT {
            CertificateType::Tls
        } else {
            CertificateType::Other
        }
    }
}

bitflags! {
    /// X.509 `keyUsage` named bits; bit 0 is the first bit of the string.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KeyUsage: u16 {
        const DIGITAL_SIGNATURE = 0x001;
        const NON_REPUDIATION = 0x002;
        const KEY_ENCIPHERMENT = 0x004;
        const DATA_ENCIPHERMENT = 0x008;
        const KEY_AGREEMENT = 0x010;
        const KEY_CERT_SIGN = 0x020;
        const CRL_SIGN = 0x040;
        const ENCIPHER_ONLY = 0x080;
        const DECIPHER_ONLY = 0x100;
    }
}

bitflags! {
    /// X.509 `extKeyUsage` purposes used by DLMS TLS certificates
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ExtendedKeyUsage: u8 {
        const SERVER_AUTH = 0x01;
        const CLIENT_AUTH = 0x02;
    }
}

/// What the AES-GCM routine emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CountType {
    /// Security control, invocation counter, data and tag
    #[default]
    Packet,
    /// Only the (de)ciphered data
    DataOnly,
    /// Only the authentication tag
    TagOnly,
    /// Data followed by the tag, no header
    DataAndTag,
}

impl CountType {
    pub fn has_tag(&self) -> bool {
        !matches!(self, CountType::DataOnly)
    }

    pub fn has_data(&self) -> bool {
        !matches!(self, CountType::TagOnly)
    }
}

/// Security control byte: level bits, suite nibble, broadcast and compression flags
pub fn security_control(security: Security, suite: SecuritySuite, broadcast: bool) -> u8 {
    let mut sc = security.id() | suite.id();
    if broadcast {
        sc |= BROADCAST;
    }
    sc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_control() {
        assert_eq!(
            security_control(Security::AuthenticationEncryption, SecuritySuite::Suite0, false),
            0x30
        );
        assert_eq!(
            security_control(Security::Authentication, SecuritySuite::Suite2, true),
            0x52
        );
        assert_eq!(Security::from_control(0x31), Security::AuthenticationEncryption);
        assert_eq!(SecuritySuite::from_id(0x31 & 0x0F).unwrap(), SecuritySuite::Suite1);
        assert!(SecuritySuite::from_id(3).is_err());
    }

    #[test]
    fn test_authentication_names() {
        assert_eq!("highgmac".parse::<Authentication>().unwrap(), Authentication::HighGmac);
        assert_eq!(Authentication::HighEcdsa.to_string(), "HighECDSA");
        assert!(Authentication::HighMd5.is_high());
        assert!(!Authentication::Low.is_high());
        assert!("Medium".parse::<Authentication>().is_err());
    }

    #[test]
    fn test_certificate_type_from_key_usage() {
        assert_eq!(
            CertificateType::from_key_usage(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT),
            CertificateType::Tls
        );
        assert_eq!(
            CertificateType::from_key_usage(KeyUsage::KEY_CERT_SIGN),
            CertificateType::Other
        );
    }
}
