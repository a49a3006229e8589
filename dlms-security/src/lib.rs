//! Security layer for DLMS/COSEM
//!
//! This crate provides the cryptography of a DLMS association:
//! - AES-GCM ciphering of APDUs and GMAC authentication ([`encryption`])
//! - AES key wrap for key transport ([`key_wrap`])
//! - ECDSA and ECDH on P-256 and P-384 ([`ecdsa`], [`ecdh`])
//! - keys, PKCS #8, PKCS #10 and X.509 certificates with PEM armour
//! - the ciphering state of an association ([`cipher`])
//! - high level authentication and challenges ([`authentication`])

pub mod authentication;
pub mod block;
pub mod cipher;
pub mod ecc;
pub mod ecdh;
pub mod ecdsa;
pub mod encryption;
pub mod error;
pub mod key_wrap;
pub mod keys;
pub mod pem;
pub mod pkcs10;
pub mod pkcs8;
pub mod suite;
pub mod system_title;
pub mod x509;

pub use authentication::{generate_challenge, secure, verify};
pub use cipher::Cipher;
pub use ecc::{EccCurve, EccPoint};
pub use ecdh::{Ecdh, Kdf, KdfAlgorithm};
pub use ecdsa::Ecdsa;
pub use encryption::{AesGcmParameter, Deciphered, decrypt, encrypt};
pub use error::{DlmsError, DlmsResult};
pub use keys::{PrivateKey, PublicKey};
pub use pkcs10::Pkcs10;
pub use pkcs8::Pkcs8;
pub use suite::{
    Authentication, CertificateType, CountType, KeyType, KeyUsage, Security, SecurityPolicy,
    SecuritySuite, SignCipherOrder, Signing,
};
pub use system_title::{KeyDerivationFunction, KeyId, SystemTitle};
pub use x509::{CertificateBuilder, X509Certificate};
