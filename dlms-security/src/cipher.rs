//! Ciphering state of one DLMS association

use crate::encryption::AesGcmParameter;
use crate::error::{DlmsError, DlmsResult};
use crate::keys::{PrivateKey, PublicKey};
use crate::suite::{
    CertificateType, KeyType, Security, SecurityPolicy, SecuritySuite, SignCipherOrder, Signing,
};
use crate::system_title::SystemTitle;
use crate::x509::X509Certificate;
use dlms_core::helpers::to_hex;
use log::debug;
use std::collections::HashMap;

/// Default block cipher key of the Green Book examples
pub const DEFAULT_BLOCK_CIPHER_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];

/// Default authentication key of the Green Book examples
pub const DEFAULT_AUTHENTICATION_KEY: [u8; 16] = [
    0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF,
];

fn check_key(name: &str, key: &[u8]) -> DlmsResult<()> {
    match key.len() {
        16 | 32 => Ok(()),
        n => Err(DlmsError::InvalidKey(format!(
            "{} must be 16 or 32 bytes, got {}",
            name, n
        ))),
    }
}

/// Keys, titles and counters used to secure APDUs
#[derive(Debug, Clone)]
pub struct Cipher {
    security: Security,
    security_suite: SecuritySuite,
    security_policy: SecurityPolicy,
    system_title: Option<SystemTitle>,
    recipient_system_title: Option<SystemTitle>,
    block_cipher_key: Vec<u8>,
    broadcast_block_cipher_key: Option<Vec<u8>>,
    authentication_key: Vec<u8>,
    dedicated_key: Option<Vec<u8>>,
    transaction_id: Option<[u8; 8]>,
    invocation_counter: u32,
    signing: Signing,
    sign_cipher_order: SignCipherOrder,
    key_pairs: HashMap<KeyType, (PrivateKey, PublicKey)>,
    certificates: Vec<X509Certificate>,
}

impl Default for Cipher {
    fn default() -> Self {
        Self {
            security: Security::None,
            security_suite: SecuritySuite::Suite0,
            security_policy: SecurityPolicy::empty(),
            system_title: None,
            recipient_system_title: None,
            block_cipher_key: DEFAULT_BLOCK_CIPHER_KEY.to_vec(),
            broadcast_block_cipher_key: None,
            authentication_key: DEFAULT_AUTHENTICATION_KEY.to_vec(),
            dedicated_key: None,
            transaction_id: None,
            invocation_counter: 0,
            signing: Signing::None,
            sign_cipher_order: SignCipherOrder::CipherThenSign,
            key_pairs: HashMap::new(),
            certificates: Vec::new(),
        }
    }
}

impl Cipher {
    /// Cipher with the default keys and the given own system title.
    pub fn new(system_title: &[u8]) -> DlmsResult<Self> {
        let mut cipher = Self::default();
        cipher.set_system_title(Some(system_title))?;
        Ok(cipher)
    }

    pub fn security(&self) -> Security {
        self.security
    }

    pub fn set_security(&mut self, security: Security) {
        self.security = security;
    }

    pub fn security_suite(&self) -> SecuritySuite {
        self.security_suite
    }

    pub fn set_security_suite(&mut self, suite: SecuritySuite) {
        self.security_suite = suite;
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    pub fn set_security_policy(&mut self, policy: SecurityPolicy) {
        self.security_policy = policy;
    }

    pub fn system_title(&self) -> Option<&SystemTitle> {
        self.system_title.as_ref()
    }

    pub fn set_system_title(&mut self, value: Option<&[u8]>) -> DlmsResult<()> {
        self.system_title = value.map(SystemTitle::from_slice).transpose()?;
        Ok(())
    }

    /// System title of the peer
    pub fn recipient_system_title(&self) -> Option<&SystemTitle> {
        self.recipient_system_title.as_ref()
    }

    pub fn set_recipient_system_title(&mut self, value: Option<&[u8]>) -> DlmsResult<()> {
        self.recipient_system_title = value.map(SystemTitle::from_slice).transpose()?;
        Ok(())
    }

    pub fn block_cipher_key(&self) -> &[u8] {
        &self.block_cipher_key
    }

    pub fn set_block_cipher_key(&mut self, key: &[u8]) -> DlmsResult<()> {
        check_key("block cipher key", key)?;
        self.block_cipher_key = key.to_vec();
        Ok(())
    }

    pub fn broadcast_block_cipher_key(&self) -> Option<&[u8]> {
        self.broadcast_block_cipher_key.as_deref()
    }

    pub fn set_broadcast_block_cipher_key(&mut self, key: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(key) = key {
            check_key("broadcast block cipher key", key)?;
        }
        self.broadcast_block_cipher_key = key.map(<[u8]>::to_vec);
        Ok(())
    }

    pub fn authentication_key(&self) -> &[u8] {
        &self.authentication_key
    }

    pub fn set_authentication_key(&mut self, key: &[u8]) -> DlmsResult<()> {
        check_key("authentication key", key)?;
        self.authentication_key = key.to_vec();
        Ok(())
    }

    /// Session key agreed in the AARQ, used instead of the block cipher key
    pub fn dedicated_key(&self) -> Option<&[u8]> {
        self.dedicated_key.as_deref()
    }

    pub fn set_dedicated_key(&mut self, key: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(key) = key {
            check_key("dedicated key", key)?;
        }
        self.dedicated_key = key.map(<[u8]>::to_vec);
        Ok(())
    }

    pub fn transaction_id(&self) -> Option<&[u8; 8]> {
        self.transaction_id.as_ref()
    }

    pub fn set_transaction_id(&mut self, value: Option<&[u8]>) -> DlmsResult<()> {
        self.transaction_id = match value {
            None => None,
            Some(id) => Some(id.try_into().map_err(|_| {
                DlmsError::InvalidData(format!("transaction id must be 8 bytes, got {}", id.len()))
            })?),
        };
        Ok(())
    }

    pub fn invocation_counter(&self) -> u32 {
        self.invocation_counter
    }

    pub fn set_invocation_counter(&mut self, value: u32) {
        self.invocation_counter = value;
    }

    /// Return the counter to use for the next PDU and advance it.
    pub fn next_invocation_counter(&mut self) -> DlmsResult<u32> {
        let current = self.invocation_counter;
        self.invocation_counter = current.checked_add(1).ok_or_else(|| {
            DlmsError::Security("invocation counter is exhausted".to_string())
        })?;
        Ok(current)
    }

    pub fn signing(&self) -> Signing {
        self.signing
    }

    pub fn set_signing(&mut self, signing: Signing) {
        self.signing = signing;
    }

    pub fn sign_cipher_order(&self) -> SignCipherOrder {
        self.sign_cipher_order
    }

    pub fn set_sign_cipher_order(&mut self, order: SignCipherOrder) {
        self.sign_cipher_order = order;
    }

    pub fn key_pair(&self, key_type: KeyType) -> Option<&(PrivateKey, PublicKey)> {
        self.key_pairs.get(&key_type)
    }

    /// Store a key pair; the public key must belong to the private one.
    pub fn set_key_pair(
        &mut self,
        key_type: KeyType,
        private_key: PrivateKey,
        public_key: PublicKey,
    ) -> DlmsResult<()> {
        if private_key.public_key()? != public_key {
            return Err(DlmsError::InvalidKey(format!(
                "{:?} public key does not match the private key",
                key_type
            )));
        }
        self.key_pairs.insert(key_type, (private_key, public_key));
        Ok(())
    }

    pub fn remove_key_pair(&mut self, key_type: KeyType) -> Option<(PrivateKey, PublicKey)> {
        self.key_pairs.remove(&key_type)
    }

    pub fn certificates(&self) -> &[X509Certificate] {
        &self.certificates
    }

    /// Add a certificate, replacing one with the same subject and type.
    pub fn add_certificate(&mut self, certificate: X509Certificate) {
        self.certificates.retain(|c| {
            c.subject() != certificate.subject()
                || c.certificate_type() != certificate.certificate_type()
        });
        self.certificates.push(certificate);
    }

    /// Certificate of `system_title` for the given use.
    pub fn find_certificate(
        &self,
        system_title: &SystemTitle,
        certificate_type: CertificateType,
    ) -> Option<&X509Certificate> {
        self.certificates.iter().find(|c| {
            c.certificate_type() == certificate_type && c.system_title().as_ref() == Some(system_title)
        })
    }

    /// Parameters for ciphering with the current counter.
    ///
    /// The dedicated key is used when one is set and `broadcast` is false.
    pub fn aes_gcm_parameter(&self, security: Security, broadcast: bool) -> DlmsResult<AesGcmParameter> {
        let title = self.system_title.ok_or_else(|| {
            DlmsError::InvalidSystemTitle("own system title is not set".to_string())
        })?;
        let key = if broadcast {
            self.broadcast_block_cipher_key
                .as_deref()
                .unwrap_or(&self.block_cipher_key)
        } else {
            self.dedicated_key.as_deref().unwrap_or(&self.block_cipher_key)
        };
        let mut p = AesGcmParameter::new(
            security,
            self.security_suite,
            self.invocation_counter,
            title.as_slice(),
            key,
            &self.authentication_key,
        );
        p.broadcast = broadcast;
        Ok(p)
    }

    /// Parameters for deciphering a PDU sent by the peer.
    pub fn peer_aes_gcm_parameter(&self) -> DlmsResult<AesGcmParameter> {
        let title = self.recipient_system_title.ok_or_else(|| {
            DlmsError::InvalidSystemTitle("recipient system title is not set".to_string())
        })?;
        let key = self.dedicated_key.as_deref().unwrap_or(&self.block_cipher_key);
        Ok(AesGcmParameter::new(
            self.security,
            self.security_suite,
            0,
            title.as_slice(),
            key,
            &self.authentication_key,
        ))
    }

    /// Back to an unsecured association: keys stay, session state goes.
    pub fn reset(&mut self) {
        debug!(
            "Resetting cipher of {}",
            self.system_title
                .map(|t| to_hex(t.as_slice(), false))
                .unwrap_or_default()
        );
        self.security = Security::None;
        self.signing = Signing::None;
        self.dedicated_key = None;
        self.transaction_id = None;
        self.recipient_system_title = None;
        self.invocation_counter = 0;
    }
}
