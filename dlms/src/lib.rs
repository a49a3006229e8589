//! DLMS/COSEM protocol core
//!
//! This library brings together the layers a DLMS/COSEM client or server
//! is built on. It does no I/O; transports feed it bytes.
//!
//! # Architecture
//!
//! - `dlms-core`: byte buffer, data values, date/time, OBIS codes, errors
//! - `dlms-asn1`: A-XDR and BER codecs, OID tables, translator sink
//! - `dlms-security`: AES-GCM, key wrap, ECDSA/ECDH, keys and certificates
//! - `dlms-session`: session settings, HDLC sequencing, ciphered envelopes
//!
//! # Usage
//!
//! ```
//! use dlms::security::{Cipher, Security};
//! use dlms::session::{Settings, cipher_pdu};
//!
//! let mut settings = Settings::new(false);
//! let mut cipher = Cipher::new(b"MMM00001").unwrap();
//! cipher.set_security(Security::AuthenticationEncryption);
//! settings.set_cipher(Some(cipher));
//! let apdu = cipher_pdu(&mut settings, &[0xC0, 0x01, 0xC1]).unwrap();
//! assert_eq!(apdu[0], 0xC8);
//! ```

// Re-export core types
pub use dlms_core::{ByteBuffer, DataAccessResult, DlmsError, DlmsResult, ObisCode};
pub use dlms_core::datatypes::*;

pub mod helpers {
    pub use dlms_core::helpers::*;
}

// Re-export codecs
pub mod asn1 {
    pub use dlms_asn1::*;
}

// Re-export security layer
pub mod security {
    pub use dlms_security::*;
}

// Re-export session layer
pub mod session {
    pub use dlms_session::*;
}
