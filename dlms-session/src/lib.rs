//! Session state of a DLMS/COSEM association
//!
//! - [`Settings`]: negotiated limits, HDLC frame sequence, challenges and
//!   the invocation counter check of one client or server session
//! - [`envelope`]: glo-/ded-/general ciphering and general signing of APDUs
//! - [`Conformance`]: proposed and negotiated conformance block
//! - [`ObjectList`]: lookup of the objects an association exposes

pub mod conformance;
pub mod envelope;
pub mod error;
pub mod hdlc;
pub mod object_list;
pub mod settings;

pub use conformance::Conformance;
pub use envelope::{GeneralSigning, cipher_pdu, decipher_pdu, protect, sign_pdu, unprotect, verify_signed_pdu};
pub use error::{DlmsError, DlmsResult};
pub use object_list::{ObjectCollection, ObjectEntry, ObjectList};
pub use settings::{
    CIPHERING_HEADER_SIZE, ConnectionState, Gateway, InterfaceType, Settings, SettingsConfig,
};
