//! ASN.1 processing module for DLMS/COSEM protocol
//!
//! Two wire encodings live here: A-XDR for COSEM application data and BER
//! for association requests, keys and certificates. Both decoders can
//! mirror what they read into a [`TranslatorSink`].

pub mod axdr;
pub mod ber;
pub mod error;
pub mod pdu_type;
pub mod translator;

pub use axdr::{AxdrDecoder, AxdrEncoder, DataInfo, HostValue, convert, get_data, set_data};
pub use ber::{Asn1Tree, Asn1Value, BerDecoder, BerEncoder, NodeId, Oid};
pub use error::{DlmsError, DlmsResult};
pub use pdu_type::PduType;
pub use translator::{TranslatorSink, XmlTranslator};
