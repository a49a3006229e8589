//! BER (Basic Encoding Rules) encoder and decoder for ASN.1
//!
//! Certificates, key containers and association requests are parsed into an
//! arena ([`Asn1Tree`]) whose nodes are addressed by [`NodeId`]. Parsing a
//! well formed DER document and encoding the root again gives back the same
//! bytes, which is what signature checks over `tbsCertificate` rely on.
//!
//! Only definite lengths and single byte tags (numbers 0-30) are accepted.

pub mod decoder;
pub mod encoder;
pub mod oid;
pub mod subject;
pub mod tree;
pub mod types;

pub use decoder::{BerDecoder, parse};
pub use encoder::{BerEncoder, encode};
pub use oid::{HashAlgorithm, KeyPurpose, Oid, PkcsObjectIdentifier, X509Extension, X509Name, X9ObjectIdentifier};
pub use subject::{encode_subject, parse_subject, subject_to_string};
pub use tree::{Asn1Integer, Asn1Node, Asn1Time, Asn1Tree, Asn1Value, NodeId, TaggedContent};
pub use types::{BerLength, BerTag, BerTagClass};
