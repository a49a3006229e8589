//! Core types and utilities for DLMS/COSEM protocol
//!
//! This crate provides the byte buffer, the DLMS data value model, the
//! date/time value and the error type shared by the codec, security and
//! session crates.

pub mod access_result;
pub mod byte_buffer;
pub mod datatypes;
pub mod error;
pub mod helpers;
pub mod obis_code;

pub use access_result::DataAccessResult;
pub use byte_buffer::ByteBuffer;
pub use datatypes::*;
pub use error::{DlmsError, DlmsResult};
pub use obis_code::ObisCode;
