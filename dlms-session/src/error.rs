//! Error types of the session layer, shared with the rest of the stack

pub use dlms_core::error::{DlmsError, DlmsResult};
