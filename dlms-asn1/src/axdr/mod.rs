//! A-XDR encoding/decoding module

pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod types;

pub use convert::{HostValue, convert};
pub use decoder::{AxdrDecoder, get_data};
pub use encoder::{AxdrEncoder, set_data};
pub use types::DataInfo;

use dlms_core::datatypes::DataType;

/// Body size in bytes of a fixed-width type, `None` for variable length types.
pub fn get_data_type_size(data_type: DataType) -> Option<usize> {
    data_type.size()
}
