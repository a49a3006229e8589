//! Data types used in DLMS/COSEM protocol

pub mod bit_string;
pub mod compact_array;
pub mod cosem_date_time;
pub mod data_object;
pub mod data_type;

pub use bit_string::BitString;
pub use compact_array::{CompactArray, TypeDescription};
pub use cosem_date_time::{
    ClockStatus, CodecOptions, CosemDateTime, DateTimeExtraInfo, DateTimeKind, DateTimeSkips,
    LocalePattern, locale_pattern,
};
pub use data_object::DataObject;
pub use data_type::DataType;
