//! A-XDR decoding state

use dlms_core::datatypes::{DataObject, DataType};

/// Progress of one `get_data` call
///
/// Set `data_type` up front when the type is known from context (the body
/// then carries no tag). After an incomplete array decode, pass the same
/// `DataInfo` back in once more bytes have arrived: `count`, `index` and
/// the already decoded elements let the decoder continue where it stopped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataInfo {
    /// Index of the next array element to decode
    pub index: usize,
    /// Element count of the array being decoded, 0 before it is read
    pub count: usize,
    /// Type known from context, `None` when the body starts with a tag
    pub data_type: Option<DataType>,
    /// `false` when the decoder ran out of bytes
    pub complete: bool,
    /// Elements decoded before an incomplete stop
    pub(crate) partial: Vec<DataObject>,
    /// Array type whose header was consumed before an incomplete stop
    pub(crate) resume_type: Option<DataType>,
}

impl DataInfo {
    pub fn new() -> Self {
        Self {
            complete: true,
            ..Default::default()
        }
    }

    /// Decode a body whose type is already known.
    pub fn with_type(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            ..Self::new()
        }
    }

    /// Whether an earlier call stopped inside an array.
    pub fn is_resuming(&self) -> bool {
        !self.complete && self.resume_type.is_some()
    }

    /// Number of elements decoded so far by an unfinished array decode.
    pub fn decoded(&self) -> usize {
        self.partial.len()
    }

    /// Forget all progress. The known type is kept.
    pub fn clear(&mut self) {
        *self = Self {
            data_type: self.data_type,
            ..Self::new()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_complete() {
        let info = DataInfo::new();
        assert!(info.complete);
        assert!(!info.is_resuming());
        assert_eq!(DataInfo::with_type(DataType::UInt8).data_type, Some(DataType::UInt8));
    }
}
