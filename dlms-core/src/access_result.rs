//! Data access result codes returned by a server

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a Get/Set/Action access as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataAccessResult {
    Success = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    ObjectUndefined = 4,
    ObjectClassInconsistent = 9,
    ObjectUnavailable = 11,
    TypeUnmatched = 12,
    ScopeOfAccessViolated = 13,
    DataBlockUnavailable = 14,
    LongGetAborted = 15,
    NoLongGetInProgress = 16,
    LongSetAborted = 17,
    NoLongSetInProgress = 18,
    DataBlockNumberInvalid = 19,
    OtherReason = 250,
}

impl DataAccessResult {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        use DataAccessResult::*;
        Ok(match value {
            0 => Success,
            1 => HardwareFault,
            2 => TemporaryFailure,
            3 => ReadWriteDenied,
            4 => ObjectUndefined,
            9 => ObjectClassInconsistent,
            11 => ObjectUnavailable,
            12 => TypeUnmatched,
            13 => ScopeOfAccessViolated,
            14 => DataBlockUnavailable,
            15 => LongGetAborted,
            16 => NoLongGetInProgress,
            17 => LongSetAborted,
            18 => NoLongSetInProgress,
            19 => DataBlockNumberInvalid,
            250 => OtherReason,
            other => {
                return Err(DlmsError::UnknownEnum(format!(
                    "data access result {}",
                    other
                )));
            }
        })
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn is_success(self) -> bool {
        self == DataAccessResult::Success
    }
}

impl fmt::Display for DataAccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DataAccessResult::Success => "success",
            DataAccessResult::HardwareFault => "hardware-fault",
            DataAccessResult::TemporaryFailure => "temporary-failure",
            DataAccessResult::ReadWriteDenied => "read-write-denied",
            DataAccessResult::ObjectUndefined => "object-undefined",
            DataAccessResult::ObjectClassInconsistent => "object-class-inconsistent",
            DataAccessResult::ObjectUnavailable => "object-unavailable",
            DataAccessResult::TypeUnmatched => "type-unmatched",
            DataAccessResult::ScopeOfAccessViolated => "scope-of-access-violated",
            DataAccessResult::DataBlockUnavailable => "data-block-unavailable",
            DataAccessResult::LongGetAborted => "long-get-aborted",
            DataAccessResult::NoLongGetInProgress => "no-long-get-in-progress",
            DataAccessResult::LongSetAborted => "long-set-aborted",
            DataAccessResult::NoLongSetInProgress => "no-long-set-in-progress",
            DataAccessResult::DataBlockNumberInvalid => "data-block-number-invalid",
            DataAccessResult::OtherReason => "other-reason",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(DataAccessResult::from_u8(0).unwrap(), DataAccessResult::Success);
        assert_eq!(DataAccessResult::from_u8(250).unwrap(), DataAccessResult::OtherReason);
        assert_eq!(DataAccessResult::ObjectUnavailable.to_u8(), 11);
        assert!(DataAccessResult::from_u8(5).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataAccessResult::ReadWriteDenied.to_string(), "read-write-denied");
    }
}
