//! Logical names of COSEM objects

use crate::datatypes::DataObject;
use crate::error::{DlmsError, DlmsResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// A.B.C.D.E.F
static DOTTED: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$")
});

// A-B:C.D.E*F, F optional
static EXTENDED: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:\*(\d{1,3}))?$")
});

/// OBIS code: the six value groups naming a COSEM object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObisCode {
    groups: [u8; 6],
}

impl ObisCode {
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            groups: [a, b, c, d, e, f],
        }
    }

    /// Parse `"1.0.1.8.0.255"` or `"1-0:1.8.0*255"`; a missing `*F` means 255.
    pub fn from_string(text: &str) -> DlmsResult<Self> {
        let text = text.trim();
        for pattern in [&DOTTED, &EXTENDED] {
            let re = pattern
                .as_ref()
                .map_err(|e| DlmsError::InvalidData(e.to_string()))?;
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let mut groups = [0xFFu8; 6];
            for (i, slot) in groups.iter_mut().enumerate() {
                if let Some(m) = caps.get(i + 1) {
                    *slot = m.as_str().parse().map_err(|_| {
                        DlmsError::InvalidData(format!(
                            "OBIS value group {} out of range in '{}'",
                            i, text
                        ))
                    })?;
                }
            }
            return Ok(Self { groups });
        }
        Err(DlmsError::InvalidData(format!("invalid OBIS code '{}'", text)))
    }

    /// Logical name as carried in an A-XDR octet string.
    pub fn from_bytes(bytes: &[u8]) -> DlmsResult<Self> {
        let groups: [u8; 6] = bytes.try_into().map_err(|_| {
            DlmsError::InvalidData(format!("logical name must be 6 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { groups })
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.groups
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        self.groups
    }

    /// Value group by index, 0 for A through 5 for F.
    pub fn group(&self, index: usize) -> Option<u8> {
        self.groups.get(index).copied()
    }

    pub fn a(&self) -> u8 {
        self.groups[0]
    }

    pub fn b(&self) -> u8 {
        self.groups[1]
    }

    pub fn c(&self) -> u8 {
        self.groups[2]
    }

    pub fn d(&self) -> u8 {
        self.groups[3]
    }

    pub fn e(&self) -> u8 {
        self.groups[4]
    }

    pub fn f(&self) -> u8 {
        self.groups[5]
    }

    /// `A-B:C.D.E*F` form used on meter displays and in documentation.
    pub fn to_extended_string(&self) -> String {
        let [a, b, c, d, e, f] = self.groups;
        format!("{}-{}:{}.{}.{}*{}", a, b, c, d, e, f)
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.groups;
        write!(f, "{}.{}.{}.{}.{}.{}", a, b, c, d, e, g)
    }
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl TryFrom<&DataObject> for ObisCode {
    type Error = DlmsError;

    fn try_from(value: &DataObject) -> Result<Self, Self::Error> {
        match value {
            DataObject::OctetString(bytes) => Self::from_bytes(bytes),
            other => Err(DlmsError::mismatch(other.data_type().name(), "ObisCode")),
        }
    }
}

impl From<ObisCode> for DataObject {
    fn from(code: ObisCode) -> Self {
        DataObject::OctetString(code.groups.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        let code: ObisCode = "1.0.1.8.0.255".parse().unwrap();
        assert_eq!(code, ObisCode::new(1, 0, 1, 8, 0, 255));
        assert_eq!(ObisCode::from_string("1-0:1.8.0*255").unwrap(), code);
        assert_eq!(
            ObisCode::from_string(" 0-0:96.1.0 ").unwrap(),
            ObisCode::new(0, 0, 96, 1, 0, 255)
        );
        assert!(ObisCode::from_string("1-0:1.8").is_err());
        assert!(ObisCode::from_string("1-0:1.8.0*256").is_err());
        assert!(ObisCode::from_string("1.0.1.8.0").is_err());
    }

    #[test]
    fn test_formatting() {
        let code = ObisCode::new(0, 0, 40, 0, 0, 255);
        assert_eq!(code.to_string(), "0.0.40.0.0.255");
        assert_eq!(code.to_extended_string(), "0-0:40.0.0*255");
        assert_eq!(code.group(2), Some(40));
        assert_eq!(code.group(6), None);
    }

    #[test]
    fn test_octet_string_conversion() {
        let code = ObisCode::new(0, 0, 1, 0, 0, 255);
        let value = DataObject::from(code);
        assert_eq!(ObisCode::try_from(&value).unwrap(), code);
        assert!(ObisCode::from_bytes(&[0, 0, 40]).is_err());
        assert!(ObisCode::try_from(&DataObject::Boolean(true)).is_err());
    }
}
