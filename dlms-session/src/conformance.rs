//! Conformance block of the xDLMS initiate exchange

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Services a client proposes and a server accepts
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Conformance: u32 {
        const RESERVED_ZERO = 0x1;
        const GENERAL_PROTECTION = 0x2;
        const GENERAL_BLOCK_TRANSFER = 0x4;
        const READ = 0x8;
        const WRITE = 0x10;
        const UNCONFIRMED_WRITE = 0x20;
        const DELTA_VALUE_ENCODING = 0x40;
        const RESERVED_SEVEN = 0x80;
        const ATTRIBUTE0_SUPPORTED_WITH_SET = 0x100;
        const PRIORITY_MGMT_SUPPORTED = 0x200;
        const ATTRIBUTE0_SUPPORTED_WITH_GET = 0x400;
        const BLOCK_TRANSFER_WITH_GET_OR_READ = 0x800;
        const BLOCK_TRANSFER_WITH_SET_OR_WRITE = 0x1000;
        const BLOCK_TRANSFER_WITH_ACTION = 0x2000;
        const MULTIPLE_REFERENCES = 0x4000;
        const INFORMATION_REPORT = 0x8000;
        const DATA_NOTIFICATION = 0x10000;
        const ACCESS = 0x20000;
        const PARAMETERIZED_ACCESS = 0x40000;
        const GET = 0x80000;
        const SET = 0x100000;
        const SELECTIVE_ACCESS = 0x200000;
        const EVENT_NOTIFICATION = 0x400000;
        const ACTION = 0x800000;
    }
}

impl Conformance {
    /// Proposed by default with logical name referencing.
    pub fn default_logical_name() -> Self {
        Conformance::BLOCK_TRANSFER_WITH_ACTION
            | Conformance::BLOCK_TRANSFER_WITH_SET_OR_WRITE
            | Conformance::BLOCK_TRANSFER_WITH_GET_OR_READ
            | Conformance::SET
            | Conformance::SELECTIVE_ACCESS
            | Conformance::ACTION
            | Conformance::MULTIPLE_REFERENCES
            | Conformance::GET
            | Conformance::GENERAL_PROTECTION
    }

    /// Proposed by default with short name referencing.
    pub fn default_short_name() -> Self {
        Conformance::INFORMATION_REPORT
            | Conformance::READ
            | Conformance::UNCONFIRMED_WRITE
            | Conformance::WRITE
            | Conformance::PARAMETERIZED_ACCESS
            | Conformance::MULTIPLE_REFERENCES
    }

    /// What both sides support.
    pub fn negotiate(proposed: Conformance, supported: Conformance) -> Conformance {
        proposed & supported
    }

    /// The 3 byte bit string of the initiate request, most significant first.
    pub fn to_bytes(self) -> [u8; 3] {
        let bits = self.bits();
        [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Conformance::from_bits_truncate(
            (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2]),
        )
    }
}
