//! HDLC control field arithmetic and LLC headers

use crate::error::{DlmsError, DlmsResult};

/// HDLC frame flag
pub const FLAG: u8 = 0x7E;

/// LLC header of a request (client to server)
pub const LLC_REQUEST: [u8; 3] = [0xE6, 0xE6, 0x00];

/// LLC header of a response (server to client)
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

/// SNRM control byte with the poll bit set
pub const SNRM: u8 = 0x93;
/// UA control byte with the final bit set
pub const UA: u8 = 0x73;
/// DISC control byte with the poll bit set
pub const DISC: u8 = 0x53;

/// Poll/final bit of the control field
pub const POLL_FINAL: u8 = 0x10;

/// Smallest and largest information field length
pub const MIN_INFO_LENGTH: u16 = 32;
pub const MAX_INFO_LENGTH: u16 = 2030;
/// Default information field length of both directions
pub const DEFAULT_INFO_LENGTH: u16 = 128;

/// Largest window size; sequence numbers are 3 bits
pub const MAX_WINDOW_SIZE: u8 = 7;

/// Frame class named by the low bits of the control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Numbered information frame, bit 0 clear
    Information,
    /// Supervisory frame, low bits `01`
    Supervisory,
    /// Unnumbered frame, low bits `11`
    Unnumbered,
}

impl FrameClass {
    pub fn from_control_byte(control: u8) -> Self {
        if control & 0x01 == 0 {
            FrameClass::Information
        } else if control & 0x03 == 0x01 {
            FrameClass::Supervisory
        } else {
            FrameClass::Unnumbered
        }
    }
}

/// Advance the receive sequence N(R) and set the poll/final bit.
pub fn increase_receiver_sequence(value: u8) -> u8 {
    (value.wrapping_add(0x20)) | POLL_FINAL | (value & 0x0E)
}

/// Advance the send sequence N(S), keeping the upper nibble.
pub fn increase_send_sequence(value: u8) -> u8 {
    (value & 0xF0) | (value.wrapping_add(2) & 0x0E)
}

/// Initial (sender, receiver) control bytes for a role.
pub fn initial_sequence(is_server: bool) -> (u8, u8) {
    if is_server { (0x1E, 0xEE) } else { (0xFE, 0x0E) }
}

/// LLC header used when sending.
pub fn llc_header(is_server: bool) -> &'static [u8; 3] {
    if is_server { &LLC_RESPONSE } else { &LLC_REQUEST }
}

/// Prefix `pdu` with the LLC header of the sender.
pub fn add_llc(is_server: bool, pdu: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + pdu.len());
    out.extend_from_slice(llc_header(is_server));
    out.extend_from_slice(pdu);
    out
}

/// Strip the LLC header the peer of `is_server` sends.
///
/// A frame without any LLC header is returned as is.
pub fn strip_llc(is_server: bool, data: &[u8]) -> DlmsResult<&[u8]> {
    let expected = llc_header(!is_server);
    match data.get(..3) {
        Some(header) if header == expected => Ok(&data[3..]),
        Some(header) if header[0] == 0xE6 => Err(DlmsError::FrameInvalid(format!(
            "unexpected LLC header {:02X} {:02X} {:02X}",
            header[0], header[1], header[2]
        ))),
        _ => Ok(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_arithmetic() {
        assert_eq!(increase_send_sequence(0x0E), 0x00);
        assert_eq!(increase_receiver_sequence(0x00), 0x30);
        assert_eq!(increase_send_sequence(0xFE), 0xF0);
        assert_eq!(increase_receiver_sequence(0xF0), 0x10);
        assert_eq!(increase_receiver_sequence(increase_send_sequence(0x30)), 0x52);
        assert_eq!(initial_sequence(false), (0xFE, 0x0E));
        assert_eq!(initial_sequence(true), (0x1E, 0xEE));
    }

    #[test]
    fn test_frame_class() {
        assert_eq!(FrameClass::from_control_byte(0x10), FrameClass::Information);
        assert_eq!(FrameClass::from_control_byte(0x31), FrameClass::Supervisory);
        assert_eq!(FrameClass::from_control_byte(SNRM), FrameClass::Unnumbered);
        assert_eq!(FrameClass::from_control_byte(UA), FrameClass::Unnumbered);
    }

    #[test]
    fn test_llc() {
        let framed = add_llc(false, &[0xC0, 0x01]);
        assert_eq!(framed, vec![0xE6, 0xE6, 0x00, 0xC0, 0x01]);
        assert_eq!(strip_llc(true, &framed).unwrap(), &[0xC0, 0x01]);
        assert!(strip_llc(false, &framed).is_err());
        assert_eq!(strip_llc(false, &[0xE6, 0xE7, 0x00, 0xC4]).unwrap(), &[0xC4]);
        assert_eq!(strip_llc(false, &[0xC4, 0x01]).unwrap(), &[0xC4, 0x01]);
    }
}
