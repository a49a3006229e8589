//! Per-session settings of a DLMS client or server
//!
//! `Settings` holds everything one association negotiates or counts:
//! - PDU and HDLC limits of both directions
//! - the HDLC send and receive control bytes
//! - proposed and negotiated conformance
//! - challenges, block index and the invocation counter check
//! - the cipher and the object list of the association
//!
//! # Frame sequence
//!
//! The sender and receiver control bytes carry N(S) in bits 1..3 and N(R) in
//! bits 5..7. [`Settings::check_frame`] tracks the receiver byte of every
//! accepted frame so that duplicated or echoed frames are refused.

use crate::conformance::Conformance;
use crate::error::{DlmsError, DlmsResult};
use crate::hdlc::{
    self, FrameClass, MAX_INFO_LENGTH, MAX_WINDOW_SIZE, MIN_INFO_LENGTH, POLL_FINAL, SNRM,
    increase_receiver_sequence, increase_send_sequence,
};
use crate::object_list::{ObjectEntry, ObjectList};
use bitflags::bitflags;
use dlms_core::{CodecOptions, ObisCode};
use dlms_security::authentication::{
    MAX_CHALLENGE_SIZE, MIN_CHALLENGE_SIZE, MIN_ECDSA_CHALLENGE_SIZE, generate_challenge,
};
use dlms_security::{Authentication, Cipher, Security};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default and largest PDU size
pub const DEFAULT_MAX_PDU_SIZE: u16 = 0xFFFF;
/// Smallest PDU size a peer may announce
pub const MIN_PDU_SIZE: u16 = 64;
/// PDU size limit of PLC interfaces
pub const PLC_MAX_PDU_SIZE: u16 = 134;
/// Bytes a ciphered APDU adds: tag, length, security control, invocation counter and GCM tag
pub const CIPHERING_HEADER_SIZE: u16 = 22;
/// DLMS version number of the initiate request
pub const DEFAULT_PROTOCOL_VERSION: u8 = 6;

/// Media the session runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceType {
    #[default]
    Hdlc = 0,
    Wrapper = 1,
    Pdu = 2,
    WirelessMbus = 3,
    HdlcWithModeE = 4,
    Plc = 5,
    PlcHdlc = 6,
    LpWan = 7,
    WiSun = 8,
    PlcPrime = 9,
    WiredMbus = 10,
}

impl InterfaceType {
    pub fn is_plc(&self) -> bool {
        matches!(self, InterfaceType::Plc | InterfaceType::PlcHdlc | InterfaceType::PlcPrime)
    }

    /// Interfaces that carry HDLC frames.
    pub fn is_hdlc(&self) -> bool {
        matches!(
            self,
            InterfaceType::Hdlc | InterfaceType::HdlcWithModeE | InterfaceType::PlcHdlc
        )
    }
}

bitflags! {
    /// Layers established so far; empty when disconnected
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ConnectionState: u8 {
        const HDLC = 0x1;
        const DLMS = 0x2;
        const CIPHERED = 0x4;
        const NOTIFY = 0x8;
    }
}

/// Routing through a data concentrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub network_id: u8,
    #[serde(with = "serde_bytes")]
    pub physical_device_address: Vec<u8>,
}

/// Tunable part of [`Settings`] as plain data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub is_server: bool,
    pub use_logical_name_referencing: bool,
    pub interface_type: InterfaceType,
    pub protocol_version: u8,
    pub max_pdu_size: u16,
    pub max_info_tx: u16,
    pub max_info_rx: u16,
    pub window_size_tx: u8,
    pub window_size_rx: u8,
    pub authentication: Authentication,
    /// Zero disables the replay check
    pub expected_invocation_counter: u32,
    pub use_utc_to_normal_time: bool,
    pub use_custom_challenge: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            is_server: false,
            use_logical_name_referencing: true,
            interface_type: InterfaceType::Hdlc,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_info_tx: hdlc::DEFAULT_INFO_LENGTH,
            max_info_rx: hdlc::DEFAULT_INFO_LENGTH,
            window_size_tx: 1,
            window_size_rx: 1,
            authentication: Authentication::None,
            expected_invocation_counter: 0,
            use_utc_to_normal_time: false,
            use_custom_challenge: false,
        }
    }
}

/// State of one DLMS session
pub struct Settings {
    is_server: bool,
    use_logical_name_referencing: bool,
    interface_type: InterfaceType,
    protocol_version: u8,
    proposed_conformance: Conformance,
    negotiated_conformance: Conformance,
    max_pdu_size: u16,
    max_server_pdu_size: u16,
    max_info_tx: u16,
    max_info_rx: u16,
    window_size_tx: u8,
    window_size_rx: u8,
    ctos_challenge: Option<Vec<u8>>,
    stoc_challenge: Option<Vec<u8>>,
    use_custom_challenge: bool,
    block_index: u32,
    sender_frame: u8,
    receiver_frame: u8,
    authentication: Authentication,
    password: Vec<u8>,
    kek: Option<Vec<u8>>,
    gateway: Option<Gateway>,
    expected_invocation_counter: u32,
    connection_state: ConnectionState,
    codec_options: CodecOptions,
    translator_mode: bool,
    cipher: Option<Cipher>,
    objects: Option<Box<dyn ObjectList>>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("is_server", &self.is_server)
            .field("interface_type", &self.interface_type)
            .field("connection_state", &self.connection_state)
            .field("negotiated_conformance", &self.negotiated_conformance)
            .field("max_pdu_size", &self.max_pdu_size)
            .field("max_server_pdu_size", &self.max_server_pdu_size)
            .field("sender_frame", &format_args!("0x{:02X}", self.sender_frame))
            .field("receiver_frame", &format_args!("0x{:02X}", self.receiver_frame))
            .field("authentication", &self.authentication)
            .field("cipher", &self.cipher.is_some())
            .field("objects", &self.objects.is_some())
            .finish_non_exhaustive()
    }
}

fn check_pdu_size(value: u16) -> DlmsResult<()> {
    if value < MIN_PDU_SIZE {
        return Err(DlmsError::InvalidData(format!(
            "PDU size must be at least {}, got {}",
            MIN_PDU_SIZE, value
        )));
    }
    Ok(())
}

impl Settings {
    /// Settings of a client (`is_server == false`) or a server with defaults.
    pub fn new(is_server: bool) -> Self {
        let (sender_frame, receiver_frame) = hdlc::initial_sequence(is_server);
        Self {
            is_server,
            use_logical_name_referencing: true,
            interface_type: InterfaceType::Hdlc,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            proposed_conformance: Conformance::default_logical_name(),
            negotiated_conformance: Conformance::empty(),
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_server_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_info_tx: hdlc::DEFAULT_INFO_LENGTH,
            max_info_rx: hdlc::DEFAULT_INFO_LENGTH,
            window_size_tx: 1,
            window_size_rx: 1,
            ctos_challenge: None,
            stoc_challenge: None,
            use_custom_challenge: false,
            block_index: 1,
            sender_frame,
            receiver_frame,
            authentication: Authentication::None,
            password: Vec::new(),
            kek: None,
            gateway: None,
            expected_invocation_counter: 0,
            connection_state: ConnectionState::empty(),
            codec_options: CodecOptions::default(),
            translator_mode: false,
            cipher: None,
            objects: None,
        }
    }

    /// Settings built from `config`; every value goes through its setter.
    pub fn from_config(config: &SettingsConfig) -> DlmsResult<Self> {
        let mut settings = Self::new(config.is_server);
        settings.set_use_logical_name_referencing(config.use_logical_name_referencing);
        settings.set_interface_type(config.interface_type);
        settings.set_protocol_version(config.protocol_version);
        settings.set_max_pdu_size(config.max_pdu_size)?;
        settings.set_max_info_tx(config.max_info_tx)?;
        settings.set_max_info_rx(config.max_info_rx)?;
        settings.set_window_size_tx(config.window_size_tx)?;
        settings.set_window_size_rx(config.window_size_rx)?;
        settings.set_authentication(config.authentication);
        settings.set_expected_invocation_counter(config.expected_invocation_counter);
        settings.codec_options.use_utc_to_normal_time = config.use_utc_to_normal_time;
        settings.use_custom_challenge = config.use_custom_challenge;
        debug!("Settings loaded: {:?}", settings);
        Ok(settings)
    }

    /// Current tunables as plain data.
    pub fn to_config(&self) -> SettingsConfig {
        SettingsConfig {
            is_server: self.is_server,
            use_logical_name_referencing: self.use_logical_name_referencing,
            interface_type: self.interface_type,
            protocol_version: self.protocol_version,
            max_pdu_size: self.max_pdu_size,
            max_info_tx: self.max_info_tx,
            max_info_rx: self.max_info_rx,
            window_size_tx: self.window_size_tx,
            window_size_rx: self.window_size_rx,
            authentication: self.authentication,
            expected_invocation_counter: self.expected_invocation_counter,
            use_utc_to_normal_time: self.codec_options.use_utc_to_normal_time,
            use_custom_challenge: self.use_custom_challenge,
        }
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn use_logical_name_referencing(&self) -> bool {
        self.use_logical_name_referencing
    }

    /// Switching referencing also switches the proposed conformance to its default.
    pub fn set_use_logical_name_referencing(&mut self, value: bool) {
        if self.use_logical_name_referencing != value {
            self.use_logical_name_referencing = value;
            self.proposed_conformance = if value {
                Conformance::default_logical_name()
            } else {
                Conformance::default_short_name()
            };
        }
    }

    pub fn interface_type(&self) -> InterfaceType {
        self.interface_type
    }

    pub fn set_interface_type(&mut self, value: InterfaceType) {
        self.interface_type = value;
        if value.is_plc() {
            self.max_pdu_size = self.max_pdu_size.min(PLC_MAX_PDU_SIZE);
            self.max_server_pdu_size = self.max_server_pdu_size.min(PLC_MAX_PDU_SIZE);
        }
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn set_protocol_version(&mut self, value: u8) {
        self.protocol_version = value;
    }

    pub fn proposed_conformance(&self) -> Conformance {
        self.proposed_conformance
    }

    pub fn set_proposed_conformance(&mut self, value: Conformance) {
        self.proposed_conformance = value;
    }

    pub fn negotiated_conformance(&self) -> Conformance {
        self.negotiated_conformance
    }

    pub fn set_negotiated_conformance(&mut self, value: Conformance) {
        self.negotiated_conformance = value;
    }

    /// Intersect the proposal with what the peer accepted and keep the result.
    pub fn negotiate_conformance(&mut self, peer: Conformance) -> Conformance {
        self.negotiated_conformance = Conformance::negotiate(self.proposed_conformance, peer);
        debug!("Negotiated conformance {:?}", self.negotiated_conformance);
        self.negotiated_conformance
    }

    /// Largest PDU this side receives
    pub fn max_pdu_size(&self) -> u16 {
        self.max_pdu_size
    }

    /// At least 64 bytes; PLC interfaces clamp to 134.
    pub fn set_max_pdu_size(&mut self, value: u16) -> DlmsResult<()> {
        check_pdu_size(value)?;
        self.max_pdu_size = if self.interface_type.is_plc() {
            value.min(PLC_MAX_PDU_SIZE)
        } else {
            value
        };
        Ok(())
    }

    /// Largest PDU the peer receives
    pub fn max_server_pdu_size(&self) -> u16 {
        self.max_server_pdu_size
    }

    pub fn set_max_server_pdu_size(&mut self, value: u16) -> DlmsResult<()> {
        check_pdu_size(value)?;
        self.max_server_pdu_size = if self.interface_type.is_plc() {
            value.min(PLC_MAX_PDU_SIZE)
        } else {
            value
        };
        Ok(())
    }

    /// Room for APDU content in one PDU sent to the peer.
    pub fn max_payload_size(&self) -> u16 {
        let ciphered = self
            .cipher
            .as_ref()
            .is_some_and(|c| c.security() != Security::None);
        if ciphered {
            self.max_server_pdu_size.saturating_sub(CIPHERING_HEADER_SIZE)
        } else {
            self.max_server_pdu_size
        }
    }

    pub fn max_info_tx(&self) -> u16 {
        self.max_info_tx
    }

    pub fn set_max_info_tx(&mut self, value: u16) -> DlmsResult<()> {
        self.max_info_tx = Self::check_info_length(value)?;
        Ok(())
    }

    pub fn max_info_rx(&self) -> u16 {
        self.max_info_rx
    }

    pub fn set_max_info_rx(&mut self, value: u16) -> DlmsResult<()> {
        self.max_info_rx = Self::check_info_length(value)?;
        Ok(())
    }

    fn check_info_length(value: u16) -> DlmsResult<u16> {
        if !(MIN_INFO_LENGTH..=MAX_INFO_LENGTH).contains(&value) {
            return Err(DlmsError::InvalidData(format!(
                "HDLC information length must be {}..={}, got {}",
                MIN_INFO_LENGTH, MAX_INFO_LENGTH, value
            )));
        }
        Ok(value)
    }

    pub fn window_size_tx(&self) -> u8 {
        self.window_size_tx
    }

    pub fn set_window_size_tx(&mut self, value: u8) -> DlmsResult<()> {
        self.window_size_tx = Self::check_window_size(value)?;
        Ok(())
    }

    pub fn window_size_rx(&self) -> u8 {
        self.window_size_rx
    }

    pub fn set_window_size_rx(&mut self, value: u8) -> DlmsResult<()> {
        self.window_size_rx = Self::check_window_size(value)?;
        Ok(())
    }

    fn check_window_size(value: u8) -> DlmsResult<u8> {
        if value == 0 || value > MAX_WINDOW_SIZE {
            return Err(DlmsError::InvalidData(format!(
                "HDLC window size must be 1..={}, got {}",
                MAX_WINDOW_SIZE, value
            )));
        }
        Ok(value)
    }

    pub fn authentication(&self) -> Authentication {
        self.authentication
    }

    pub fn set_authentication(&mut self, value: Authentication) {
        self.authentication = value;
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }

    pub fn set_password(&mut self, value: &[u8]) {
        self.password = value.to_vec();
    }

    /// Key encrypting key used to wrap new global keys
    pub fn kek(&self) -> Option<&[u8]> {
        self.kek.as_deref()
    }

    pub fn set_kek(&mut self, value: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(kek) = value {
            if kek.len() != 16 && kek.len() != 32 {
                return Err(DlmsError::InvalidKey(format!(
                    "KEK must be 16 or 32 bytes, got {}",
                    kek.len()
                )));
            }
        }
        self.kek = value.map(<[u8]>::to_vec);
        Ok(())
    }

    pub fn gateway(&self) -> Option<&Gateway> {
        self.gateway.as_ref()
    }

    pub fn set_gateway(&mut self, value: Option<Gateway>) {
        self.gateway = value;
    }

    pub fn codec_options(&self) -> CodecOptions {
        self.codec_options
    }

    pub fn set_codec_options(&mut self, value: CodecOptions) {
        self.codec_options = value;
    }

    /// Decoding recorded traces: frame checks accept the first frame seen.
    pub fn translator_mode(&self) -> bool {
        self.translator_mode
    }

    pub fn set_translator_mode(&mut self, value: bool) {
        self.translator_mode = value;
    }

    pub fn cipher(&self) -> Option<&Cipher> {
        self.cipher.as_ref()
    }

    pub fn cipher_mut(&mut self) -> Option<&mut Cipher> {
        self.cipher.as_mut()
    }

    pub fn set_cipher(&mut self, cipher: Option<Cipher>) {
        self.cipher = cipher;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        debug!("Connection state {:?} -> {:?}", self.connection_state, state);
        self.connection_state = state;
    }

    pub fn set_objects(&mut self, objects: Option<Box<dyn ObjectList>>) {
        self.objects = objects;
    }

    pub fn objects(&self) -> Option<&dyn ObjectList> {
        self.objects.as_deref()
    }

    /// Look an object up in the association's object list.
    pub fn find_object(&self, class_id: u16, logical_name: &ObisCode) -> Option<ObjectEntry> {
        self.objects
            .as_ref()
            .and_then(|o| o.find_by_logical_name(class_id, logical_name))
    }

    // Challenges

    fn check_challenge(&self, challenge: &[u8]) -> DlmsResult<()> {
        let min = if self.authentication == Authentication::HighEcdsa {
            MIN_ECDSA_CHALLENGE_SIZE
        } else {
            MIN_CHALLENGE_SIZE
        };
        if !(min..=MAX_CHALLENGE_SIZE).contains(&challenge.len()) {
            return Err(DlmsError::InvalidChallenge(format!(
                "{} challenge must be {}..={} bytes, got {}",
                self.authentication,
                min,
                MAX_CHALLENGE_SIZE,
                challenge.len()
            )));
        }
        Ok(())
    }

    /// Client to server challenge
    pub fn ctos_challenge(&self) -> Option<&[u8]> {
        self.ctos_challenge.as_deref()
    }

    pub fn set_ctos_challenge(&mut self, value: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(challenge) = value {
            self.check_challenge(challenge)?;
        }
        self.ctos_challenge = value.map(<[u8]>::to_vec);
        Ok(())
    }

    /// Server to client challenge
    pub fn stoc_challenge(&self) -> Option<&[u8]> {
        self.stoc_challenge.as_deref()
    }

    pub fn set_stoc_challenge(&mut self, value: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(challenge) = value {
            self.check_challenge(challenge)?;
        }
        self.stoc_challenge = value.map(<[u8]>::to_vec);
        Ok(())
    }

    /// Keep challenges set by the caller instead of generating them.
    pub fn use_custom_challenge(&self) -> bool {
        self.use_custom_challenge
    }

    pub fn set_use_custom_challenge(&mut self, value: bool) {
        self.use_custom_challenge = value;
    }

    /// The challenge this side sends, generated unless a custom one is kept.
    pub fn own_challenge(&mut self) -> DlmsResult<Vec<u8>> {
        let slot = if self.is_server {
            &self.stoc_challenge
        } else {
            &self.ctos_challenge
        };
        if self.use_custom_challenge {
            return slot.clone().ok_or_else(|| {
                DlmsError::InvalidChallenge("custom challenge is not set".to_string())
            });
        }
        let challenge = generate_challenge(self.authentication, 0);
        if self.is_server {
            self.stoc_challenge = Some(challenge.clone());
        } else {
            self.ctos_challenge = Some(challenge.clone());
        }
        Ok(challenge)
    }

    // Block transfer

    pub fn block_index(&self) -> u32 {
        self.block_index
    }

    pub fn increase_block_index(&mut self) {
        self.block_index = self.block_index.wrapping_add(1);
    }

    pub fn reset_block_index(&mut self) {
        self.block_index = 1;
    }

    // Invocation counter

    pub fn expected_invocation_counter(&self) -> u32 {
        self.expected_invocation_counter
    }

    /// Last accepted counter of the peer; zero disables the check.
    pub fn set_expected_invocation_counter(&mut self, value: u32) {
        self.expected_invocation_counter = value;
    }

    /// Refuse a counter that is not above the last accepted one.
    pub fn check_invocation_counter(&mut self, received: u32) -> DlmsResult<()> {
        if self.expected_invocation_counter == 0 {
            return Ok(());
        }
        if received <= self.expected_invocation_counter {
            warn!(
                "Replayed invocation counter {} (last accepted {})",
                received, self.expected_invocation_counter
            );
            return Err(DlmsError::InvocationCounterReplay {
                received,
                expected: self.expected_invocation_counter,
            });
        }
        self.expected_invocation_counter = received;
        Ok(())
    }

    // HDLC frame sequence

    pub fn sender_frame(&self) -> u8 {
        self.sender_frame
    }

    pub fn receiver_frame(&self) -> u8 {
        self.receiver_frame
    }

    pub fn reset_frame_sequence(&mut self) {
        (self.sender_frame, self.receiver_frame) = hdlc::initial_sequence(self.is_server);
    }

    /// Control byte of the next I-frame.
    ///
    /// The first frame of a message also acknowledges the last received
    /// frame; following segments only advance N(S).
    pub fn next_send(&mut self, first: bool) -> u8 {
        self.sender_frame = if first {
            increase_receiver_sequence(increase_send_sequence(self.sender_frame))
        } else {
            increase_send_sequence(self.sender_frame)
        };
        self.sender_frame
    }

    /// Control byte of a receiver ready S-frame.
    pub fn receiver_ready(&mut self) -> u8 {
        self.sender_frame = increase_receiver_sequence(self.sender_frame) | 1;
        self.sender_frame & 0xF1
    }

    /// Receiver ready without acknowledging anything new.
    pub fn keep_alive(&mut self) -> u8 {
        self.sender_frame |= 1;
        self.sender_frame & 0xF1
    }

    /// Whether `frame` is the next frame expected from the peer.
    ///
    /// Accepted I- and S-frames update the receiver byte.
    pub fn check_frame(&mut self, frame: u8) -> bool {
        match FrameClass::from_control_byte(frame) {
            FrameClass::Unnumbered => {
                if frame == SNRM {
                    // A client sees its own SNRM when the line echoes.
                    let echo = !self.is_server
                        && self.sender_frame == 0x10
                        && self.receiver_frame == 0x0E;
                    self.reset_frame_sequence();
                    if echo {
                        debug!("Ignoring echoed SNRM");
                    }
                    return !echo;
                }
                true
            }
            FrameClass::Supervisory => {
                if frame == self.sender_frame & 0xF1 {
                    debug!("Ignoring echoed S-frame 0x{:02X}", frame);
                    return false;
                }
                self.receiver_frame = increase_receiver_sequence(self.receiver_frame);
                true
            }
            FrameClass::Information => self.check_information_frame(frame),
        }
    }

    fn accept(&mut self, frame: u8) -> bool {
        self.receiver_frame = frame;
        true
    }

    fn check_information_frame(&mut self, frame: u8) -> bool {
        let windowed = self.window_size_rx != 1;
        let mut expected;
        if self.sender_frame & 0x1 == 0 {
            expected = increase_receiver_sequence(increase_send_sequence(self.receiver_frame));
            if frame == expected || (windowed && frame == expected & !POLL_FINAL) {
                return self.accept(frame);
            }
            // The previous frame had its final bit clear.
            if windowed && self.receiver_frame & POLL_FINAL == 0 {
                expected = POLL_FINAL | increase_send_sequence(self.receiver_frame);
                if frame == expected || frame == expected & !POLL_FINAL {
                    return self.accept(frame);
                }
            }
        } else {
            // Reply to a receiver ready.
            expected = increase_send_sequence(self.receiver_frame);
            if frame == expected
                || frame == expected & !POLL_FINAL
                || (windowed && frame == expected | POLL_FINAL)
            {
                return self.accept(frame);
            }
        }
        let initial = hdlc::initial_sequence(self.is_server).1;
        if self.translator_mode && self.receiver_frame == initial {
            return self.accept(frame);
        }
        warn!(
            "Invalid HDLC frame 0x{:02X}, expected 0x{:02X}",
            frame, expected
        );
        false
    }

    /// Back to the state of a fresh session.
    ///
    /// Limits, keys and the object list stay; sequences, challenges,
    /// negotiated values and the cipher's session state go.
    pub fn reset(&mut self) {
        self.reset_frame_sequence();
        self.reset_block_index();
        self.connection_state = ConnectionState::empty();
        self.negotiated_conformance = Conformance::empty();
        self.max_server_pdu_size = if self.interface_type.is_plc() {
            PLC_MAX_PDU_SIZE
        } else {
            DEFAULT_MAX_PDU_SIZE
        };
        if !self.use_custom_challenge {
            self.ctos_challenge = None;
            self.stoc_challenge = None;
        }
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_list::MockObjectList;
    use mockall::predicate::eq;

    #[test]
    fn test_check_frame_after_snrm() {
        let mut settings = Settings::new(false);
        assert_eq!(settings.sender_frame(), 0xFE);
        assert_eq!(settings.receiver_frame(), 0x0E);
        assert!(settings.check_frame(0x93));
        let expected = increase_receiver_sequence(increase_send_sequence(0x0E));
        assert_eq!(expected, 0x30);
        assert!(settings.check_frame(expected));
        assert_eq!(settings.receiver_frame(), 0x30);
        assert!(!settings.check_frame(expected));
        assert_eq!(settings.receiver_frame(), 0x30);
    }

    #[test]
    fn test_snrm_echo() {
        let mut settings = Settings::new(false);
        assert_eq!(settings.next_send(true), 0x10);
        assert!(!settings.check_frame(0x93));
        // The echo still resets the sequence.
        assert_eq!(settings.sender_frame(), 0xFE);
        let mut server = Settings::new(true);
        assert!(server.check_frame(0x93));
    }

    #[test]
    fn test_exchange() {
        let mut client = Settings::new(false);
        let mut server = Settings::new(true);
        let request = client.next_send(true);
        assert!(server.check_frame(request));
        let response = server.next_send(true);
        assert!(client.check_frame(response));
        let request = client.next_send(true);
        assert!(server.check_frame(request));
        assert!(!server.check_frame(request));
    }

    #[test]
    fn test_receiver_ready() {
        let mut client = Settings::new(false);
        assert!(client.check_frame(0x93));
        let rr = client.receiver_ready();
        assert_eq!(rr & 0x0F, 0x01);
        // An S-frame equal to our own is an echo.
        assert!(!client.check_frame(rr));
        assert_eq!(client.keep_alive() & 0x01, 0x01);
    }

    #[test]
    fn test_segmented_frames() {
        let mut client = Settings::new(false);
        client.set_window_size_rx(3).unwrap();
        // Final bit clear on the first segment.
        assert!(client.check_frame(0x30 & !POLL_FINAL));
        let next = POLL_FINAL | increase_send_sequence(0x20);
        assert!(client.check_frame(next));
    }

    #[test]
    fn test_translator_mode() {
        let mut settings = Settings::new(false);
        assert!(!settings.check_frame(0x54));
        settings.set_translator_mode(true);
        assert!(settings.check_frame(0x54));
        assert_eq!(settings.receiver_frame(), 0x54);
    }

    #[test]
    fn test_limits() {
        let mut settings = Settings::new(false);
        assert!(settings.set_max_pdu_size(63).is_err());
        assert!(settings.set_max_pdu_size(1024).is_ok());
        settings.set_interface_type(InterfaceType::Plc);
        assert_eq!(settings.max_pdu_size(), PLC_MAX_PDU_SIZE);
        settings.set_max_pdu_size(512).unwrap();
        assert_eq!(settings.max_pdu_size(), PLC_MAX_PDU_SIZE);
        assert!(settings.set_window_size_tx(0).is_err());
        assert!(settings.set_window_size_rx(8).is_err());
        assert!(settings.set_window_size_rx(7).is_ok());
        assert!(settings.set_max_info_tx(31).is_err());
        assert!(settings.set_max_info_rx(2031).is_err());
        assert!(settings.set_max_info_rx(2030).is_ok());
        assert!(settings.set_kek(Some(&[0; 20])).is_err());
        assert!(settings.set_kek(Some(&[0; 16])).is_ok());
    }

    #[test]
    fn test_invocation_counter_replay() {
        let mut settings = Settings::new(false);
        assert!(settings.check_invocation_counter(0).is_ok());
        settings.set_expected_invocation_counter(10);
        assert_eq!(
            settings.check_invocation_counter(10),
            Err(DlmsError::InvocationCounterReplay {
                received: 10,
                expected: 10
            })
        );
        assert!(settings.check_invocation_counter(11).is_ok());
        assert_eq!(settings.expected_invocation_counter(), 11);
        assert!(settings.check_invocation_counter(11).is_err());
    }

    #[test]
    fn test_challenges() {
        let mut settings = Settings::new(false);
        settings.set_authentication(Authentication::HighGmac);
        assert!(settings.set_ctos_challenge(Some(&[1; 7])).is_err());
        assert!(settings.set_ctos_challenge(Some(&[1; 8])).is_ok());
        settings.set_authentication(Authentication::HighEcdsa);
        assert!(matches!(
            settings.set_ctos_challenge(Some(&[1; 16])),
            Err(DlmsError::InvalidChallenge(_))
        ));
        assert!(settings.set_stoc_challenge(Some(&[1; 65])).is_err());

        let generated = settings.own_challenge().unwrap();
        assert!((32..=64).contains(&generated.len()));
        assert_eq!(settings.ctos_challenge(), Some(&generated[..]));

        settings.set_use_custom_challenge(true);
        settings.set_ctos_challenge(Some(&[9; 32])).unwrap();
        assert_eq!(settings.own_challenge().unwrap(), vec![9; 32]);
        settings.reset();
        assert_eq!(settings.ctos_challenge(), Some(&[9u8; 32][..]));
        settings.set_ctos_challenge(None).unwrap();
        assert!(settings.own_challenge().is_err());
    }

    #[test]
    fn test_block_index_and_reset() {
        let mut settings = Settings::new(true);
        settings.increase_block_index();
        assert_eq!(settings.block_index(), 2);
        settings.next_send(true);
        settings.set_connection_state(ConnectionState::HDLC | ConnectionState::DLMS);
        settings.negotiate_conformance(Conformance::GET);
        let mut cipher = Cipher::new(b"SRV00001").unwrap();
        cipher.set_security(Security::AuthenticationEncryption);
        cipher.set_invocation_counter(42);
        settings.set_cipher(Some(cipher));
        assert_eq!(settings.max_payload_size(), 0xFFFF - 22);

        settings.reset();
        assert_eq!(settings.block_index(), 1);
        assert_eq!((settings.sender_frame(), settings.receiver_frame()), (0x1E, 0xEE));
        assert!(settings.connection_state().is_empty());
        assert!(settings.negotiated_conformance().is_empty());
        let cipher = settings.cipher().unwrap();
        assert_eq!(cipher.security(), Security::None);
        assert_eq!(cipher.invocation_counter(), 0);
    }

    #[test]
    fn test_conformance() {
        let mut settings = Settings::new(false);
        assert_eq!(settings.proposed_conformance(), Conformance::default_logical_name());
        settings.set_use_logical_name_referencing(false);
        assert_eq!(settings.proposed_conformance(), Conformance::default_short_name());
        let agreed = settings.negotiate_conformance(Conformance::READ | Conformance::ACTION);
        assert_eq!(agreed, Conformance::READ);
    }

    #[test]
    fn test_config() {
        let config = SettingsConfig {
            is_server: true,
            interface_type: InterfaceType::Wrapper,
            max_pdu_size: 1024,
            window_size_rx: 7,
            authentication: Authentication::HighGmac,
            expected_invocation_counter: 5,
            use_utc_to_normal_time: true,
            ..SettingsConfig::default()
        };
        let settings = Settings::from_config(&config).unwrap();
        assert!(settings.is_server());
        assert_eq!(settings.max_pdu_size(), 1024);
        assert!(settings.codec_options().use_utc_to_normal_time);
        assert_eq!(settings.to_config(), config);
        let bad = SettingsConfig {
            window_size_tx: 9,
            ..SettingsConfig::default()
        };
        assert!(Settings::from_config(&bad).is_err());
    }

    #[test]
    fn test_object_lookup() {
        let ln = ObisCode::new(0, 0, 40, 0, 0, 255);
        let entry = ObjectEntry {
            class_id: 15,
            version: 3,
            logical_name: ln,
            short_name: 0,
        };
        let mut objects = MockObjectList::new();
        objects
            .expect_find_by_logical_name()
            .with(eq(15u16), eq(ln))
            .times(1)
            .return_const(Some(entry));
        let mut settings = Settings::new(true);
        assert_eq!(settings.find_object(15, &ln), None);
        settings.set_objects(Some(Box::new(objects)));
        assert_eq!(settings.find_object(15, &ln), Some(entry));
    }
}
