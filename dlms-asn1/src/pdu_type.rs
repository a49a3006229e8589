//! APDU command table

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! pdu_types {
    ($($name:ident = $value:literal),* $(,)?) => {
        /// First byte of an APDU (or HDLC/ACSE command) identifying its kind
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum PduType {
            $($name = $value),*
        }

        impl PduType {
            pub fn from_u8(value: u8) -> DlmsResult<Self> {
                match value {
                    $($value => Ok(PduType::$name),)*
                    other => Err(DlmsError::UnknownEnum(format!("PDU type 0x{:02X}", other))),
                }
            }

            /// Name as used in translator output
            pub fn name(self) -> &'static str {
                match self {
                    $(PduType::$name => stringify!($name),)*
                }
            }

            /// Look up a name produced by [`PduType::name`].
            pub fn from_name(name: &str) -> DlmsResult<Self> {
                match name {
                    $(stringify!($name) => Ok(PduType::$name),)*
                    other => Err(DlmsError::UnknownEnum(format!("PDU type '{}'", other))),
                }
            }
        }
    };
}

pdu_types! {
    None = 0x00,
    InitiateRequest = 0x01,
    ReadRequest = 0x05,
    WriteRequest = 0x06,
    InitiateResponse = 0x08,
    ReadResponse = 0x0C,
    WriteResponse = 0x0D,
    ConfirmedServiceError = 0x0E,
    DataNotification = 0x0F,
    UnconfirmedWriteRequest = 0x16,
    InformationReport = 0x18,
    DisconnectMode = 0x1F,
    GloInitiateRequest = 0x21,
    GloReadRequest = 0x25,
    GloWriteRequest = 0x26,
    GloInitiateResponse = 0x28,
    GloReadResponse = 0x2C,
    GloWriteResponse = 0x2D,
    GloConfirmedServiceError = 0x2E,
    GloUnconfirmedWriteRequest = 0x36,
    GloInformationReport = 0x38,
    DedInitiateRequest = 0x41,
    DedReadRequest = 0x45,
    DedWriteRequest = 0x46,
    DedInitiateResponse = 0x48,
    DedReadResponse = 0x4C,
    DedWriteResponse = 0x4D,
    DedConfirmedServiceError = 0x4E,
    DisconnectRequest = 0x53,
    DedUnconfirmedWriteRequest = 0x56,
    DedInformationReport = 0x58,
    Aarq = 0x60,
    Aare = 0x61,
    ReleaseRequest = 0x62,
    ReleaseResponse = 0x63,
    Ua = 0x73,
    Snrm = 0x93,
    UnacceptableFrame = 0x97,
    GetRequest = 0xC0,
    SetRequest = 0xC1,
    EventNotification = 0xC2,
    MethodRequest = 0xC3,
    GetResponse = 0xC4,
    SetResponse = 0xC5,
    MethodResponse = 0xC7,
    GloGetRequest = 0xC8,
    GloSetRequest = 0xC9,
    GloEventNotification = 0xCA,
    GloMethodRequest = 0xCB,
    GloGetResponse = 0xCC,
    GloSetResponse = 0xCD,
    GloMethodResponse = 0xCF,
    DedGetRequest = 0xD0,
    DedSetRequest = 0xD1,
    DedEventNotification = 0xD2,
    DedMethodRequest = 0xD3,
    DedGetResponse = 0xD4,
    DedSetResponse = 0xD5,
    DedMethodResponse = 0xD7,
    ExceptionResponse = 0xD8,
    AccessRequest = 0xD9,
    AccessResponse = 0xDA,
    GeneralGloCiphering = 0xDB,
    GeneralDedCiphering = 0xDC,
    GeneralCiphering = 0xDD,
    GeneralSigning = 0xDF,
    GeneralBlockTransfer = 0xE0,
    GatewayRequest = 0xE6,
    GatewayResponse = 0xE7,
}

/// (plain, global ciphered, dedicated ciphered)
const CIPHERED_FORMS: &[(PduType, PduType, PduType)] = &[
    (PduType::GetRequest, PduType::GloGetRequest, PduType::DedGetRequest),
    (PduType::GetResponse, PduType::GloGetResponse, PduType::DedGetResponse),
    (PduType::SetRequest, PduType::GloSetRequest, PduType::DedSetRequest),
    (PduType::SetResponse, PduType::GloSetResponse, PduType::DedSetResponse),
    (PduType::MethodRequest, PduType::GloMethodRequest, PduType::DedMethodRequest),
    (PduType::MethodResponse, PduType::GloMethodResponse, PduType::DedMethodResponse),
    (PduType::EventNotification, PduType::GloEventNotification, PduType::DedEventNotification),
    (PduType::InitiateRequest, PduType::GloInitiateRequest, PduType::DedInitiateRequest),
    (PduType::InitiateResponse, PduType::GloInitiateResponse, PduType::DedInitiateResponse),
    (PduType::ReadRequest, PduType::GloReadRequest, PduType::DedReadRequest),
    (PduType::ReadResponse, PduType::GloReadResponse, PduType::DedReadResponse),
    (PduType::WriteRequest, PduType::GloWriteRequest, PduType::DedWriteRequest),
    (PduType::WriteResponse, PduType::GloWriteResponse, PduType::DedWriteResponse),
    (
        PduType::ConfirmedServiceError,
        PduType::GloConfirmedServiceError,
        PduType::DedConfirmedServiceError,
    ),
    (
        PduType::UnconfirmedWriteRequest,
        PduType::GloUnconfirmedWriteRequest,
        PduType::DedUnconfirmedWriteRequest,
    ),
    (
        PduType::InformationReport,
        PduType::GloInformationReport,
        PduType::DedInformationReport,
    ),
];

impl PduType {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Service-specific global ciphering tag for this plain command.
    pub fn glo(self) -> Option<PduType> {
        CIPHERED_FORMS.iter().find(|f| f.0 == self).map(|f| f.1)
    }

    /// Service-specific dedicated ciphering tag for this plain command.
    pub fn ded(self) -> Option<PduType> {
        CIPHERED_FORMS.iter().find(|f| f.0 == self).map(|f| f.2)
    }

    /// Plain command for a glo- or ded- tag.
    pub fn plain(self) -> Option<PduType> {
        CIPHERED_FORMS
            .iter()
            .find(|f| f.1 == self || f.2 == self)
            .map(|f| f.0)
    }

    pub fn is_glo(self) -> bool {
        CIPHERED_FORMS.iter().any(|f| f.1 == self)
    }

    pub fn is_ded(self) -> bool {
        CIPHERED_FORMS.iter().any(|f| f.2 == self)
    }

    /// Any ciphered or signed envelope.
    pub fn is_ciphered(self) -> bool {
        self.is_glo()
            || self.is_ded()
            || matches!(
                self,
                PduType::GeneralGloCiphering
                    | PduType::GeneralDedCiphering
                    | PduType::GeneralCiphering
                    | PduType::GeneralSigning
            )
    }
}

impl TryFrom<u8> for PduType {
    type Error = DlmsError;

    fn try_from(value: u8) -> DlmsResult<Self> {
        Self::from_u8(value)
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
