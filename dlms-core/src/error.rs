use thiserror::Error;

/// Main error type for DLMS/COSEM core operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlmsError {
    #[error("Index out of range: position {position} + {requested} exceeds size {size}")]
    IndexOutOfRange {
        position: usize,
        requested: usize,
        size: usize,
    },

    #[error("Malformed input at offset {offset}: {reason}")]
    MalformedInput { offset: usize, reason: String },

    /// More bytes are needed. The cursor has been rewound; append and retry.
    #[error("Incomplete PDU: {0}")]
    IncompletePdu(String),

    #[error("Cannot convert {from} to {to}")]
    TypeMismatch { from: String, to: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid system title: {0}")]
    InvalidSystemTitle(String),

    #[error("Invalid challenge: {0}")]
    InvalidChallenge(String),

    #[error("Authentication tag mismatch")]
    InvalidTag,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invocation counter replay: received {received}, expected more than {expected}")]
    InvocationCounterReplay { received: u32, expected: u32 },

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Unknown enum value: {0}")]
    UnknownEnum(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("ASN.1 encoding error: {0}")]
    Asn1Encoding(String),

    #[error("ASN.1 decoding error: {0}")]
    Asn1Decoding(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),
}

impl DlmsError {
    /// Shorthand for a [`DlmsError::MalformedInput`] at `offset`.
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        DlmsError::MalformedInput {
            offset,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`DlmsError::TypeMismatch`].
    pub fn mismatch(from: impl Into<String>, to: impl Into<String>) -> Self {
        DlmsError::TypeMismatch {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Returns `true` when the failure is soft and the caller may retry with more bytes.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DlmsError::IncompletePdu(_))
    }
}

/// Result type alias for DLMS/COSEM operations
pub type DlmsResult<T> = Result<T, DlmsError>;
