//! Error taxonomy for the codec, USM security and agent layers.
//!
//! Decode errors carry the byte offset they were detected at so a
//! caller can report "malformed message at offset N" without needing
//! to re-walk the buffer.

use std::net::SocketAddr;

pub type Result<T> = std::result::Result<T, SnmpError>;

/// BER decode failure kinds (C1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Ran out of bytes before a tag, length or value could be read.
    TruncatedField,
    /// Length encoding was malformed (e.g. indefinite form, or a
    /// long-form count of more than 126 octets).
    BadLength,
    /// Tag byte did not match what the caller expected at this position.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Tag byte is not one this codec knows how to decode.
    UnsupportedTag(u8),
    /// INTEGER content violated the shortest-form / sign-octet rules.
    BadInteger,
    /// OBJECT IDENTIFIER content violated the arc encoding rules.
    BadOid,
    /// A container's declared length did not exhaust cleanly into
    /// whole child TLVs.
    TrailingData,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedField => write!(f, "truncated field"),
            Self::BadLength => write!(f, "invalid BER length encoding"),
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{expected:02X}, got 0x{actual:02X}")
            }
            Self::UnsupportedTag(t) => write!(f, "unsupported tag 0x{t:02X}"),
            Self::BadInteger => write!(f, "malformed INTEGER encoding"),
            Self::BadOid => write!(f, "malformed OBJECT IDENTIFIER encoding"),
            Self::TrailingData => write!(f, "trailing data inside container"),
        }
    }
}

/// BER encode failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// A length exceeded what this codec can frame (> 2^32-1 octets).
    LengthOverflow,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthOverflow => write!(f, "length too large to encode"),
        }
    }
}

/// OID validation failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    TooShort,
    InvalidFirstArc(u32),
    InvalidSecondArc { first: u32, second: u32 },
    SubidentifierOverflow,
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort => write!(f, "OID must have at least 2 sub-identifiers"),
            Self::InvalidFirstArc(v) => write!(f, "first sub-identifier must be 0, 1 or 2, got {v}"),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second sub-identifier {second} too large for first arc {first}")
            }
            Self::SubidentifierOverflow => write!(f, "sub-identifier exceeds 2^32-1"),
        }
    }
}

/// USM authentication failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    UnknownUser,
    UnknownEngineId,
    NotInTimeWindow,
    DigestMismatch,
    UnsupportedProtocol,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownUser => write!(f, "unknown user"),
            Self::UnknownEngineId => write!(f, "unknown engine id"),
            Self::NotInTimeWindow => write!(f, "message not in time window"),
            Self::DigestMismatch => write!(f, "authentication digest mismatch"),
            Self::UnsupportedProtocol => write!(f, "unsupported authentication protocol"),
        }
    }
}

/// USM privacy (encryption/decryption) failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    InvalidPadding,
    InvalidCiphertextLength { length: usize, block_size: usize },
    InvalidPrivParamsLength { expected: usize, actual: usize },
    UnsupportedProtocol,
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPadding => write!(f, "invalid privacy padding"),
            Self::InvalidCiphertextLength { length, block_size } => write!(
                f,
                "ciphertext length {length} is not a multiple of block size {block_size}"
            ),
            Self::InvalidPrivParamsLength { expected, actual } => write!(
                f,
                "privParameters must be {expected} bytes, got {actual}"
            ),
            Self::UnsupportedProtocol => write!(f, "unsupported privacy protocol"),
        }
    }
}

/// Top-level error type shared by the codec, USM and agent layers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SnmpError {
    #[error("decode error at offset {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    #[error("invalid OID: {kind}")]
    InvalidOid { kind: OidErrorKind },

    #[error("unsupported SNMP version: {0}")]
    UnsupportedVersion(i32),

    #[error("unsupported or unexpected PDU tag: 0x{0:02X}")]
    UnsupportedPdu(u8),

    #[error("malformed SNMPv3 header data")]
    InvalidHeaderData,

    #[error("malformed SNMPv3 scoped PDU")]
    InvalidScopedPdu,

    #[error("authentication failed: {kind}")]
    Auth { kind: AuthErrorKind },

    #[error("privacy operation failed: {kind}")]
    Crypto { kind: CryptoErrorKind },

    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {t}")).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    #[error("request {request_id} timed out after {elapsed_ms}ms")]
    Timeout { request_id: i32, elapsed_ms: u64 },

    #[error("request cancelled")]
    Cancelled,
}

impl SnmpError {
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind }
    }

    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::Auth { kind }
    }

    pub fn crypto(kind: CryptoErrorKind) -> Self {
        Self::Crypto { kind }
    }

    pub fn io(target: Option<SocketAddr>, source: std::io::Error) -> Self {
        Self::Io { target, source }
    }
}

/// SNMP response error-status codes (RFC 1157 / RFC 1905 / RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    Unknown(i32),
}

impl ErrorStatus {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => code,
        }
    }
}
