//! User-based Security Model (C4): key localization, HMAC
//! authentication, symmetric privacy, timeliness and discovery.

pub mod auth;
pub mod database;
pub mod engine;
pub mod keys;
pub mod priv_crypto;
pub mod processing;
pub mod timeliness;

use bytes::BytesMut;

use crate::ber::decode::{decode_integer, decode_octets, Cursor};
use crate::ber::encode as benc;
use crate::ber::{TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::error::{DecodeErrorKind, SnmpError};

pub use auth::AuthProtocol;
pub use database::UserDatabase;
pub use engine::EngineState;
pub use keys::LocalizedKey;
pub use priv_crypto::PrivProtocol;

/// USM counter OIDs reported in a `Report` PDU (prefix `1.3.6.1.6.3.15.1.1`).
pub mod stats_oid {
    pub const UNSUPPORTED_SEC_LEVELS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0];
    pub const NOT_IN_TIME_WINDOWS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0];
    pub const UNKNOWN_USER_NAMES: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0];
    pub const UNKNOWN_ENGINE_IDS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0];
    pub const WRONG_DIGESTS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0];
    pub const DECRYPTION_ERRORS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0];
}

/// A USM failure, carrying the stats OID the agent must report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsmFailure {
    UnsupportedSecLevel,
    NotInTimeWindow,
    UnknownUserName,
    UnknownEngineId,
    WrongDigest,
    DecryptionError,
}

impl UsmFailure {
    pub fn stats_oid(&self) -> &'static [u32] {
        match self {
            Self::UnsupportedSecLevel => stats_oid::UNSUPPORTED_SEC_LEVELS,
            Self::NotInTimeWindow => stats_oid::NOT_IN_TIME_WINDOWS,
            Self::UnknownUserName => stats_oid::UNKNOWN_USER_NAMES,
            Self::UnknownEngineId => stats_oid::UNKNOWN_ENGINE_IDS,
            Self::WrongDigest => stats_oid::WRONG_DIGESTS,
            Self::DecryptionError => stats_oid::DECRYPTION_ERRORS,
        }
    }
}

/// The `msgSecurityParameters` payload for USM (RFC 3414 §2.4), decoded
/// from the OCTET STRING carried by `SnmpMessageV3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmSecurityParameters {
    pub authoritative_engine_id: Vec<u8>,
    pub authoritative_engine_boots: u32,
    pub authoritative_engine_time: u32,
    pub user_name: Vec<u8>,
    pub authentication_parameters: Vec<u8>,
    pub privacy_parameters: Vec<u8>,
}

impl UsmSecurityParameters {
    /// `true` for the discovery probe shape: empty engine ID, empty
    /// user name, no auth/priv parameters.
    pub fn is_discovery_probe(&self) -> bool {
        self.authoritative_engine_id.is_empty()
            && self.user_name.is_empty()
            && self.authentication_parameters.is_empty()
            && self.privacy_parameters.is_empty()
    }

    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        benc::encode_octet_string(TAG_OCTET_STRING, &self.authoritative_engine_id, &mut body);
        benc::encode_integer(self.authoritative_engine_boots as i64, &mut body);
        benc::encode_integer(self.authoritative_engine_time as i64, &mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &self.user_name, &mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &self.authentication_parameters, &mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &self.privacy_parameters, &mut body);
        let mut out = BytesMut::new();
        benc::encode_container(TAG_SEQUENCE, &body, &mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<UsmSecurityParameters, SnmpError> {
        let (params, _layout) = Self::decode_with_layout(Cursor::new(bytes))?;
        Ok(params)
    }

    /// Decode from `cur`, additionally returning the absolute (within
    /// whatever buffer `cur` was cut from) byte range of the
    /// `msgAuthenticationParameters` content. Authentication digest
    /// verification re-zeroes exactly that range in the *original*
    /// wire bytes of the enclosing message before recomputing the HMAC.
    pub fn decode_with_layout(cur: Cursor<'_>) -> Result<(UsmSecurityParameters, AuthParamsLocation), SnmpError> {
        let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
        if !rest.is_empty() {
            return Err(SnmpError::decode(rest.offset(), DecodeErrorKind::TrailingData));
        }
        let (val, r) = seq.expect_tag(TAG_OCTET_STRING)?;
        let authoritative_engine_id = decode_octets(val);
        let (val, r) = r.expect_tag(TAG_INTEGER)?;
        let authoritative_engine_boots = decode_integer(val)? as u32;
        let (val, r) = r.expect_tag(TAG_INTEGER)?;
        let authoritative_engine_time = decode_integer(val)? as u32;
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let user_name = decode_octets(val);
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let auth_params_offset = val.offset();
        let auth_params_len = val.remaining();
        let authentication_parameters = decode_octets(val);
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let privacy_parameters = decode_octets(val);
        if !r.is_empty() {
            return Err(SnmpError::decode(r.offset(), DecodeErrorKind::TrailingData));
        }
        Ok((
            UsmSecurityParameters {
                authoritative_engine_id,
                authoritative_engine_boots,
                authoritative_engine_time,
                user_name,
                authentication_parameters,
                privacy_parameters,
            },
            AuthParamsLocation {
                offset: auth_params_offset,
                len: auth_params_len,
            },
        ))
    }
}

/// Absolute byte range of `msgAuthenticationParameters`' content within
/// the message buffer it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthParamsLocation {
    pub offset: usize,
    pub len: usize,
}

/// Return a copy of `raw_message` with the `len` bytes at `offset` set
/// to zero, matching RFC 3414 §3.1's "authParams field... set to all
/// zeros" before computing or verifying the digest.
pub fn zero_auth_params(raw_message: &[u8], location: AuthParamsLocation) -> Vec<u8> {
    let mut buf = raw_message.to_vec();
    let end = location.offset + location.len;
    if end <= buf.len() {
        for b in &mut buf[location.offset..end] {
            *b = 0;
        }
    }
    buf
}

/// A user entry in the agent's (or client's) USM user database.
/// Invariant: the key fields hold localized keys, never raw passwords;
/// `auth_key.len() == auth_protocol.digest_len()` and
/// `priv_key.len() == priv_protocol.key_len()`.
#[derive(Clone)]
pub struct V3User {
    pub name: Vec<u8>,
    pub auth_protocol: Option<AuthProtocol>,
    pub auth_key: Option<LocalizedKey>,
    pub priv_protocol: Option<PrivProtocol>,
    pub priv_key: Option<LocalizedKey>,
}

impl V3User {
    pub fn security_level(&self) -> SecurityLevel {
        match (self.auth_protocol.is_some(), self.priv_protocol.is_some()) {
            (false, _) => SecurityLevel::NoAuthNoPriv,
            (true, false) => SecurityLevel::AuthNoPriv,
            (true, true) => SecurityLevel::AuthPriv,
        }
    }
}

/// `msgFlags` security level, derived from which protocols a user has configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_params_round_trip() {
        let params = UsmSecurityParameters {
            authoritative_engine_id: vec![0x80, 0x00, 0x1f, 0x88],
            authoritative_engine_boots: 3,
            authoritative_engine_time: 9001,
            user_name: b"alice".to_vec(),
            authentication_parameters: vec![0u8; 12],
            privacy_parameters: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let encoded = params.encode();
        let decoded = UsmSecurityParameters::decode(&encoded).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn discovery_probe_is_detected() {
        let probe = UsmSecurityParameters {
            authoritative_engine_id: vec![],
            authoritative_engine_boots: 0,
            authoritative_engine_time: 0,
            user_name: vec![],
            authentication_parameters: vec![],
            privacy_parameters: vec![],
        };
        assert!(probe.is_discovery_probe());
    }

    #[test]
    fn non_probe_is_not_discovery() {
        let params = UsmSecurityParameters {
            authoritative_engine_id: vec![0x80],
            authoritative_engine_boots: 0,
            authoritative_engine_time: 0,
            user_name: vec![],
            authentication_parameters: vec![],
            privacy_parameters: vec![],
        };
        assert!(!params.is_discovery_probe());
    }
}
