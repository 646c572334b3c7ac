//! Client-side USM: the agent is the authoritative engine here, so the
//! client's job is the mirror image of [`crate::usm::processing`] —
//! discover the remote engine's identity/clock, sign outgoing
//! requests against it, and verify/decrypt replies.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::{AuthErrorKind, SnmpError};
use crate::message::{
    decode_generic_with_layout, decode_scoped_pdu_bytes, encode_scoped_pdu_bytes, GenericMessageWithLayout,
    HeaderDataV3, ScopedPdu, ScopedPduData, SnmpMessageV3, FLAG_AUTH, FLAG_PRIV, FLAG_REPORTABLE,
};
use crate::pdu::Pdu;
use crate::usm::auth::verify_digest;
use crate::usm::priv_crypto::{self, SaltCounter};
use crate::usm::timeliness::check_timeliness;
use crate::usm::{processing, zero_auth_params, AuthParamsLocation, SecurityLevel, UsmSecurityParameters, V3User};

/// What the client has learned about a remote agent's authoritative
/// engine: its id plus the clock values from the most recent reply,
/// which stand in for "now" until the next exchange updates them.
#[derive(Clone)]
pub struct RemoteEngine {
    pub engine_id: Vec<u8>,
    pub boots: u32,
    pub time: u32,
    pub learned_at: Instant,
}

impl RemoteEngine {
    /// `engineTime` projected forward by wall-clock time elapsed since
    /// it was learned, so a client holding a stale snapshot does not
    /// immediately fall outside the 150s timeliness window.
    fn projected_time(&self) -> u32 {
        self.time.saturating_add(self.learned_at.elapsed().as_secs().min(u32::MAX as u64) as u32)
    }
}

/// Per-target cache, since a client may talk to several agents.
#[derive(Default)]
pub struct RemoteEngineCache {
    engines: DashMap<SocketAddr, RemoteEngine>,
}

impl RemoteEngineCache {
    pub fn new() -> Self {
        RemoteEngineCache::default()
    }

    pub fn get(&self, peer: SocketAddr) -> Option<RemoteEngine> {
        self.engines.get(&peer).map(|e| e.clone())
    }

    pub fn update(&self, peer: SocketAddr, engine: RemoteEngine) {
        self.engines.insert(peer, engine);
    }
}

/// Build the empty-security discovery probe: no engine id, no user
/// name, no auth/priv, reportable flag set. The agent answers with a
/// `Report` disclosing its identity and clock.
pub fn build_discovery_probe(msg_id: i32, request_pdu: Pdu) -> SnmpMessageV3 {
    let scoped = ScopedPdu {
        context_engine_id: vec![],
        context_name: vec![],
        pdu: request_pdu,
    };
    let empty_params = UsmSecurityParameters {
        authoritative_engine_id: vec![],
        authoritative_engine_boots: 0,
        authoritative_engine_time: 0,
        user_name: vec![],
        authentication_parameters: vec![],
        privacy_parameters: vec![],
    };
    SnmpMessageV3 {
        header: HeaderDataV3 {
            msg_id,
            max_size: 65507,
            flags: FLAG_REPORTABLE,
            security_model: 3,
        },
        security_params: empty_params.encode().to_vec(),
        scoped_data: ScopedPduData::Plaintext(scoped),
    }
}

/// Extract the engine id/boots/time a discovery `Report` (or any other
/// reply) carries in its `msgSecurityParameters`, regardless of
/// whether the reply itself was authenticated.
pub fn remote_engine_from_reply(raw: &[u8]) -> Result<RemoteEngine, SnmpError> {
    let (msg, _layout) = SnmpMessageV3::decode_with_layout(raw)?;
    let params = UsmSecurityParameters::decode(&msg.security_params)?;
    Ok(RemoteEngine {
        engine_id: params.authoritative_engine_id,
        boots: params.authoritative_engine_boots,
        time: params.authoritative_engine_time,
        learned_at: Instant::now(),
    })
}

/// Frame and, if `user` carries auth/priv protocols, sign/encrypt an
/// outgoing request against `remote`.
pub fn build_authenticated_request(
    msg_id: i32,
    user: &V3User,
    remote: &RemoteEngine,
    request_pdu: Pdu,
    salt_counter: &SaltCounter,
) -> Result<Vec<u8>, SnmpError> {
    let security_level = user.security_level();
    let scoped = ScopedPdu {
        context_engine_id: remote.engine_id.clone(),
        context_name: vec![],
        pdu: request_pdu,
    };
    let plaintext = encode_scoped_pdu_bytes(&scoped).to_vec();
    let outgoing = processing::prepare_outgoing(
        user,
        &remote.engine_id,
        remote.boots,
        remote.projected_time(),
        &user.name,
        security_level,
        &plaintext,
        salt_counter,
    )?;

    let mut flags = 0u8;
    if security_level != SecurityLevel::NoAuthNoPriv {
        flags |= FLAG_AUTH;
    }
    if security_level == SecurityLevel::AuthPriv {
        flags |= FLAG_PRIV;
    }
    flags |= FLAG_REPORTABLE;

    let scoped_data = match outgoing.encrypted_scoped_pdu {
        Some(ciphertext) => ScopedPduData::Encrypted(ciphertext),
        None => ScopedPduData::Plaintext(scoped),
    };
    let message = SnmpMessageV3 {
        header: HeaderDataV3 {
            msg_id,
            max_size: 65507,
            flags,
            security_model: 3,
        },
        security_params: outgoing.security_params.encode().to_vec(),
        scoped_data,
    };
    let encoded = message.encode().to_vec();
    if security_level == SecurityLevel::NoAuthNoPriv {
        return Ok(encoded);
    }
    processing::authenticate_outgoing(encoded, user)
}

/// Verify and, if encrypted, decrypt a reply the client is itself
/// authoritative for nothing in: success means the reply really did
/// come from `remote` and carries a usable scoped PDU.
pub fn verify_reply(raw: &[u8], user: &V3User, remote: &RemoteEngine) -> Result<ScopedPdu, SnmpError> {
    let (msg, layout) = match decode_generic_with_layout(raw)? {
        GenericMessageWithLayout::V3(msg, layout) => (msg, layout),
        _ => return Err(SnmpError::InvalidHeaderData),
    };

    if msg.header.is_authenticated() {
        let auth_proto = user
            .auth_protocol
            .ok_or_else(|| SnmpError::auth(AuthErrorKind::UnsupportedProtocol))?;
        let auth_key = user
            .auth_key
            .as_ref()
            .ok_or_else(|| SnmpError::auth(AuthErrorKind::UnsupportedProtocol))?;
        let cur = crate::ber::decode::Cursor::at(&msg.security_params, layout.security_params_offset);
        let (params, auth_location) = UsmSecurityParameters::decode_with_layout(cur)?;
        if params.authoritative_engine_id != remote.engine_id {
            return Err(SnmpError::auth(AuthErrorKind::UnknownEngineId));
        }
        let zeroed = zero_auth_params(raw, AuthParamsLocation { offset: auth_location.offset, len: auth_location.len });
        verify_digest(auth_proto, auth_key, &zeroed, &params.authentication_parameters)?;
        check_timeliness(
            crate::usm::timeliness::AuthoritativeClock {
                engine_boots: remote.boots,
                engine_time: remote.projected_time(),
            },
            params.authoritative_engine_boots,
            params.authoritative_engine_time,
        )
        .map_err(|_| SnmpError::auth(AuthErrorKind::NotInTimeWindow))?;
    }

    match msg.scoped_data {
        ScopedPduData::Plaintext(sp) => Ok(sp),
        ScopedPduData::Encrypted(ciphertext) => {
            let auth_proto = user
                .auth_protocol
                .ok_or_else(|| SnmpError::auth(AuthErrorKind::UnsupportedProtocol))?;
            let priv_proto = user
                .priv_protocol
                .ok_or_else(|| SnmpError::crypto(crate::error::CryptoErrorKind::UnsupportedProtocol))?;
            let priv_key = user
                .priv_key
                .as_ref()
                .ok_or_else(|| SnmpError::crypto(crate::error::CryptoErrorKind::UnsupportedProtocol))?;
            let cur = crate::ber::decode::Cursor::at(&msg.security_params, layout.security_params_offset);
            let (params, _) = UsmSecurityParameters::decode_with_layout(cur)?;
            let plaintext = priv_crypto::decrypt(
                auth_proto,
                priv_proto,
                priv_key,
                params.authoritative_engine_boots,
                params.authoritative_engine_time,
                &params.privacy_parameters,
                &ciphertext,
            )?;
            decode_scoped_pdu_bytes(&plaintext)
        }
    }
}
