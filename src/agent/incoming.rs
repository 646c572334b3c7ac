//! Per-datagram request pipeline: decode, authenticate, dispatch,
//! frame a reply — or silently drop.

use tracing::{debug, warn};

use crate::agent::counters::AgentCounters;
use crate::agent::dispatch::handle_pdu;
use crate::agent::registry::Registry;
use crate::message::{
    decode_generic_with_layout, encode_scoped_pdu_bytes, GenericMessageWithLayout, HeaderDataV3, ScopedPdu,
    ScopedPduData, SnmpMessage, SnmpMessageV3, FLAG_AUTH, FLAG_PRIV,
};
use crate::oid::Oid;
use crate::pdu::{GenericPdu, Pdu, Varbind};
use crate::smi::SmiValue;
use crate::usm::database::UserDatabase;
use crate::usm::engine::EngineState;
use crate::usm::priv_crypto::SaltCounter;
use crate::usm::processing::{self, Incoming};
use crate::usm::{SecurityLevel, UsmFailure};

/// The read/write community strings a v1/v2c agent accepts.
pub struct CommunityConfig {
    pub read: Vec<u8>,
    pub write: Vec<u8>,
}

/// Everything the per-datagram pipeline needs, owned by the listener.
/// Each of these is independently lockable/atomic so the pipeline
/// never needs to hold more than one guard across an await point.
pub struct AgentContext {
    pub registry: Registry,
    pub users: UserDatabase,
    pub engine: EngineState,
    pub community: CommunityConfig,
    pub counters: AgentCounters,
    pub salt_counter: SaltCounter,
}

fn is_write_pdu(pdu: &Pdu) -> bool {
    matches!(pdu, Pdu::SetRequest(_))
}

/// Process one received UDP payload, returning the bytes to send back
/// (if any). Malformed input and failed security checks that must be
/// silently dropped return `None`.
pub async fn process_datagram(ctx: &AgentContext, raw: &[u8]) -> Option<Vec<u8>> {
    match decode_generic_with_layout(raw) {
        Ok(GenericMessageWithLayout::V1(msg)) => process_community(ctx, msg, true).await,
        Ok(GenericMessageWithLayout::V2c(msg)) => process_community(ctx, msg, false).await,
        Ok(GenericMessageWithLayout::V3(msg, layout)) => process_v3(ctx, raw, msg, layout).await,
        Err(err) => {
            ctx.counters.in_asn_parse_errors.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            debug!(error = %err, "dropping malformed datagram");
            None
        }
    }
}

async fn process_community(ctx: &AgentContext, msg: SnmpMessage, legacy: bool) -> Option<Vec<u8>> {
    let required = if is_write_pdu(&msg.pdu) {
        &ctx.community.write
    } else {
        &ctx.community.read
    };
    if &msg.community != required {
        ctx.counters
            .in_bad_community_names
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        warn!("dropping datagram with bad community name");
        return None;
    }
    let response_pdu = handle_pdu(&msg.pdu, &ctx.registry, legacy).await?;
    let response = SnmpMessage {
        version: msg.version,
        community: msg.community,
        pdu: response_pdu,
    };
    Some(response.encode().to_vec())
}

async fn process_v3(
    ctx: &AgentContext,
    raw: &[u8],
    msg: SnmpMessageV3,
    layout: crate::message::V3Layout,
) -> Option<Vec<u8>> {
    let outcome = processing::process_incoming(raw, &msg, layout, &ctx.engine, &ctx.users);
    let outcome = match outcome {
        Ok(o) => o,
        Err(err) => {
            debug!(error = %err, "dropping unparseable v3 security parameters");
            return None;
        }
    };
    match outcome {
        Incoming::Discovery => Some(build_discovery_report(ctx, &msg)),
        Incoming::Rejected { failure, security_params } => {
            ctx.counters.record_usm_failure(failure);
            Some(build_failure_report(ctx, &msg, failure, security_params))
        }
        Incoming::Authenticated {
            scoped_pdu,
            user,
            security_params,
        } => {
            let legacy = false;
            let response_pdu = handle_pdu(&scoped_pdu.pdu, &ctx.registry, legacy).await?;
            let response_scoped = ScopedPdu {
                context_engine_id: scoped_pdu.context_engine_id,
                context_name: scoped_pdu.context_name,
                pdu: response_pdu,
            };
            build_authenticated_response(ctx, &msg, &user, &security_params, response_scoped)
        }
    }
}

fn request_id_from_scoped(msg: &SnmpMessageV3) -> i32 {
    match &msg.scoped_data {
        ScopedPduData::Plaintext(sp) => sp.pdu.request_id().unwrap_or(0),
        ScopedPduData::Encrypted(_) => 0,
    }
}

fn build_discovery_report(ctx: &AgentContext, msg: &SnmpMessageV3) -> Vec<u8> {
    let request_id = request_id_from_scoped(msg);
    build_unauthenticated_report(ctx, msg.header.msg_id, request_id, crate::usm::stats_oid::UNKNOWN_ENGINE_IDS)
}

fn build_failure_report(
    ctx: &AgentContext,
    msg: &SnmpMessageV3,
    failure: UsmFailure,
    _security_params: Option<crate::usm::UsmSecurityParameters>,
) -> Vec<u8> {
    let request_id = request_id_from_scoped(msg);
    build_unauthenticated_report(ctx, msg.header.msg_id, request_id, failure.stats_oid())
}

/// A `Report` is sent unauthenticated even if the triggering request
/// was itself authenticated: the failure (unknown user, bad digest,
/// stale time window) means this node cannot construct a valid digest
/// under that user's key, and RFC 3414 does not require one for
/// Reports disclosing the failure itself.
fn build_unauthenticated_report(ctx: &AgentContext, msg_id: i32, request_id: i32, stats_oid: &[u32]) -> Vec<u8> {
    let varbind = Varbind::new(Oid::from(stats_oid), SmiValue::Counter32(0));
    let report_pdu = Pdu::Report(GenericPdu {
        request_id,
        field2: 0,
        field3: 0,
        varbinds: vec![varbind],
    });
    let scoped = ScopedPdu {
        context_engine_id: ctx.engine.engine_id().to_vec(),
        context_name: Vec::new(),
        pdu: report_pdu,
    };
    let snapshot = ctx.engine.snapshot();
    let message = SnmpMessageV3 {
        header: HeaderDataV3 {
            msg_id,
            max_size: 65507,
            flags: 0,
            security_model: 3,
        },
        security_params: crate::usm::UsmSecurityParameters {
            authoritative_engine_id: ctx.engine.engine_id().to_vec(),
            authoritative_engine_boots: snapshot.engine_boots,
            authoritative_engine_time: snapshot.engine_time,
            user_name: Vec::new(),
            authentication_parameters: Vec::new(),
            privacy_parameters: Vec::new(),
        }
        .encode()
        .to_vec(),
        scoped_data: ScopedPduData::Plaintext(scoped),
    };
    message.encode().to_vec()
}

fn build_authenticated_response(
    ctx: &AgentContext,
    request: &SnmpMessageV3,
    user: &crate::usm::V3User,
    _request_security_params: &crate::usm::UsmSecurityParameters,
    response_scoped: ScopedPdu,
) -> Option<Vec<u8>> {
    let security_level = user.security_level();
    let snapshot = ctx.engine.snapshot();
    let plaintext = encode_scoped_pdu_bytes(&response_scoped).to_vec();
    let outgoing = processing::prepare_outgoing(
        user,
        ctx.engine.engine_id(),
        snapshot.engine_boots,
        snapshot.engine_time,
        &user.name,
        security_level,
        &plaintext,
        &ctx.salt_counter,
    )
    .ok()?;

    let mut flags = 0u8;
    if security_level != SecurityLevel::NoAuthNoPriv {
        flags |= FLAG_AUTH;
    }
    if security_level == SecurityLevel::AuthPriv {
        flags |= FLAG_PRIV;
    }

    let scoped_data = match (outgoing.encrypted_scoped_pdu, outgoing.plaintext_scoped_pdu) {
        (Some(ciphertext), _) => ScopedPduData::Encrypted(ciphertext),
        (None, Some(_)) => ScopedPduData::Plaintext(response_scoped),
        (None, None) => unreachable!("prepare_outgoing always returns one of the two"),
    };

    let message = SnmpMessageV3 {
        header: HeaderDataV3 {
            msg_id: request.header.msg_id,
            max_size: 65507,
            flags,
            security_model: 3,
        },
        security_params: outgoing.security_params.encode().to_vec(),
        scoped_data,
    };

    let encoded = message.encode().to_vec();
    if security_level == SecurityLevel::NoAuthNoPriv {
        return Some(encoded);
    }
    processing::authenticate_outgoing(encoded, user).ok()
}
