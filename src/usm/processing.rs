//! Orchestrates the User-based Security Model pipeline for one incoming
//! SNMPv3 message: engine ID match, user lookup, timeliness, authentication
//! and privacy, ending in either a usable [`ScopedPdu`] or the
//! [`UsmFailure`] the caller should report back as a `Report` PDU.

use crate::ber::decode::Cursor;
use crate::error::{AuthErrorKind, CryptoErrorKind, SnmpError};
use crate::message::{decode_scoped_pdu_bytes, ScopedPdu, ScopedPduData, SnmpMessageV3, V3Layout};
use crate::usm::auth::{compute_digest, verify_digest};
use crate::usm::database::UserDatabase;
use crate::usm::engine::EngineState;
use crate::usm::priv_crypto::{self, SaltCounter};
use crate::usm::timeliness::check_timeliness;
use crate::usm::{zero_auth_params, SecurityLevel, UsmFailure, UsmSecurityParameters, V3User};

/// Outcome of running an incoming v3 message through the USM pipeline.
pub enum Incoming {
    /// The message was a discovery probe: no
    /// security processing applies, the caller should reply with a
    /// `Report` disclosing engine ID/boots/time.
    Discovery,
    /// Security checks passed; here is the plaintext scoped PDU and
    /// the user/params the caller needs to frame a response.
    Authenticated {
        scoped_pdu: ScopedPdu,
        user: V3User,
        security_params: UsmSecurityParameters,
    },
    /// A security check failed; `failure` names the USM stats counter
    /// a `Report` response should carry.
    Rejected {
        failure: UsmFailure,
        security_params: Option<UsmSecurityParameters>,
    },
}

/// Run `raw_message`/`msg` (already BER-decoded, see
/// [`SnmpMessageV3::decode_with_layout`]) through engine-ID check, user
/// lookup, timeliness, authentication and privacy.
pub fn process_incoming(
    raw_message: &[u8],
    msg: &SnmpMessageV3,
    layout: V3Layout,
    engine: &EngineState,
    users: &UserDatabase,
) -> Result<Incoming, SnmpError> {
    let security_params_bytes: &[u8] = msg.security_params.as_slice();
    let cur = Cursor::at(security_params_bytes, layout.security_params_offset);
    let (security_params, auth_location) = UsmSecurityParameters::decode_with_layout(cur)?;

    if security_params.is_discovery_probe() {
        return Ok(Incoming::Discovery);
    }

    if !security_params.authoritative_engine_id.is_empty()
        && security_params.authoritative_engine_id != engine.engine_id()
    {
        return Ok(Incoming::Rejected {
            failure: UsmFailure::UnknownEngineId,
            security_params: Some(security_params),
        });
    }

    let user = match users.get(&security_params.user_name) {
        Some(u) => u,
        None => {
            return Ok(Incoming::Rejected {
                failure: UsmFailure::UnknownUserName,
                security_params: Some(security_params),
            })
        }
    };

    let wants_auth = msg.header.is_authenticated();
    let wants_priv = msg.header.is_encrypted();
    let user_level = user.security_level();
    let requested_exceeds_configured = (wants_auth && user_level == SecurityLevel::NoAuthNoPriv)
        || (wants_priv && user_level != SecurityLevel::AuthPriv);
    if requested_exceeds_configured {
        return Ok(Incoming::Rejected {
            failure: UsmFailure::UnsupportedSecLevel,
            security_params: Some(security_params),
        });
    }

    if wants_auth {
        let auth_proto = user.auth_protocol.expect("checked by requested_exceeds_configured");
        let auth_key = user.auth_key.as_ref().expect("auth protocol implies auth key");
        let zeroed = zero_auth_params(raw_message, auth_location);
        if verify_digest(auth_proto, auth_key, &zeroed, &security_params.authentication_parameters).is_err() {
            return Ok(Incoming::Rejected {
                failure: UsmFailure::WrongDigest,
                security_params: Some(security_params),
            });
        }
        if check_timeliness(
            engine.snapshot(),
            security_params.authoritative_engine_boots,
            security_params.authoritative_engine_time,
        )
        .is_err()
        {
            return Ok(Incoming::Rejected {
                failure: UsmFailure::NotInTimeWindow,
                security_params: Some(security_params),
            });
        }
    }

    let scoped_pdu = match &msg.scoped_data {
        ScopedPduData::Plaintext(sp) => sp.clone(),
        ScopedPduData::Encrypted(ciphertext) => {
            if !wants_priv {
                return Ok(Incoming::Rejected {
                    failure: UsmFailure::DecryptionError,
                    security_params: Some(security_params),
                });
            }
            let auth_proto = user.auth_protocol.expect("checked by requested_exceeds_configured");
            let priv_proto = user.priv_protocol.expect("checked by requested_exceeds_configured");
            let priv_key = user.priv_key.as_ref().expect("priv protocol implies priv key");
            let plaintext = priv_crypto::decrypt(
                auth_proto,
                priv_proto,
                priv_key,
                security_params.authoritative_engine_boots,
                security_params.authoritative_engine_time,
                &security_params.privacy_parameters,
                ciphertext,
            );
            match plaintext {
                Ok(bytes) => match decode_scoped_pdu_bytes(&bytes) {
                    Ok(sp) => sp,
                    Err(_) => {
                        return Ok(Incoming::Rejected {
                            failure: UsmFailure::DecryptionError,
                            security_params: Some(security_params),
                        })
                    }
                },
                Err(_) => {
                    return Ok(Incoming::Rejected {
                        failure: UsmFailure::DecryptionError,
                        security_params: Some(security_params),
                    })
                }
            }
        }
    };

    Ok(Incoming::Authenticated {
        scoped_pdu,
        user,
        security_params,
    })
}

/// Build the `msgSecurityParameters` + (optionally encrypted) scoped
/// PDU for an outgoing v3 message, applying authentication and/or
/// privacy for `user` at `security_level`.
///
/// Authentication requires a two-pass encode: the full message is
/// first assembled with a zero-filled `authParams` placeholder of the
/// correct length, then [`crate::usm::auth::compute_digest`] runs over
/// those exact bytes and the result replaces the placeholder in the
/// final frame. Callers therefore pass a `build_message` closure that,
/// given the (possibly still-placeholder) security parameters, returns
/// the complete encoded message.
pub struct OutgoingSecurityParams {
    pub security_params: UsmSecurityParameters,
    pub plaintext_scoped_pdu: Option<Vec<u8>>,
    pub encrypted_scoped_pdu: Option<Vec<u8>>,
}

#[allow(clippy::too_many_arguments)]
pub fn prepare_outgoing(
    user: &V3User,
    engine_id: &[u8],
    engine_boots: u32,
    engine_time: u32,
    user_name: &[u8],
    security_level: SecurityLevel,
    scoped_pdu_plaintext: &[u8],
    salt_counter: &SaltCounter,
) -> Result<OutgoingSecurityParams, SnmpError> {
    let auth_len = user.auth_protocol.map(|p| p.truncated_len()).unwrap_or(0);
    let mut security_params = UsmSecurityParameters {
        authoritative_engine_id: engine_id.to_vec(),
        authoritative_engine_boots: engine_boots,
        authoritative_engine_time: engine_time,
        user_name: user_name.to_vec(),
        authentication_parameters: vec![0u8; auth_len],
        privacy_parameters: Vec::new(),
    };

    let mut encrypted_scoped_pdu = None;
    let mut plaintext_scoped_pdu = Some(scoped_pdu_plaintext.to_vec());

    if security_level == SecurityLevel::AuthPriv {
        let auth_proto = user
            .auth_protocol
            .ok_or_else(|| SnmpError::auth(AuthErrorKind::UnsupportedProtocol))?;
        let priv_proto = user
            .priv_protocol
            .ok_or_else(|| SnmpError::crypto(CryptoErrorKind::UnsupportedProtocol))?;
        let priv_key = user
            .priv_key
            .as_ref()
            .ok_or_else(|| SnmpError::crypto(CryptoErrorKind::UnsupportedProtocol))?;
        let (ciphertext, priv_params) = priv_crypto::encrypt(
            auth_proto,
            priv_proto,
            priv_key,
            engine_boots,
            engine_time,
            salt_counter,
            scoped_pdu_plaintext,
        )?;
        security_params.privacy_parameters = priv_params;
        encrypted_scoped_pdu = Some(ciphertext);
        plaintext_scoped_pdu = None;
    }

    Ok(OutgoingSecurityParams {
        security_params,
        plaintext_scoped_pdu,
        encrypted_scoped_pdu,
    })
}

/// Encode-then-locate-then-digest convenience wrapper: given a fully
/// assembled v3 message (with `authParams` still zero-filled to the
/// right length), re-decode it purely to recover the digest's exact
/// wire offset, then splice the computed digest into place.
pub fn authenticate_outgoing(encoded: Vec<u8>, user: &V3User) -> Result<Vec<u8>, SnmpError> {
    let (msg, layout) = SnmpMessageV3::decode_with_layout(&encoded)?;
    let cur = Cursor::at(msg.security_params.as_slice(), layout.security_params_offset);
    let (_params, auth_location) = UsmSecurityParameters::decode_with_layout(cur)?;
    finalize_authentication(encoded, auth_location, user)
}

/// Given the fully-assembled message bytes (with `authParams` still
/// zero-filled at `auth_location`), compute the digest and splice it
/// into place, returning the final frame ready to send.
pub fn finalize_authentication(
    mut framed_message: Vec<u8>,
    auth_location: crate::usm::AuthParamsLocation,
    user: &V3User,
) -> Result<Vec<u8>, SnmpError> {
    let auth_proto = user
        .auth_protocol
        .ok_or_else(|| SnmpError::auth(AuthErrorKind::UnsupportedProtocol))?;
    let auth_key = user
        .auth_key
        .as_ref()
        .ok_or_else(|| SnmpError::auth(AuthErrorKind::UnsupportedProtocol))?;
    let digest = compute_digest(auth_proto, auth_key, &framed_message);
    let end = auth_location.offset + auth_location.len;
    if end > framed_message.len() || digest.len() != auth_location.len {
        return Err(SnmpError::InvalidHeaderData);
    }
    framed_message[auth_location.offset..end].copy_from_slice(&digest);
    Ok(framed_message)
}
