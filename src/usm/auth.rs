//! HMAC authentication: compute and verify `msgAuthenticationParameters`.

use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;

use crate::error::{AuthErrorKind, SnmpError};
use crate::usm::keys::LocalizedKey;

/// The authentication hash algorithms USM speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl AuthProtocol {
    /// Raw digest output length in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// `msgAuthenticationParameters` truncation length (RFC 7860 Table 1;
    /// MD5/SHA-1 keep RFC 3414's 12-byte truncation).
    pub fn truncated_len(&self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }
}

fn hmac_full(proto: AuthProtocol, key: &LocalizedKey, message: &[u8]) -> Vec<u8> {
    match proto {
        AuthProtocol::Md5 => {
            let mut mac = Hmac::<md5::Md5>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        AuthProtocol::Sha1 => {
            let mut mac = Hmac::<sha1::Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        AuthProtocol::Sha256 => {
            let mut mac = Hmac::<sha2::Sha256>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        AuthProtocol::Sha384 => {
            let mut mac = Hmac::<sha2::Sha384>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        AuthProtocol::Sha512 => {
            let mut mac = Hmac::<sha2::Sha512>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Compute the truncated `msgAuthenticationParameters` digest over a
/// whole-message buffer in which the parameters field is already
/// zero-filled to `proto.truncated_len()` bytes.
pub fn compute_digest(proto: AuthProtocol, key: &LocalizedKey, zeroed_message: &[u8]) -> Vec<u8> {
    let full = hmac_full(proto, key, zeroed_message);
    full[..proto.truncated_len()].to_vec()
}

/// Verify a received digest in constant time. `zeroed_message` is the
/// received message with the auth parameters field zeroed out again.
pub fn verify_digest(
    proto: AuthProtocol,
    key: &LocalizedKey,
    zeroed_message: &[u8],
    received: &[u8],
) -> Result<(), SnmpError> {
    if received.len() != proto.truncated_len() {
        return Err(SnmpError::auth(AuthErrorKind::DigestMismatch));
    }
    let expected = compute_digest(proto, key, zeroed_message);
    if expected.ct_eq(received).into() {
        Ok(())
    } else {
        Err(SnmpError::auth(AuthErrorKind::DigestMismatch))
    }
}
