//! USM user database: a concurrent map keyed by user name, since
//! per-request lookups vastly outnumber add/remove operations.

use dashmap::DashMap;

use crate::usm::auth::AuthProtocol;
use crate::usm::keys::{derive_priv_key, localize};
use crate::usm::priv_crypto::PrivProtocol;
use crate::usm::V3User;

/// Process-wide table of configured USM users, keyed by user name.
/// Mutation (add/remove) is rare relative to the per-request lookups
/// the agent's dispatch loop performs.
#[derive(Default)]
pub struct UserDatabase {
    users: DashMap<Vec<u8>, V3User>,
}

impl UserDatabase {
    pub fn new() -> Self {
        UserDatabase {
            users: DashMap::new(),
        }
    }

    /// Localize `password`/`priv_password` against `engine_id` and add
    /// the resulting user. Raw passwords are never retained; only the
    /// localized keys are stored.
    pub fn add_user(
        &self,
        name: &[u8],
        engine_id: &[u8],
        auth: Option<(AuthProtocol, &[u8])>,
        priv_: Option<(PrivProtocol, &[u8])>,
    ) {
        let (auth_protocol, auth_key) = match auth {
            Some((proto, password)) => (Some(proto), Some(localize(proto, password, engine_id))),
            None => (None, None),
        };
        // Privacy keys localize under the *auth* protocol's hash (RFC 3414
        // §2.6: there is only one key-localization algorithm, parameterized
        // by the user's auth protocol), so a priv protocol without an auth
        // protocol is not representable in USM and is simply dropped. The
        // localized intermediate is then cut down to exactly the number of
        // bytes the privacy protocol consumes.
        let (priv_protocol, priv_key) = match (auth_protocol, priv_) {
            (Some(auth_proto), Some((proto, password))) => {
                let intermediate = localize(auth_proto, password, engine_id);
                (Some(proto), Some(derive_priv_key(auth_proto, proto, &intermediate)))
            }
            _ => (None, None),
        };
        self.users.insert(
            name.to_vec(),
            V3User {
                name: name.to_vec(),
                auth_protocol,
                auth_key,
                priv_protocol,
                priv_key,
            },
        );
    }

    pub fn remove_user(&self, name: &[u8]) -> Option<V3User> {
        self.users.remove(name).map(|(_, v)| v)
    }

    pub fn get(&self, name: &[u8]) -> Option<V3User> {
        self.users.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.users.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_lookup_round_trips_localized_keys() {
        let db = UserDatabase::new();
        let engine_id = [0x80, 0x00, 0x1f, 0x88];
        db.add_user(
            b"alice",
            &engine_id,
            Some((AuthProtocol::Sha1, b"authpassword123")),
            Some((PrivProtocol::Aes128Cfb, b"privpassword123")),
        );
        let user = db.get(b"alice").expect("user present");
        assert_eq!(user.name, b"alice");
        assert_eq!(user.auth_key.unwrap().len(), 20);
        // AES-128-CFB consumes a 16-byte key, not the full SHA-1 digest
        // length the localization hash produces.
        assert_eq!(user.priv_key.unwrap().len(), PrivProtocol::Aes128Cfb.key_len());
    }

    #[test]
    fn remove_drops_user() {
        let db = UserDatabase::new();
        db.add_user(b"bob", &[0x80], Some((AuthProtocol::Md5, b"pw")), None);
        assert!(db.contains(b"bob"));
        db.remove_user(b"bob");
        assert!(!db.contains(b"bob"));
    }

    #[test]
    fn unknown_user_lookup_is_none() {
        let db = UserDatabase::new();
        assert!(db.get(b"nobody").is_none());
    }
}
