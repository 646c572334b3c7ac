//! Object-provider registry (C5): an ordered map of MIB subtrees to
//! the providers that answer for them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{ErrorStatus, SnmpError};
use crate::oid::Oid;
use crate::oid_cache;
use crate::smi::SmiValue;

/// Result of a GET against a single OID.
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    Value(SmiValue),
    NoSuchInstance,
    NoSuchObject,
}

/// A source of truth for one MIB subtree. Implementations decide which
/// OIDs under their claimed root actually exist.
pub trait ObjectProvider: Send + Sync {
    /// Return this object's current value, or the appropriate exception
    /// marker if `oid` does not name a live instance.
    fn get(&self, oid: &Oid) -> GetOutcome;

    /// Return the smallest `(oid, value)` strictly greater than `oid`
    /// that this provider owns, or `None` if its subtree is exhausted.
    fn get_next(&self, oid: &Oid) -> Option<(Oid, SmiValue)>;

    /// Attempt to write `value` at `oid`.
    fn set(&self, oid: &Oid, value: SmiValue) -> Result<(), ErrorStatus>;
}

/// Providers keyed by the root OID they were registered under, ordered
/// so GETNEXT/GETBULK can walk the tree in lexicographic order.
pub struct Registry {
    providers: RwLock<BTreeMap<Oid, Arc<dyn ObjectProvider>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            providers: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn register(&self, root: Oid, provider: Arc<dyn ObjectProvider>) {
        self.providers.write().await.insert(root, provider);
    }

    /// Convenience wrapper for registering a provider under a
    /// dotted-decimal OID string (e.g. from configuration), consulting
    /// the process-wide OID string cache rather than re-parsing the
    /// same literal on every startup.
    pub async fn register_str(&self, root: &str, provider: Arc<dyn ObjectProvider>) -> Result<(), SnmpError> {
        let oid = oid_cache::parse_cached(root)?;
        self.register(oid, provider).await;
        Ok(())
    }

    /// The provider whose claimed root is the greatest one `<= oid`,
    /// i.e. the provider that would own `oid` if anyone does.
    async fn owning_provider(&self, oid: &Oid) -> Option<Arc<dyn ObjectProvider>> {
        let providers = self.providers.read().await;
        providers.range(..=oid.clone()).next_back().map(|(_, p)| Arc::clone(p))
    }

    pub async fn get(&self, oid: &Oid) -> GetOutcome {
        match self.owning_provider(oid).await {
            Some(provider) => provider.get(oid),
            None => GetOutcome::NoSuchObject,
        }
    }

    /// Smallest `(oid, value)` strictly greater than `oid` across every
    /// registered provider.
    pub async fn get_next(&self, oid: &Oid) -> Option<(Oid, SmiValue)> {
        let providers = self.providers.read().await;
        providers
            .values()
            .filter_map(|p| p.get_next(oid))
            .filter(|(next_oid, _)| next_oid > oid)
            .min_by(|a, b| a.0.cmp(&b.0))
    }

    pub async fn set(&self, oid: &Oid, value: SmiValue) -> Result<(), ErrorStatus> {
        match self.owning_provider(oid).await {
            Some(provider) => provider.set(oid, value),
            None => Err(ErrorStatus::NoCreation),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticCounter {
        oid: Oid,
        value: Mutex<u32>,
        read_only: bool,
    }

    impl ObjectProvider for StaticCounter {
        fn get(&self, oid: &Oid) -> GetOutcome {
            if oid == &self.oid {
                GetOutcome::Value(SmiValue::Counter32(*self.value.lock().unwrap()))
            } else {
                GetOutcome::NoSuchInstance
            }
        }

        fn get_next(&self, oid: &Oid) -> Option<(Oid, SmiValue)> {
            if &self.oid > oid {
                Some((self.oid.clone(), SmiValue::Counter32(*self.value.lock().unwrap())))
            } else {
                None
            }
        }

        fn set(&self, oid: &Oid, value: SmiValue) -> Result<(), ErrorStatus> {
            if self.read_only {
                return Err(ErrorStatus::ReadOnly);
            }
            if oid != &self.oid {
                return Err(ErrorStatus::NoCreation);
            }
            match value {
                SmiValue::Counter32(v) => {
                    *self.value.lock().unwrap() = v;
                    Ok(())
                }
                _ => Err(ErrorStatus::WrongType),
            }
        }
    }

    fn counter_oid() -> Oid {
        Oid::from(&[1, 3, 6, 1, 4, 1, 1, 1][..])
    }

    #[tokio::test]
    async fn get_hits_registered_provider() {
        let registry = Registry::new();
        let oid = counter_oid();
        registry
            .register(
                oid.clone(),
                Arc::new(StaticCounter {
                    oid: oid.clone(),
                    value: Mutex::new(7),
                    read_only: true,
                }),
            )
            .await;
        assert_eq!(registry.get(&oid).await, GetOutcome::Value(SmiValue::Counter32(7)));
    }

    #[tokio::test]
    async fn get_miss_returns_no_such_object() {
        let registry = Registry::new();
        let oid = counter_oid();
        assert_eq!(registry.get(&oid).await, GetOutcome::NoSuchObject);
    }

    #[tokio::test]
    async fn set_on_read_only_provider_is_rejected() {
        let registry = Registry::new();
        let oid = counter_oid();
        registry
            .register(
                oid.clone(),
                Arc::new(StaticCounter {
                    oid: oid.clone(),
                    value: Mutex::new(0),
                    read_only: true,
                }),
            )
            .await;
        assert_eq!(registry.set(&oid, SmiValue::Counter32(1)).await, Err(ErrorStatus::ReadOnly));
    }

    #[tokio::test]
    async fn get_next_returns_smallest_successor() {
        let registry = Registry::new();
        let oid = Oid::from(&[1, 3, 6, 1, 4, 1, 1, 1][..]);
        registry
            .register(
                oid.clone(),
                Arc::new(StaticCounter {
                    oid: oid.clone(),
                    value: Mutex::new(42),
                    read_only: true,
                }),
            )
            .await;
        let before = Oid::from(&[1, 3, 6, 1, 4, 1, 1][..]);
        let next = registry.get_next(&before).await;
        assert_eq!(next, Some((oid, SmiValue::Counter32(42))));
    }

    #[tokio::test]
    async fn register_str_parses_dotted_oid() {
        let registry = Registry::new();
        let oid = counter_oid();
        registry
            .register_str(
                "1.3.6.1.4.1.1.1",
                Arc::new(StaticCounter {
                    oid: oid.clone(),
                    value: Mutex::new(3),
                    read_only: true,
                }),
            )
            .await
            .unwrap();
        assert_eq!(registry.get(&oid).await, GetOutcome::Value(SmiValue::Counter32(3)));
    }

    #[tokio::test]
    async fn register_str_rejects_malformed_oid() {
        let registry = Registry::new();
        let result = registry
            .register_str(
                "not.an.oid",
                Arc::new(StaticCounter {
                    oid: counter_oid(),
                    value: Mutex::new(0),
                    read_only: true,
                }),
            )
            .await;
        assert!(result.is_err());
    }
}
