//! Agent-side counters for datagrams the agent drops rather than
//! answers. Exposed for the host to surface as MIB-II / USM-MIB
//! scalars; this crate only maintains the numbers.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct AgentCounters {
    pub in_bad_community_names: AtomicU64,
    pub in_bad_community_uses: AtomicU64,
    pub in_asn_parse_errors: AtomicU64,
    pub usm_unsupported_sec_levels: AtomicU64,
    pub usm_not_in_time_windows: AtomicU64,
    pub usm_unknown_user_names: AtomicU64,
    pub usm_unknown_engine_ids: AtomicU64,
    pub usm_wrong_digests: AtomicU64,
    pub usm_decryption_errors: AtomicU64,
}

impl AgentCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_usm_failure(&self, failure: crate::usm::UsmFailure) {
        use crate::usm::UsmFailure::*;
        let counter = match failure {
            UnsupportedSecLevel => &self.usm_unsupported_sec_levels,
            NotInTimeWindow => &self.usm_not_in_time_windows,
            UnknownUserName => &self.usm_unknown_user_names,
            UnknownEngineId => &self.usm_unknown_engine_ids,
            WrongDigest => &self.usm_wrong_digests,
            DecryptionError => &self.usm_decryption_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
