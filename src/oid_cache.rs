//! Process-wide OID string cache.
//!
//! Parsing a dotted-decimal OID string walks `str::split` and
//! allocates a `Vec<u32>`; configuration loading and registry
//! registration both do this repeatedly for the same handful of
//! strings, so a small bounded cache avoids re-parsing them on every
//! lookup. Bounded to 1,000 entries with simple insertion-order
//! eviction once full.

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::SnmpError;
use crate::oid::Oid;

const CAPACITY: usize = 1_000;

struct Cache {
    map: DashMap<String, Oid>,
    insertion_order: std::sync::Mutex<std::collections::VecDeque<String>>,
}

static CACHE: Lazy<Cache> = Lazy::new(|| Cache {
    map: DashMap::with_capacity(CAPACITY),
    insertion_order: std::sync::Mutex::new(std::collections::VecDeque::with_capacity(CAPACITY)),
});

/// Parse a dotted-decimal OID string, consulting (and populating) the
/// process-wide cache.
pub fn parse_cached(dotted: &str) -> Result<Oid, SnmpError> {
    if let Some(hit) = CACHE.map.get(dotted) {
        return Ok(hit.clone());
    }
    let oid = Oid::from_str_dotted(dotted)?;
    insert(dotted, &oid);
    Ok(oid)
}

fn insert(dotted: &str, oid: &Oid) {
    let mut order = CACHE.insertion_order.lock().unwrap();
    if CACHE.map.len() >= CAPACITY {
        if let Some(oldest) = order.pop_front() {
            CACHE.map.remove(&oldest);
        }
    }
    CACHE.map.insert(dotted.to_string(), oid.clone());
    order.push_back(dotted.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_caches() {
        let a = parse_cached("1.3.6.1.2.1.1.1.0").unwrap();
        let b = parse_cached("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_slice(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(parse_cached("not.an.oid").is_err());
    }
}
