//! Client request correlation: `Idle → AwaitingReply(correlation_id) →
//! Completed | TimedOut | Cancelled`.
//!
//! Correlation ids come from a process-wide monotonic counter, never
//! from a wall-clock tick count: the source material this core was
//! distilled from once kept that clock as the correlation key, which
//! aliases whenever the clock wraps (RFC 1157's request-id is a plain
//! `i32`, and a 32-bit tick counter wraps in under 50 days). An
//! `AtomicU64` never wraps in any observable lifetime.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

/// One in-flight request awaiting a reply from `peer`.
pub struct Pending {
    pub reply: oneshot::Sender<Vec<u8>>,
}

/// Concurrent map from `(peer, correlation id)` to the channel a
/// send-and-wait call is blocked on.
#[derive(Default)]
pub struct CorrelationMap {
    counter: AtomicU64,
    pending: DashMap<(SocketAddr, i32), Pending>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        CorrelationMap {
            counter: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate the next request id for `peer`. Wire `request-id` is a
    /// signed 32-bit field (RFC 1157 §4.1.1), so the monotonic counter
    /// is masked into range; it still never repeats within any request
    /// window this client could plausibly have outstanding.
    pub fn next_request_id(&self) -> i32 {
        (self.counter.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF) as i32
    }

    /// Register a pending request and return the receiver half the
    /// caller awaits (with its own timeout).
    pub fn register(&self, peer: SocketAddr, request_id: i32) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert((peer, request_id), Pending { reply: tx });
        rx
    }

    /// Deliver a reply datagram to whichever pending request it
    /// matches, if any; a reply with no matching entry (duplicate,
    /// late arrival after timeout, or unsolicited traffic) is dropped.
    pub fn deliver(&self, peer: SocketAddr, request_id: i32, data: Vec<u8>) {
        if let Some((_, pending)) = self.pending.remove(&(peer, request_id)) {
            let _ = pending.reply.send(data);
        }
    }

    /// Remove a pending entry without delivering anything: used on
    /// timeout expiry and on shutdown cancellation.
    pub fn cancel(&self, peer: SocketAddr, request_id: i32) {
        self.pending.remove(&(peer, request_id));
    }

    pub fn cancel_all(&self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
