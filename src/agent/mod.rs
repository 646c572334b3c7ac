//! Agent request-processing core (C5): UDP listener, request
//! dispatch, object-provider registry, response assembly.

pub mod counters;
pub mod dispatch;
pub mod incoming;
pub mod listener;
pub mod registry;

pub use counters::AgentCounters;
pub use dispatch::{handle_pdu, MAX_BULK_VARBINDS};
pub use incoming::{process_datagram, AgentContext, CommunityConfig};
pub use listener::Agent;
pub use registry::{GetOutcome, ObjectProvider, Registry};
