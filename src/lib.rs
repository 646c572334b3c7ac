//! A Rust implementation of the SNMP v1/v2c/v3 wire protocol: BER/X.690
//! codec, SMI type model, message framing, USM security, and an agent
//! request-processing core.

pub mod ber;
pub mod error;
pub mod message;
pub mod oid;
pub mod oid_cache;
pub mod pdu;
pub mod smi;
pub mod usm;

pub mod agent;
pub mod client;
pub mod config;

pub use error::{ErrorStatus, Result, SnmpError};
pub use message::{SnmpGenericMessage, SnmpMessage, SnmpMessageV3};
pub use oid::Oid;
pub use pdu::{GenericPdu, Pdu, TrapV1Pdu, Varbind, VarbindList};
pub use smi::SmiValue;
