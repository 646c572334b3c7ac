//! Object Identifier (C2): an ordered sequence of unsigned
//! sub-identifiers naming an MIB node.

use std::cmp::Ordering;
use std::fmt;

use crate::ber::decode::Cursor;
use crate::ber::encode::encode_oid as ber_encode_oid;
use crate::ber::{decode, TAG_OID};
use crate::error::{OidErrorKind, SnmpError};

/// An Object Identifier. Invariant: `len() >= 2`, `arcs[0] in {0,1,2}`,
/// and if `arcs[0] < 2` then `arcs[1] < 40`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    /// Build an `Oid` from raw arcs, validating the first two.
    pub fn new(arcs: Vec<u32>) -> Result<Self, SnmpError> {
        if arcs.len() < 2 {
            return Err(SnmpError::invalid_oid(OidErrorKind::TooShort));
        }
        if arcs[0] > 2 {
            return Err(SnmpError::invalid_oid(OidErrorKind::InvalidFirstArc(arcs[0])));
        }
        if arcs[0] < 2 && arcs[1] >= 40 {
            return Err(SnmpError::invalid_oid(OidErrorKind::InvalidSecondArc {
                first: arcs[0],
                second: arcs[1],
            }));
        }
        // The first BER octet is `40*arcs[0] + arcs[1]` in a single byte;
        // for arcs[0] == 2 that caps arcs[1] at 255 - 80 = 175.
        if arcs[0] == 2 && arcs[1] > 175 {
            return Err(SnmpError::invalid_oid(OidErrorKind::InvalidSecondArc {
                first: arcs[0],
                second: arcs[1],
            }));
        }
        Ok(Oid(arcs))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false // invariant: len >= 2
    }

    pub fn compare(&self, other: &Oid) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// `true` if `self` is a strict or non-strict prefix of `child`.
    pub fn is_prefix_of(&self, child: &Oid) -> bool {
        child.0.len() >= self.0.len() && child.0[..self.0.len()] == self.0[..]
    }

    /// The immediate lexicographic successor of any finite OID:
    /// itself with a trailing `0` arc appended. Used as the GETNEXT
    /// fallback lower bound.
    pub fn next_lex(&self) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(0);
        Oid(arcs)
    }

    /// Drop the last sub-identifier, if doing so would still satisfy
    /// the minimum length of 2.
    pub fn parent(&self) -> Option<Oid> {
        if self.0.len() > 2 {
            Some(Oid(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    pub fn decode(value: Cursor<'_>) -> Result<Oid, SnmpError> {
        let arcs = decode::decode_oid(value)?;
        Oid::new(arcs)
    }

    pub fn encode(&self, out: &mut bytes::BytesMut) {
        ber_encode_oid(&self.0, out);
    }

    pub const fn tag() -> u8 {
        TAG_OID
    }

    pub fn from_str_dotted(s: &str) -> Result<Oid, SnmpError> {
        let s = s.trim_start_matches('.');
        let arcs: Result<Vec<u32>, _> = s.split('.').map(|p| p.parse::<u32>()).collect();
        let arcs = arcs.map_err(|_| SnmpError::invalid_oid(OidErrorKind::TooShort))?;
        Oid::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|a| a.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid::new(arcs.to_vec()).expect("caller-supplied OID literal must be well-formed")
    }
}
