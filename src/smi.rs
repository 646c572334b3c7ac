//! SMI type model (C2): a closed tagged union over every value an
//! SNMP varbind can carry, with a single encode/decode dispatch point
//! keyed on the BER tag.

use bytes::BytesMut;

use crate::ber::decode::{self, Cursor};
use crate::ber::encode as benc;
use crate::ber::*;
use crate::error::{DecodeErrorKind, SnmpError};
use crate::oid::Oid;

/// A decoded SNMP value. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub enum SmiValue {
    Integer(i32),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    /// Exception markers used in v2c/v3 varbinds (RFC 1905 §3).
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Sequence(Vec<SmiValue>),
}

impl SmiValue {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Integer(_) => TAG_INTEGER,
            Self::OctetString(_) => TAG_OCTET_STRING,
            Self::Null => TAG_NULL,
            Self::ObjectIdentifier(_) => TAG_OID,
            Self::IpAddress(_) => TAG_IP_ADDRESS,
            Self::Counter32(_) => TAG_COUNTER32,
            Self::Gauge32(_) => TAG_GAUGE32,
            Self::TimeTicks(_) => TAG_TIME_TICKS,
            Self::Opaque(_) => TAG_OPAQUE,
            Self::Counter64(_) => TAG_COUNTER64,
            Self::NoSuchObject => TAG_NO_SUCH_OBJECT,
            Self::NoSuchInstance => TAG_NO_SUCH_INSTANCE,
            Self::EndOfMibView => TAG_END_OF_MIB_VIEW,
            Self::Sequence(_) => TAG_SEQUENCE,
        }
    }

    pub fn encode(&self, out: &mut BytesMut) {
        match self {
            Self::Integer(v) => benc::encode_integer(*v as i64, out),
            Self::OctetString(b) => benc::encode_octet_string(TAG_OCTET_STRING, b, out),
            Self::Null => benc::encode_null(out),
            Self::ObjectIdentifier(oid) => oid.encode(out),
            Self::IpAddress(b) => benc::encode_octet_string(TAG_IP_ADDRESS, b, out),
            Self::Counter32(v) => benc::encode_unsigned(TAG_COUNTER32, *v as u64, out),
            Self::Gauge32(v) => benc::encode_unsigned(TAG_GAUGE32, *v as u64, out),
            Self::TimeTicks(v) => benc::encode_unsigned(TAG_TIME_TICKS, *v as u64, out),
            Self::Opaque(b) => benc::encode_octet_string(TAG_OPAQUE, b, out),
            Self::Counter64(v) => benc::encode_unsigned(TAG_COUNTER64, *v, out),
            Self::NoSuchObject => benc::encode_tlv(TAG_NO_SUCH_OBJECT, &[], out),
            Self::NoSuchInstance => benc::encode_tlv(TAG_NO_SUCH_INSTANCE, &[], out),
            Self::EndOfMibView => benc::encode_tlv(TAG_END_OF_MIB_VIEW, &[], out),
            Self::Sequence(children) => {
                let mut body = BytesMut::new();
                for child in children {
                    child.encode(&mut body);
                }
                benc::encode_container(TAG_SEQUENCE, &body, out);
            }
        }
    }

    /// Decode one tagged value starting at `cur`, returning it and a
    /// cursor positioned just past it.
    pub fn decode(cur: Cursor<'_>) -> Result<(SmiValue, Cursor<'_>), SnmpError> {
        let (tag, value, rest) = cur.read_tlv()?;
        let v = match tag {
            TAG_INTEGER => {
                let i = decode::decode_integer(value)?;
                if i < i32::MIN as i64 || i > i32::MAX as i64 {
                    return Err(SnmpError::decode(value.offset(), DecodeErrorKind::BadInteger));
                }
                SmiValue::Integer(i as i32)
            }
            TAG_OCTET_STRING => SmiValue::OctetString(decode::decode_octets(value)),
            TAG_NULL => {
                decode::decode_null(value)?;
                SmiValue::Null
            }
            TAG_OID => SmiValue::ObjectIdentifier(Oid::decode(value)?),
            TAG_IP_ADDRESS => {
                let bytes = decode::decode_octets(value);
                let arr: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| SnmpError::decode(value.offset(), DecodeErrorKind::BadInteger))?;
                SmiValue::IpAddress(arr)
            }
            TAG_COUNTER32 => SmiValue::Counter32(decode::decode_unsigned(value, 4)? as u32),
            TAG_GAUGE32 => SmiValue::Gauge32(decode::decode_unsigned(value, 4)? as u32),
            TAG_TIME_TICKS => SmiValue::TimeTicks(decode::decode_unsigned(value, 4)? as u32),
            TAG_OPAQUE => SmiValue::Opaque(decode::decode_octets(value)),
            TAG_COUNTER64 => SmiValue::Counter64(decode::decode_unsigned(value, 8)?),
            TAG_NO_SUCH_OBJECT => {
                decode::decode_null(value)?;
                SmiValue::NoSuchObject
            }
            TAG_NO_SUCH_INSTANCE => {
                decode::decode_null(value)?;
                SmiValue::NoSuchInstance
            }
            TAG_END_OF_MIB_VIEW => {
                decode::decode_null(value)?;
                SmiValue::EndOfMibView
            }
            TAG_SEQUENCE => {
                let mut children = Vec::new();
                let mut inner = value;
                while !inner.is_empty() {
                    let (child, next) = SmiValue::decode(inner)?;
                    children.push(child);
                    inner = next;
                }
                SmiValue::Sequence(children)
            }
            other => return Err(SnmpError::decode(cur.offset(), DecodeErrorKind::UnsupportedTag(other))),
        };
        Ok((v, rest))
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: SmiValue) {
        let mut out = BytesMut::new();
        v.encode(&mut out);
        let (decoded, rest) = SmiValue::decode(Cursor::new(&out)).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, v);
    }

    #[test]
    fn every_primitive_round_trips() {
        roundtrip(SmiValue::Integer(-8));
        roundtrip(SmiValue::Integer(1024));
        roundtrip(SmiValue::OctetString(b"Test System Description".to_vec()));
        roundtrip(SmiValue::Null);
        roundtrip(SmiValue::ObjectIdentifier(Oid::from(&[1, 3, 6, 1, 2, 1, 1, 1, 0][..])));
        roundtrip(SmiValue::IpAddress([127, 0, 0, 1]));
        roundtrip(SmiValue::Counter32(u32::MAX));
        roundtrip(SmiValue::Gauge32(42));
        roundtrip(SmiValue::TimeTicks(970069));
        roundtrip(SmiValue::Opaque(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        roundtrip(SmiValue::Counter64(u64::MAX));
        roundtrip(SmiValue::NoSuchObject);
        roundtrip(SmiValue::NoSuchInstance);
        roundtrip(SmiValue::EndOfMibView);
    }

    #[test]
    fn sequence_round_trips_recursively() {
        roundtrip(SmiValue::Sequence(vec![
            SmiValue::Integer(1),
            SmiValue::Sequence(vec![SmiValue::Null, SmiValue::Counter32(7)]),
        ]));
    }

    #[test]
    fn counter32_msb_set_gets_sign_octet() {
        let mut out = BytesMut::new();
        SmiValue::Counter32(0xFFFF_FFFF).encode(&mut out);
        assert_eq!(&out[..], &[0x41, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
