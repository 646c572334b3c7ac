//! PDU model (C3, part 1): varbinds and the PDU tagged union shared by
//! v1, v2c and v3 messages.

use bytes::BytesMut;

use crate::ber::decode::Cursor;
use crate::ber::encode as benc;
use crate::ber::*;
use crate::error::{DecodeErrorKind, SnmpError};
use crate::oid::Oid;
use crate::smi::SmiValue;

/// An (OID, value) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Varbind {
    pub oid: Oid,
    pub value: SmiValue,
}

impl Varbind {
    pub fn new(oid: Oid, value: SmiValue) -> Self {
        Varbind { oid, value }
    }

    fn encode(&self, out: &mut BytesMut) {
        let mut body = BytesMut::new();
        self.oid.encode(&mut body);
        self.value.encode(&mut body);
        benc::encode_container(TAG_SEQUENCE, &body, out);
    }

    fn decode(cur: Cursor<'_>) -> Result<(Varbind, Cursor<'_>), SnmpError> {
        let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
        let (tag, oid_value, after_oid) = seq.read_tlv()?;
        if tag != TAG_OID {
            return Err(SnmpError::decode(
                seq.offset(),
                DecodeErrorKind::UnexpectedTag {
                    expected: TAG_OID,
                    actual: tag,
                },
            ));
        }
        let oid = Oid::decode(oid_value)?;
        let (value, after_value) = SmiValue::decode(after_oid)?;
        if !after_value.is_empty() {
            return Err(SnmpError::decode(after_value.offset(), DecodeErrorKind::TrailingData));
        }
        Ok((Varbind { oid, value }, rest))
    }
}

pub type VarbindList = Vec<Varbind>;

fn encode_varbind_list(vbs: &VarbindList, out: &mut BytesMut) {
    let mut body = BytesMut::new();
    for vb in vbs {
        vb.encode(&mut body);
    }
    benc::encode_container(TAG_SEQUENCE, &body, out);
}

fn decode_varbind_list(cur: Cursor<'_>) -> Result<(VarbindList, Cursor<'_>), SnmpError> {
    let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
    let mut vbs = Vec::new();
    let mut inner = seq;
    while !inner.is_empty() {
        let (vb, next) = Varbind::decode(inner)?;
        vbs.push(vb);
        inner = next;
    }
    Ok((vbs, rest))
}

/// The common `(request_id, int32, int32, varbinds)` body shared by
/// every PDU except the obsolete v1 trap.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericPdu {
    pub request_id: i32,
    /// `error_status` for most PDU kinds; `non_repeaters` for GetBulk.
    pub field2: i32,
    /// `error_index` for most PDU kinds; `max_repetitions` for GetBulk.
    pub field3: i32,
    pub varbinds: VarbindList,
}

impl GenericPdu {
    pub fn error_status(&self) -> i32 {
        self.field2
    }

    pub fn error_index(&self) -> i32 {
        self.field3
    }

    pub fn non_repeaters(&self) -> i32 {
        self.field2
    }

    pub fn max_repetitions(&self) -> i32 {
        self.field3
    }

    fn encode_body(&self, out: &mut BytesMut) {
        benc::encode_integer(self.request_id as i64, out);
        benc::encode_integer(self.field2 as i64, out);
        benc::encode_integer(self.field3 as i64, out);
        encode_varbind_list(&self.varbinds, out);
    }

    fn decode_body(cur: Cursor<'_>) -> Result<GenericPdu, SnmpError> {
        let (val, r) = cur.expect_tag(TAG_INTEGER)?;
        let request_id = crate::ber::decode::decode_integer(val)? as i32;
        let (val, r) = r.expect_tag(TAG_INTEGER)?;
        let field2 = crate::ber::decode::decode_integer(val)? as i32;
        let (val, r) = r.expect_tag(TAG_INTEGER)?;
        let field3 = crate::ber::decode::decode_integer(val)? as i32;
        let (varbinds, r) = decode_varbind_list(r)?;
        if !r.is_empty() {
            return Err(SnmpError::decode(r.offset(), DecodeErrorKind::TrailingData));
        }
        Ok(GenericPdu {
            request_id,
            field2,
            field3,
            varbinds,
        })
    }
}

/// The obsolete SNMPv1 Trap-PDU (RFC 1157 §4.1.6): distinct shape,
/// carries no request id or error fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    pub enterprise: Oid,
    pub agent_address: [u8; 4],
    pub generic_trap: i32,
    pub specific_trap: i32,
    pub uptime: u32,
    pub varbinds: VarbindList,
}

impl TrapV1Pdu {
    fn encode_body(&self, out: &mut BytesMut) {
        self.enterprise.encode(out);
        benc::encode_octet_string(TAG_IP_ADDRESS, &self.agent_address, out);
        benc::encode_integer(self.generic_trap as i64, out);
        benc::encode_integer(self.specific_trap as i64, out);
        benc::encode_unsigned(TAG_TIME_TICKS, self.uptime as u64, out);
        encode_varbind_list(&self.varbinds, out);
    }

    fn decode_body(cur: Cursor<'_>) -> Result<TrapV1Pdu, SnmpError> {
        let (oid_value, r) = cur.expect_tag(TAG_OID)?;
        let enterprise = Oid::decode(oid_value)?;
        let (addr_value, r) = r.expect_tag(TAG_IP_ADDRESS)?;
        let addr_bytes = crate::ber::decode::decode_octets(addr_value);
        let agent_address: [u8; 4] = addr_bytes
            .try_into()
            .map_err(|_| SnmpError::decode(r.offset(), DecodeErrorKind::BadInteger))?;
        let (gt_value, r) = r.expect_tag(TAG_INTEGER)?;
        let generic_trap = crate::ber::decode::decode_integer(gt_value)? as i32;
        let (st_value, r) = r.expect_tag(TAG_INTEGER)?;
        let specific_trap = crate::ber::decode::decode_integer(st_value)? as i32;
        let (tt_value, r) = r.expect_tag(TAG_TIME_TICKS)?;
        let uptime = crate::ber::decode::decode_unsigned(tt_value, 4)? as u32;
        let (varbinds, r) = decode_varbind_list(r)?;
        if !r.is_empty() {
            return Err(SnmpError::decode(r.offset(), DecodeErrorKind::TrailingData));
        }
        Ok(TrapV1Pdu {
            enterprise,
            agent_address,
            generic_trap,
            specific_trap,
            uptime,
            varbinds,
        })
    }
}

/// Tagged union over every PDU shape this core speaks.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    GetRequest(GenericPdu),
    GetNextRequest(GenericPdu),
    GetResponse(GenericPdu),
    SetRequest(GenericPdu),
    GetBulkRequest(GenericPdu),
    InformRequest(GenericPdu),
    TrapV2(GenericPdu),
    Report(GenericPdu),
    TrapV1(TrapV1Pdu),
}

impl Pdu {
    pub fn tag(&self) -> u8 {
        match self {
            Self::GetRequest(_) => TAG_GET_REQUEST,
            Self::GetNextRequest(_) => TAG_GET_NEXT_REQUEST,
            Self::GetResponse(_) => TAG_GET_RESPONSE,
            Self::SetRequest(_) => TAG_SET_REQUEST,
            Self::GetBulkRequest(_) => TAG_GET_BULK_REQUEST,
            Self::InformRequest(_) => TAG_INFORM_REQUEST,
            Self::TrapV2(_) => TAG_TRAP_V2,
            Self::Report(_) => TAG_REPORT,
            Self::TrapV1(_) => TAG_TRAP_V1,
        }
    }

    pub fn generic(&self) -> Option<&GenericPdu> {
        match self {
            Self::GetRequest(p)
            | Self::GetNextRequest(p)
            | Self::GetResponse(p)
            | Self::SetRequest(p)
            | Self::GetBulkRequest(p)
            | Self::InformRequest(p)
            | Self::TrapV2(p)
            | Self::Report(p) => Some(p),
            Self::TrapV1(_) => None,
        }
    }

    pub fn request_id(&self) -> Option<i32> {
        self.generic().map(|p| p.request_id)
    }

    pub fn encode(&self, out: &mut BytesMut) {
        let mut body = BytesMut::new();
        match self {
            Self::TrapV1(p) => p.encode_body(&mut body),
            other => other.generic().unwrap().encode_body(&mut body),
        }
        benc::encode_container(self.tag(), &body, out);
    }

    pub fn decode(cur: Cursor<'_>) -> Result<(Pdu, Cursor<'_>), SnmpError> {
        let (tag, value, rest) = cur.read_tlv()?;
        let pdu = match tag {
            TAG_GET_REQUEST => Pdu::GetRequest(GenericPdu::decode_body(value)?),
            TAG_GET_NEXT_REQUEST => Pdu::GetNextRequest(GenericPdu::decode_body(value)?),
            TAG_GET_RESPONSE => Pdu::GetResponse(GenericPdu::decode_body(value)?),
            TAG_SET_REQUEST => Pdu::SetRequest(GenericPdu::decode_body(value)?),
            TAG_GET_BULK_REQUEST => Pdu::GetBulkRequest(GenericPdu::decode_body(value)?),
            TAG_INFORM_REQUEST => Pdu::InformRequest(GenericPdu::decode_body(value)?),
            TAG_TRAP_V2 => Pdu::TrapV2(GenericPdu::decode_body(value)?),
            TAG_REPORT => Pdu::Report(GenericPdu::decode_body(value)?),
            TAG_TRAP_V1 => Pdu::TrapV1(TrapV1Pdu::decode_body(value)?),
            other => return Err(SnmpError::UnsupportedPdu(other)),
        };
        Ok((pdu, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_generic(request_id: i32) -> GenericPdu {
        GenericPdu {
            request_id,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(
                Oid::from(&[1, 3, 6, 1, 2, 1, 1, 1, 0][..]),
                SmiValue::OctetString(b"Test System Description".to_vec()),
            )],
        }
    }

    #[test]
    fn every_pdu_kind_round_trips() {
        let variants = vec![
            Pdu::GetRequest(sample_generic(38)),
            Pdu::GetNextRequest(sample_generic(39)),
            Pdu::GetResponse(sample_generic(40)),
            Pdu::SetRequest(sample_generic(41)),
            Pdu::GetBulkRequest(GenericPdu {
                request_id: 1,
                field2: 0,
                field3: 10,
                varbinds: vec![],
            }),
            Pdu::InformRequest(sample_generic(42)),
            Pdu::TrapV2(sample_generic(43)),
            Pdu::Report(sample_generic(44)),
        ];
        for pdu in variants {
            let mut out = BytesMut::new();
            pdu.encode(&mut out);
            let (decoded, rest) = Pdu::decode(Cursor::new(&out)).unwrap();
            assert!(rest.is_empty());
            assert_eq!(decoded, pdu);
        }
    }

    #[test]
    fn trap_v1_round_trips() {
        let trap = Pdu::TrapV1(TrapV1Pdu {
            enterprise: Oid::from(&[1, 3, 6, 1, 4, 1, 4, 1, 2, 21][..]),
            agent_address: [127, 0, 0, 1],
            generic_trap: 0,
            specific_trap: 0,
            uptime: 12345,
            varbinds: vec![],
        });
        let mut out = BytesMut::new();
        trap.encode(&mut out);
        let (decoded, rest) = Pdu::decode(Cursor::new(&out)).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, trap);
    }

    #[test]
    fn unsupported_pdu_tag_is_rejected() {
        let mut out = BytesMut::new();
        benc::encode_container(0xBF, &[], &mut out);
        assert!(matches!(
            Pdu::decode(Cursor::new(&out)),
            Err(SnmpError::UnsupportedPdu(0xBF))
        ));
    }
}
