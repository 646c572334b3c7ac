//! Message & PDU framing (C3): v1/v2c envelopes and the v3
//! header/scoped-PDU structure.

use bytes::BytesMut;

use crate::ber::decode::{decode_integer, decode_octets, Cursor};
use crate::ber::encode as benc;
use crate::ber::{TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::error::{DecodeErrorKind, SnmpError};
use crate::pdu::Pdu;

pub const VERSION_V1: i32 = 0;
pub const VERSION_V2C: i32 = 1;
pub const VERSION_V3: i32 = 3;

pub const FLAG_AUTH: u8 = 0b001;
pub const FLAG_PRIV: u8 = 0b010;
pub const FLAG_REPORTABLE: u8 = 0b100;

/// A v1 or v2c message: `Sequence { Integer(version), OctetString(community), Pdu }`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpMessage {
    pub version: i32,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl SnmpMessage {
    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        benc::encode_integer(self.version as i64, &mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &self.community, &mut body);
        self.pdu.encode(&mut body);
        let mut out = BytesMut::new();
        benc::encode_container(TAG_SEQUENCE, &body, &mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<SnmpMessage, SnmpError> {
        let cur = Cursor::new(bytes);
        let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
        if !rest.is_empty() {
            return Err(SnmpError::decode(rest.offset(), DecodeErrorKind::TrailingData));
        }
        let (val, r) = seq.expect_tag(TAG_INTEGER)?;
        let version = decode_integer(val)? as i32;
        if version != VERSION_V1 && version != VERSION_V2C {
            return Err(SnmpError::UnsupportedVersion(version));
        }
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let community = decode_octets(val);
        let (pdu, r) = Pdu::decode(r)?;
        if !r.is_empty() {
            return Err(SnmpError::decode(r.offset(), DecodeErrorKind::TrailingData));
        }
        Ok(SnmpMessage {
            version,
            community,
            pdu,
        })
    }
}

/// `msgFlags`/`msgSecurityModel` header shared by every v3 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderDataV3 {
    pub msg_id: i32,
    pub max_size: i32,
    pub flags: u8,
    pub security_model: i32,
}

impl HeaderDataV3 {
    pub fn is_authenticated(&self) -> bool {
        self.flags & FLAG_AUTH != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_PRIV != 0
    }

    pub fn is_reportable(&self) -> bool {
        self.flags & FLAG_REPORTABLE != 0
    }

    fn encode(&self, out: &mut BytesMut) {
        let mut body = BytesMut::new();
        benc::encode_integer(self.msg_id as i64, &mut body);
        benc::encode_integer(self.max_size as i64, &mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &[self.flags], &mut body);
        benc::encode_integer(self.security_model as i64, &mut body);
        benc::encode_container(TAG_SEQUENCE, &body, out);
    }

    fn decode(cur: Cursor<'_>) -> Result<(HeaderDataV3, Cursor<'_>), SnmpError> {
        let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
        let (val, r) = seq.expect_tag(TAG_INTEGER)?;
        let msg_id = decode_integer(val)? as i32;
        let (val, r) = r.expect_tag(TAG_INTEGER)?;
        let max_size = decode_integer(val)? as i32;
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let flag_bytes = decode_octets(val);
        if flag_bytes.len() != 1 {
            return Err(SnmpError::InvalidHeaderData);
        }
        let (val, r) = r.expect_tag(TAG_INTEGER)?;
        let security_model = decode_integer(val)? as i32;
        if !r.is_empty() {
            return Err(SnmpError::decode(r.offset(), DecodeErrorKind::TrailingData));
        }
        Ok((
            HeaderDataV3 {
                msg_id,
                max_size,
                flags: flag_bytes[0],
                security_model,
            },
            rest,
        ))
    }
}

/// `Sequence { OctetString(contextEngineID), OctetString(contextName), Pdu }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPdu {
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    pub pdu: Pdu,
}

impl ScopedPdu {
    fn encode_inner(&self, out: &mut BytesMut) {
        let mut body = BytesMut::new();
        benc::encode_octet_string(TAG_OCTET_STRING, &self.context_engine_id, &mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &self.context_name, &mut body);
        self.pdu.encode(&mut body);
        benc::encode_container(TAG_SEQUENCE, &body, out);
    }

    fn decode_inner(cur: Cursor<'_>) -> Result<(ScopedPdu, Cursor<'_>), SnmpError> {
        let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
        let (val, r) = seq.expect_tag(TAG_OCTET_STRING)?;
        let context_engine_id = decode_octets(val);
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let context_name = decode_octets(val);
        let (pdu, r) = Pdu::decode(r)?;
        if !r.is_empty() {
            return Err(SnmpError::InvalidScopedPdu);
        }
        Ok((
            ScopedPdu {
                context_engine_id,
                context_name,
                pdu,
            },
            rest,
        ))
    }
}

/// Either a plaintext scoped PDU, or (when the priv flag is set) the
/// raw privacy ciphertext awaiting decryption.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopedPduData {
    Plaintext(ScopedPdu),
    Encrypted(Vec<u8>),
}

/// A full SNMPv3 message.
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpMessageV3 {
    pub header: HeaderDataV3,
    pub security_params: Vec<u8>,
    pub scoped_data: ScopedPduData,
}

impl SnmpMessageV3 {
    pub fn encode(&self) -> BytesMut {
        let mut body = BytesMut::new();
        benc::encode_integer(VERSION_V3 as i64, &mut body);
        self.header.encode(&mut body);
        benc::encode_octet_string(TAG_OCTET_STRING, &self.security_params, &mut body);
        match &self.scoped_data {
            ScopedPduData::Plaintext(sp) => sp.encode_inner(&mut body),
            ScopedPduData::Encrypted(ct) => benc::encode_octet_string(TAG_OCTET_STRING, ct, &mut body),
        }
        let mut out = BytesMut::new();
        benc::encode_container(TAG_SEQUENCE, &body, &mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<SnmpMessageV3, SnmpError> {
        Self::decode_with_layout(bytes).map(|(msg, _layout)| msg)
    }

    /// Same as [`decode`](Self::decode), but also returns the absolute
    /// byte offset at which the `msgSecurityParameters` OCTET STRING's
    /// content begins in `bytes`. USM authentication needs that offset
    /// to re-zero `msgAuthenticationParameters` at its exact wire
    /// position when recomputing the digest over the received message.
    pub fn decode_with_layout(bytes: &[u8]) -> Result<(SnmpMessageV3, V3Layout), SnmpError> {
        let cur = Cursor::new(bytes);
        let (seq, rest) = cur.expect_tag(TAG_SEQUENCE)?;
        if !rest.is_empty() {
            return Err(SnmpError::decode(rest.offset(), DecodeErrorKind::TrailingData));
        }
        let (val, r) = seq.expect_tag(TAG_INTEGER)?;
        let version = decode_integer(val)? as i32;
        if version != VERSION_V3 {
            return Err(SnmpError::UnsupportedVersion(version));
        }
        let (header, r) = HeaderDataV3::decode(r)?;
        let (val, r) = r.expect_tag(TAG_OCTET_STRING)?;
        let security_params_offset = val.offset();
        let security_params = decode_octets(val);
        let scoped_data = if header.is_encrypted() {
            let (val, r2) = r.expect_tag(TAG_OCTET_STRING)?;
            if !r2.is_empty() {
                return Err(SnmpError::decode(r2.offset(), DecodeErrorKind::TrailingData));
            }
            ScopedPduData::Encrypted(decode_octets(val))
        } else {
            let (sp, r2) = ScopedPdu::decode_inner(r)?;
            if !r2.is_empty() {
                return Err(SnmpError::decode(r2.offset(), DecodeErrorKind::TrailingData));
            }
            ScopedPduData::Plaintext(sp)
        };
        Ok((
            SnmpMessageV3 {
                header,
                security_params,
                scoped_data,
            },
            V3Layout { security_params_offset },
        ))
    }
}

/// Wire-layout facts about a decoded [`SnmpMessageV3`] that are not
/// part of its logical value but are needed to re-derive USM digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3Layout {
    pub security_params_offset: usize,
}

/// Decode a standalone scoped-PDU buffer (used after USM privacy
/// decryption, where the plaintext is no longer embedded in a larger
/// message cursor).
pub fn decode_scoped_pdu_bytes(bytes: &[u8]) -> Result<ScopedPdu, SnmpError> {
    let (sp, rest) = ScopedPdu::decode_inner(Cursor::new(bytes))?;
    if !rest.is_empty() {
        return Err(SnmpError::decode(rest.offset(), DecodeErrorKind::TrailingData));
    }
    Ok(sp)
}

/// Encode a standalone scoped PDU, e.g. before USM privacy encryption.
pub fn encode_scoped_pdu_bytes(sp: &ScopedPdu) -> BytesMut {
    let mut out = BytesMut::new();
    sp.encode_inner(&mut out);
    out
}

/// Dispatches on the leading version integer without committing to a
/// v1/v2c vs v3 shape up front.
#[derive(Debug, Clone, PartialEq)]
pub enum SnmpGenericMessage {
    V1(SnmpMessage),
    V2c(SnmpMessage),
    V3(SnmpMessageV3),
}

pub fn decode_generic(bytes: &[u8]) -> Result<SnmpGenericMessage, SnmpError> {
    let cur = Cursor::new(bytes);
    let (seq, _rest) = cur.expect_tag(TAG_SEQUENCE)?;
    let (val, _) = seq.expect_tag(TAG_INTEGER)?;
    let version = decode_integer(val)?;
    match version {
        0 => Ok(SnmpGenericMessage::V1(SnmpMessage::decode(bytes)?)),
        1 => Ok(SnmpGenericMessage::V2c(SnmpMessage::decode(bytes)?)),
        3 => Ok(SnmpGenericMessage::V3(SnmpMessageV3::decode(bytes)?)),
        other => Err(SnmpError::UnsupportedVersion(other as i32)),
    }
}

/// Same dispatch as [`decode_generic`], but a v3 message additionally
/// carries its [`V3Layout`] for USM digest verification.
pub enum GenericMessageWithLayout {
    V1(SnmpMessage),
    V2c(SnmpMessage),
    V3(SnmpMessageV3, V3Layout),
}

pub fn decode_generic_with_layout(bytes: &[u8]) -> Result<GenericMessageWithLayout, SnmpError> {
    let cur = Cursor::new(bytes);
    let (seq, _rest) = cur.expect_tag(TAG_SEQUENCE)?;
    let (val, _) = seq.expect_tag(TAG_INTEGER)?;
    let version = decode_integer(val)?;
    match version {
        0 => Ok(GenericMessageWithLayout::V1(SnmpMessage::decode(bytes)?)),
        1 => Ok(GenericMessageWithLayout::V2c(SnmpMessage::decode(bytes)?)),
        3 => {
            let (msg, layout) = SnmpMessageV3::decode_with_layout(bytes)?;
            Ok(GenericMessageWithLayout::V3(msg, layout))
        }
        other => Err(SnmpError::UnsupportedVersion(other as i32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::Oid;
    use crate::pdu::{GenericPdu, Varbind};
    use crate::smi::SmiValue;

    fn sample_pdu() -> Pdu {
        Pdu::GetRequest(GenericPdu {
            request_id: 38,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(
                Oid::from(&[1, 3, 6, 1, 2, 1, 1, 2, 0][..]),
                SmiValue::Null,
            )],
        })
    }

    #[test]
    fn v1_message_round_trips() {
        let msg = SnmpMessage {
            version: VERSION_V1,
            community: b"public".to_vec(),
            pdu: sample_pdu(),
        };
        let encoded = msg.encode();
        let decoded = SnmpMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn v2c_message_round_trips() {
        let msg = SnmpMessage {
            version: VERSION_V2C,
            community: b"public".to_vec(),
            pdu: sample_pdu(),
        };
        let encoded = msg.encode();
        match decode_generic(&encoded).unwrap() {
            SnmpGenericMessage::V2c(decoded) => assert_eq!(decoded, msg),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn v3_plaintext_round_trips() {
        let msg = SnmpMessageV3 {
            header: HeaderDataV3 {
                msg_id: 821490644,
                max_size: 65507,
                flags: FLAG_REPORTABLE,
                security_model: 3,
            },
            security_params: vec![],
            scoped_data: ScopedPduData::Plaintext(ScopedPdu {
                context_engine_id: vec![0x80, 0x00, 0x1f, 0x88],
                context_name: vec![],
                pdu: sample_pdu(),
            }),
        };
        let encoded = msg.encode();
        let decoded = SnmpMessageV3::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn v3_encrypted_round_trips() {
        let msg = SnmpMessageV3 {
            header: HeaderDataV3 {
                msg_id: 1,
                max_size: 65507,
                flags: FLAG_AUTH | FLAG_PRIV,
                security_model: 3,
            },
            security_params: vec![1, 2, 3],
            scoped_data: ScopedPduData::Encrypted(vec![0xAA; 24]),
        };
        let encoded = msg.encode();
        let decoded = SnmpMessageV3::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut body = BytesMut::new();
        benc::encode_integer(9, &mut body);
        let mut out = BytesMut::new();
        benc::encode_container(TAG_SEQUENCE, &body, &mut out);
        assert!(matches!(
            decode_generic(&out),
            Err(SnmpError::UnsupportedVersion(9))
        ));
    }
}
