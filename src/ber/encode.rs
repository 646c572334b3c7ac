//! BER encoding into a growable buffer.
//!
//! Every `encode_*` function appends a complete TLV (tag, minimal
//! length, value) to `out`. Callers building a constructed value
//! (SEQUENCE, a PDU) encode their children into a scratch buffer first,
//! then wrap it with [`encode_container`].

use bytes::{BufMut, BytesMut};

use super::{TAG_INTEGER, TAG_NULL, TAG_OID};

/// Append a BER length in minimal (shortest) form.
pub fn encode_length(len: usize, out: &mut BytesMut) {
    if len < 128 {
        out.put_u8(len as u8);
        return;
    }
    let mut v = len as u64;
    let mut bytes_needed = 1;
    while v > 0xFF {
        v >>= 8;
        bytes_needed += 1;
    }
    let full = (len as u64).to_be_bytes();
    out.put_u8(0x80 | bytes_needed as u8);
    out.put_slice(&full[8 - bytes_needed..]);
}

/// Append tag + length + raw bytes as a single TLV.
pub fn encode_tlv(tag: u8, body: &[u8], out: &mut BytesMut) {
    out.put_u8(tag);
    encode_length(body.len(), out);
    out.put_slice(body);
}

/// Wrap already-encoded child TLVs in a constructed container (a
/// SEQUENCE, or a context-tagged PDU).
pub fn encode_container(tag: u8, body: &[u8], out: &mut BytesMut) {
    encode_tlv(tag, body, out);
}

/// Shortest two's-complement big-endian encoding of a signed integer.
fn integer_body(value: i64) -> Vec<u8> {
    if value == 0 {
        return vec![0x00];
    }
    let mut bytes = value.to_be_bytes().to_vec();
    if value > 0 {
        while bytes.len() > 1 && bytes[0] == 0x00 && bytes[1] & 0x80 == 0 {
            bytes.remove(0);
        }
        if bytes[0] & 0x80 != 0 {
            bytes.insert(0, 0x00);
        }
    } else {
        while bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0x80 != 0 {
            bytes.remove(0);
        }
    }
    bytes
}

pub fn encode_integer(value: i64, out: &mut BytesMut) {
    let body = integer_body(value);
    encode_tlv(TAG_INTEGER, &body, out);
}

/// Encode an unsigned value (Counter32/Gauge32/TimeTicks/Counter64)
/// under the given application tag, prefixing a 0x00 sign octet when
/// the MSB of the shortest form would otherwise be set.
pub fn encode_unsigned(tag: u8, value: u64, out: &mut BytesMut) {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0x00 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0x00);
    }
    encode_tlv(tag, &bytes, out);
}

pub fn encode_null(out: &mut BytesMut) {
    encode_tlv(TAG_NULL, &[], out);
}

pub fn encode_octet_string(tag: u8, bytes: &[u8], out: &mut BytesMut) {
    encode_tlv(tag, bytes, out);
}

/// Encode an OBJECT IDENTIFIER body: `40*arc[0] + arc[1]` as the first
/// octet, remaining arcs in base-128 continuation form.
pub fn encode_oid(arcs: &[u32], out: &mut BytesMut) {
    let mut body = Vec::with_capacity(arcs.len() + 2);
    body.push((40 * arcs[0] + arcs[1]) as u8);
    for &arc in &arcs[2..] {
        body.extend(encode_base128(arc));
    }
    encode_tlv(TAG_OID, &body, out);
}

fn encode_base128(mut value: u32) -> Vec<u8> {
    let mut groups = vec![value & 0x7F];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) | 0x80);
        value >>= 7;
    }
    groups.reverse();
    groups.into_iter().map(|g| g as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::decode::{decode_integer, decode_oid, Cursor};

    #[test]
    fn integer_round_trip_samples() {
        for &n in &[-8_i64, 0, 127, 128, -129, 1024, i32::MIN as i64, i32::MAX as i64] {
            let mut out = BytesMut::new();
            encode_integer(n, &mut out);
            let (value, rest) = Cursor::new(&out).expect_tag(TAG_INTEGER).unwrap();
            assert!(rest.is_empty());
            assert_eq!(decode_integer(value).unwrap(), n);
        }
    }

    #[test]
    fn integer_minus_eight_encodes_single_byte_two_complement() {
        let mut out = BytesMut::new();
        encode_integer(-8, &mut out);
        assert_eq!(&out[..], &[0x02, 0x01, 0xF8]);
    }

    #[test]
    fn integer_1024_needs_leading_zero_octet() {
        let mut out = BytesMut::new();
        encode_integer(1024, &mut out);
        assert_eq!(&out[..], &[0x02, 0x02, 0x04, 0x00]);
    }

    #[test]
    fn oid_encodes_known_arc_sequence() {
        let mut out = BytesMut::new();
        encode_oid(&[1, 3, 6, 1, 4, 1, 55], &mut out);
        assert_eq!(&out[..], &[0x06, 0x06, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x37]);
    }

    #[test]
    fn oid_round_trips() {
        let arcs = vec![1u32, 3, 6, 1, 2, 1, 1, 1, 0];
        let mut out = BytesMut::new();
        encode_oid(&arcs, &mut out);
        let (value, rest) = Cursor::new(&out).expect_tag(TAG_OID).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decode_oid(value).unwrap(), arcs);
    }

    #[test]
    fn long_form_length_for_134_byte_body() {
        let body = vec![0u8; 134];
        let mut out = BytesMut::new();
        encode_container(super::super::TAG_SEQUENCE, &body, &mut out);
        assert_eq!(&out[..3], &[0x30, 0x81, 0x86]);
        assert_eq!(out.len(), 3 + 134);
    }
}
