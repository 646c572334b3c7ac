//! End-to-end coverage for SNMPv1 framing and the legacy GET semantics
//! (abort-on-first-error, no exception markers) that distinguish it
//! from v2c.

use snmp_core::agent::{handle_pdu, GetOutcome, ObjectProvider, Registry};
use snmp_core::error::ErrorStatus;
use snmp_core::message::{SnmpMessage, VERSION_V1};
use snmp_core::oid::Oid;
use snmp_core::pdu::{GenericPdu, Pdu, TrapV1Pdu, Varbind};
use snmp_core::smi::SmiValue;

struct SysDescr(String);

impl ObjectProvider for SysDescr {
    fn get(&self, oid: &Oid) -> GetOutcome {
        if oid == &Oid::from(&[1, 3, 6, 1, 2, 1, 1, 1, 0][..]) {
            GetOutcome::Value(SmiValue::OctetString(self.0.clone().into_bytes()))
        } else {
            GetOutcome::NoSuchObject
        }
    }

    fn get_next(&self, oid: &Oid) -> Option<(Oid, SmiValue)> {
        let root = Oid::from(&[1, 3, 6, 1, 2, 1, 1, 1, 0][..]);
        if oid < &root {
            Some((root, SmiValue::OctetString(self.0.clone().into_bytes())))
        } else {
            None
        }
    }

    fn set(&self, _oid: &Oid, _value: SmiValue) -> Result<(), ErrorStatus> {
        Err(ErrorStatus::ReadOnly)
    }
}

fn get_request(request_id: i32, oid: Oid) -> SnmpMessage {
    SnmpMessage {
        version: VERSION_V1,
        community: b"public".to_vec(),
        pdu: Pdu::GetRequest(GenericPdu {
            request_id,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(oid, SmiValue::Null)],
        }),
    }
}

#[test]
fn v1_message_framing_round_trips_over_the_wire() {
    let msg = get_request(38, Oid::from(&[1, 3, 6, 1, 2, 1, 1, 1, 0][..]));
    let encoded = msg.encode();
    let decoded = SnmpMessage::decode(&encoded).expect("well-formed v1 message decodes");
    assert_eq!(decoded, msg);
    assert_eq!(decoded.version, VERSION_V1);
    assert_eq!(&decoded.community, b"public");
}

#[test]
fn v1_trap_coldstart_round_trips() {
    let msg = SnmpMessage {
        version: VERSION_V1,
        community: b"public".to_vec(),
        pdu: Pdu::TrapV1(TrapV1Pdu {
            enterprise: Oid::from(&[1, 3, 6, 1, 4, 1, 4, 1, 2, 21][..]),
            agent_address: [127, 0, 0, 1],
            generic_trap: 0,
            specific_trap: 0,
            uptime: 12345,
            varbinds: vec![],
        }),
    };
    let encoded = msg.encode();
    let decoded = SnmpMessage::decode(&encoded).expect("trap decodes");
    assert_eq!(decoded, msg);
    match decoded.pdu {
        Pdu::TrapV1(trap) => assert_eq!(trap.agent_address, [127, 0, 0, 1]),
        other => panic!("expected TrapV1, got {other:?}"),
    }
}

#[tokio::test]
async fn v1_get_on_known_oid_succeeds() {
    let registry = Registry::new();
    registry
        .register(
            Oid::from(&[1, 3, 6, 1, 2, 1, 1][..]),
            std::sync::Arc::new(SysDescr("test system".to_string())),
        )
        .await;

    let request = Pdu::GetRequest(GenericPdu {
        request_id: 1,
        field2: 0,
        field3: 0,
        varbinds: vec![Varbind::new(Oid::from(&[1, 3, 6, 1, 2, 1, 1, 1, 0][..]), SmiValue::Null)],
    });
    let response = handle_pdu(&request, &registry, true).await.expect("GET gets a reply");
    match response {
        Pdu::GetResponse(p) => {
            assert_eq!(p.error_status(), ErrorStatus::NoError.as_i32());
            assert_eq!(p.varbinds[0].value, SmiValue::OctetString(b"test system".to_vec()));
        }
        other => panic!("expected GetResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn v1_get_on_unknown_oid_aborts_with_no_such_name() {
    let registry = Registry::new();
    registry
        .register(
            Oid::from(&[1, 3, 6, 1, 2, 1, 1][..]),
            std::sync::Arc::new(SysDescr("test system".to_string())),
        )
        .await;

    // Legacy v1 GET: a miss aborts the whole request with NoSuchName
    // and a 1-based error index, rather than substituting an exception
    // marker the way v2c/v3 would.
    let request = Pdu::GetRequest(GenericPdu {
        request_id: 2,
        field2: 0,
        field3: 0,
        varbinds: vec![Varbind::new(Oid::from(&[1, 3, 6, 1, 2, 1, 99, 0][..]), SmiValue::Null)],
    });
    let response = handle_pdu(&request, &registry, true).await.unwrap();
    match response {
        Pdu::GetResponse(p) => {
            assert_eq!(p.error_status(), ErrorStatus::NoSuchName.as_i32());
            assert_eq!(p.error_index(), 1);
        }
        other => panic!("expected GetResponse, got {other:?}"),
    }
}
