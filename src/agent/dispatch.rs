//! Request pipeline (C5): turns a decoded PDU into a response PDU by
//! walking the object-provider registry.

use crate::agent::registry::{GetOutcome, Registry};
use crate::error::ErrorStatus;
use crate::pdu::{GenericPdu, Pdu, Varbind};
use crate::smi::SmiValue;

/// Hard cap on varbinds a single GetBulk response may carry.
pub const MAX_BULK_VARBINDS: usize = 50;

/// Process one decoded PDU against `registry`, returning the response
/// PDU to send back, or `None` when no reply is warranted (traps, and
/// anything that is itself a reply).
///
/// `legacy` selects RFC 1157 v1 GET semantics (abort-on-first-error,
/// no exception markers) over the RFC 1905 v2c/v3 style used otherwise.
pub async fn handle_pdu(pdu: &Pdu, registry: &Registry, legacy: bool) -> Option<Pdu> {
    match pdu {
        Pdu::GetRequest(p) => Some(Pdu::GetResponse(handle_get(p, registry, legacy).await)),
        Pdu::GetNextRequest(p) => Some(Pdu::GetResponse(handle_get_next(p, registry, legacy).await)),
        Pdu::GetBulkRequest(p) => Some(Pdu::GetResponse(handle_get_bulk(p, registry).await)),
        Pdu::SetRequest(p) => Some(Pdu::GetResponse(handle_set(p, registry).await)),
        Pdu::InformRequest(p) => Some(Pdu::GetResponse(GenericPdu {
            request_id: p.request_id,
            field2: 0,
            field3: 0,
            varbinds: p.varbinds.clone(),
        })),
        Pdu::TrapV2(_) | Pdu::TrapV1(_) | Pdu::GetResponse(_) | Pdu::Report(_) => None,
    }
}

fn error_response(request: &GenericPdu, status: ErrorStatus, index: usize) -> GenericPdu {
    GenericPdu {
        request_id: request.request_id,
        field2: status.as_i32(),
        field3: index as i32,
        varbinds: request.varbinds.clone(),
    }
}

async fn handle_get(request: &GenericPdu, registry: &Registry, legacy: bool) -> GenericPdu {
    let mut varbinds = Vec::with_capacity(request.varbinds.len());
    for (idx, vb) in request.varbinds.iter().enumerate() {
        match registry.get(&vb.oid).await {
            GetOutcome::Value(v) => varbinds.push(Varbind::new(vb.oid.clone(), v)),
            GetOutcome::NoSuchObject | GetOutcome::NoSuchInstance if legacy => {
                return error_response(request, ErrorStatus::NoSuchName, idx + 1);
            }
            GetOutcome::NoSuchObject => varbinds.push(Varbind::new(vb.oid.clone(), SmiValue::NoSuchObject)),
            GetOutcome::NoSuchInstance => varbinds.push(Varbind::new(vb.oid.clone(), SmiValue::NoSuchInstance)),
        }
    }
    GenericPdu {
        request_id: request.request_id,
        field2: 0,
        field3: 0,
        varbinds,
    }
}

async fn handle_get_next(request: &GenericPdu, registry: &Registry, legacy: bool) -> GenericPdu {
    let mut varbinds = Vec::with_capacity(request.varbinds.len());
    for (idx, vb) in request.varbinds.iter().enumerate() {
        match registry.get_next(&vb.oid).await {
            Some((next_oid, value)) => varbinds.push(Varbind::new(next_oid, value)),
            None if legacy => {
                return error_response(request, ErrorStatus::NoSuchName, idx + 1);
            }
            None => varbinds.push(Varbind::new(vb.oid.clone(), SmiValue::EndOfMibView)),
        }
    }
    GenericPdu {
        request_id: request.request_id,
        field2: 0,
        field3: 0,
        varbinds,
    }
}

async fn handle_get_bulk(request: &GenericPdu, registry: &Registry) -> GenericPdu {
    let non_repeaters = request.non_repeaters().max(0) as usize;
    let max_repetitions = request.max_repetitions().max(0) as usize;
    let mut varbinds = Vec::new();

    for vb in request.varbinds.iter().take(non_repeaters) {
        if varbinds.len() >= MAX_BULK_VARBINDS {
            break;
        }
        match registry.get_next(&vb.oid).await {
            Some((next_oid, value)) => varbinds.push(Varbind::new(next_oid, value)),
            None => varbinds.push(Varbind::new(vb.oid.clone(), SmiValue::EndOfMibView)),
        }
    }

    // RFC 3416 §4.2.3: the repeater walk is round-major, not
    // varbind-major — round 1 advances every repeater once, round 2
    // advances every repeater again, and so on, so a manager can zip
    // the flat response back into table rows. Each repeater keeps its
    // own cursor; the whole walk terminates early, before
    // `max_repetitions` rounds are exhausted, once every repeater has
    // hit EndOfMibView rather than padding out the remaining rounds.
    let mut cursors: Vec<_> = request.varbinds.iter().skip(non_repeaters).map(|vb| vb.oid.clone()).collect();
    let mut exhausted = vec![false; cursors.len()];
    'rounds: for _ in 0..max_repetitions {
        if exhausted.iter().all(|&done| done) {
            break;
        }
        for (cursor, done) in cursors.iter_mut().zip(exhausted.iter_mut()) {
            if varbinds.len() >= MAX_BULK_VARBINDS {
                break 'rounds;
            }
            if *done {
                varbinds.push(Varbind::new(cursor.clone(), SmiValue::EndOfMibView));
                continue;
            }
            match registry.get_next(cursor).await {
                Some((next_oid, value)) => {
                    *cursor = next_oid.clone();
                    varbinds.push(Varbind::new(next_oid, value));
                }
                None => {
                    *done = true;
                    varbinds.push(Varbind::new(cursor.clone(), SmiValue::EndOfMibView));
                }
            }
        }
    }

    GenericPdu {
        request_id: request.request_id,
        field2: 0,
        field3: 0,
        varbinds,
    }
}

/// SetRequest with best-effort two-phase rollback: each varbind's prior
/// value is captured before the write so a later failure in the same
/// request can restore everything already applied. If a restore itself
/// fails, the response reports `UndoFailed` rather than the original
/// error, since the agent's state is now inconsistent with both the
/// request and its own prior state.
async fn handle_set(request: &GenericPdu, registry: &Registry) -> GenericPdu {
    let mut applied: Vec<(crate::oid::Oid, GetOutcome)> = Vec::with_capacity(request.varbinds.len());
    for (idx, vb) in request.varbinds.iter().enumerate() {
        let prior = registry.get(&vb.oid).await;
        match registry.set(&vb.oid, vb.value.clone()).await {
            Ok(()) => applied.push((vb.oid.clone(), prior)),
            Err(status) => {
                for (oid, prior_outcome) in applied.into_iter().rev() {
                    if let GetOutcome::Value(prior_value) = prior_outcome {
                        if registry.set(&oid, prior_value).await.is_err() {
                            return error_response(request, ErrorStatus::UndoFailed, idx + 1);
                        }
                    }
                }
                return error_response(request, status, idx + 1);
            }
        }
    }
    GenericPdu {
        request_id: request.request_id,
        field2: 0,
        field3: 0,
        varbinds: request.varbinds.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::registry::ObjectProvider;
    use crate::oid::Oid;
    use std::sync::{Arc, Mutex};

    struct Cell {
        oid: Oid,
        value: Mutex<i32>,
        read_only: bool,
    }

    impl ObjectProvider for Cell {
        fn get(&self, oid: &Oid) -> GetOutcome {
            if oid == &self.oid {
                GetOutcome::Value(SmiValue::Integer(*self.value.lock().unwrap()))
            } else {
                GetOutcome::NoSuchInstance
            }
        }

        fn get_next(&self, oid: &Oid) -> Option<(Oid, SmiValue)> {
            if &self.oid > oid {
                Some((self.oid.clone(), SmiValue::Integer(*self.value.lock().unwrap())))
            } else {
                None
            }
        }

        fn set(&self, oid: &Oid, value: SmiValue) -> Result<(), ErrorStatus> {
            if self.read_only {
                return Err(ErrorStatus::ReadOnly);
            }
            if oid != &self.oid {
                return Err(ErrorStatus::NoCreation);
            }
            match value {
                SmiValue::Integer(v) => {
                    *self.value.lock().unwrap() = v;
                    Ok(())
                }
                _ => Err(ErrorStatus::WrongType),
            }
        }
    }

    async fn registry_with_one_cell(read_only: bool) -> (Registry, Oid) {
        let registry = Registry::new();
        let oid = Oid::from(&[1, 3, 6, 1, 4, 1, 2, 1][..]);
        registry
            .register(
                oid.clone(),
                Arc::new(Cell {
                    oid: oid.clone(),
                    value: Mutex::new(5),
                    read_only,
                }),
            )
            .await;
        (registry, oid)
    }

    #[tokio::test]
    async fn get_request_hit_returns_value() {
        let (registry, oid) = registry_with_one_cell(true).await;
        let request = GenericPdu {
            request_id: 1,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(oid.clone(), SmiValue::Null)],
        };
        let response = handle_get(&request, &registry, false).await;
        assert_eq!(response.field2, 0);
        assert_eq!(response.varbinds[0].value, SmiValue::Integer(5));
    }

    #[tokio::test]
    async fn get_request_miss_yields_no_such_object_in_v2_mode() {
        let (registry, _oid) = registry_with_one_cell(true).await;
        let missing = Oid::from(&[1, 3, 6, 1, 4, 1, 9, 9][..]);
        let request = GenericPdu {
            request_id: 1,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(missing, SmiValue::Null)],
        };
        let response = handle_get(&request, &registry, false).await;
        assert_eq!(response.field2, 0);
        assert_eq!(response.varbinds[0].value, SmiValue::NoSuchObject);
    }

    #[tokio::test]
    async fn get_request_miss_yields_no_such_name_in_v1_mode() {
        let (registry, _oid) = registry_with_one_cell(true).await;
        let missing = Oid::from(&[1, 3, 6, 1, 4, 1, 9, 9][..]);
        let request = GenericPdu {
            request_id: 1,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(missing, SmiValue::Null)],
        };
        let response = handle_get(&request, &registry, true).await;
        assert_eq!(response.field2, ErrorStatus::NoSuchName.as_i32());
        assert_eq!(response.field3, 1);
    }

    #[tokio::test]
    async fn set_request_on_read_only_cell_is_rejected_and_unchanged() {
        let (registry, oid) = registry_with_one_cell(true).await;
        let request = GenericPdu {
            request_id: 1,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(oid.clone(), SmiValue::Integer(99))],
        };
        let response = handle_set(&request, &registry).await;
        assert_eq!(response.field2, ErrorStatus::ReadOnly.as_i32());
        assert_eq!(registry.get(&oid).await, GetOutcome::Value(SmiValue::Integer(5)));
    }

    #[tokio::test]
    async fn set_request_writable_cell_succeeds() {
        let (registry, oid) = registry_with_one_cell(false).await;
        let request = GenericPdu {
            request_id: 1,
            field2: 0,
            field3: 0,
            varbinds: vec![Varbind::new(oid.clone(), SmiValue::Integer(99))],
        };
        let response = handle_set(&request, &registry).await;
        assert_eq!(response.field2, 0);
        assert_eq!(registry.get(&oid).await, GetOutcome::Value(SmiValue::Integer(99)));
    }
}
