use crate::fixtures::{public_key, registered_engine, signing_root};
use guardrail::foundation::ValidatorId;
use guardrail::infrastructure::store::ProtectionStore;
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_conflicting_blocks_permit_exactly_one() {
    let engine = Arc::new(registered_engine(&[0x2a]));

    let mut handles = Vec::new();
    for tag in 0..8u8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            // Every thread proposes a different root for the same slot.
            engine.may_sign_block(&public_key(0x2a), &signing_root(tag), 2).expect("decision")
        }));
    }

    let permitted = handles.into_iter().map(|handle| handle.join().expect("join")).filter(|ok| *ok).count();
    assert_eq!(permitted, 1);
    assert_eq!(engine.store().list_blocks(ValidatorId::new(1)).expect("blocks").len(), 1);
}

#[test]
fn concurrent_identical_attestations_permit_all_with_one_record() {
    let engine = Arc::new(registered_engine(&[0x2a]));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("decision")
        }));
    }

    for handle in handles {
        assert!(handle.join().expect("join"));
    }
    assert_eq!(engine.store().list_attestations(ValidatorId::new(1)).expect("attestations").len(), 1);
}

#[test]
fn different_validators_do_not_interfere() {
    let engine = Arc::new(registered_engine(&[0x2a, 0x2b]));

    let mut handles = Vec::new();
    for tag in [0x2a, 0x2b] {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for slot in 1..=20u64 {
                assert!(engine.may_sign_block(&public_key(tag), &signing_root(tag), slot).expect("decision"));
            }
        }));
    }
    for handle in handles {
        handle.join().expect("join");
    }

    assert_eq!(engine.store().list_blocks(ValidatorId::new(1)).expect("blocks").len(), 20);
    assert_eq!(engine.store().list_blocks(ValidatorId::new(2)).expect("blocks").len(), 20);
}
