use crate::fixtures::{public_key, registered_engine, signing_root, GENESIS_ROOT};
use guardrail::application::SlashingProtection;
use guardrail::domain::Watermarks;
use guardrail::foundation::{ProtectionError, ValidatorId};
use guardrail::infrastructure::store::{ProtectionStore, RocksStore};
use tempfile::TempDir;

#[test]
fn block_decisions_are_recorded_and_idempotent() {
    let engine = registered_engine(&[0x2a]);

    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("first decision"));
    let blocks = engine.store().list_blocks(ValidatorId::new(1)).expect("blocks");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].slot, 2);

    // Identical re-sign: permitted again, still exactly one record.
    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("re-sign"));
    assert_eq!(engine.store().list_blocks(ValidatorId::new(1)).expect("blocks").len(), 1);

    // Different root at the same slot: refused, store unchanged.
    assert!(!engine.may_sign_block(&public_key(0x2a), &signing_root(4), 2).expect("conflicting"));
    let blocks = engine.store().list_blocks(ValidatorId::new(1)).expect("blocks");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].signing_root, Some(signing_root(3)));
}

#[test]
fn unregistered_key_is_an_error_not_a_deny() {
    let engine = registered_engine(&[0x2a]);

    let err = engine.may_sign_block(&public_key(0x2b), &signing_root(3), 2).expect_err("unregistered");
    assert!(matches!(err, ProtectionError::UnregisteredValidator { .. }));

    let err = engine.may_sign_attestation(&public_key(0x2b), &signing_root(3), 10, 20).expect_err("unregistered");
    assert!(matches!(err, ProtectionError::UnregisteredValidator { .. }));

    // No store mutation happened.
    assert_eq!(engine.store().list_validators().expect("validators").len(), 1);
    assert!(engine.store().list_blocks(ValidatorId::new(1)).expect("blocks").is_empty());
}

#[test]
fn attestation_decisions_enforce_surround_rules() {
    let engine = registered_engine(&[0x2a]);

    assert!(engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("first vote"));

    // (11, 19) is surrounded by the stored (10, 20); (9, 21) would surround it.
    assert!(!engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 11, 19).expect("surrounded"));
    assert!(!engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 9, 21).expect("surrounds"));

    // (11, 21) advances both epochs: no surround relation, permitted.
    assert!(engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 11, 21).expect("advancing vote"));

    let attestations = engine.store().list_attestations(ValidatorId::new(1)).expect("attestations");
    assert_eq!(attestations.len(), 2);
}

#[test]
fn attestation_double_vote_and_malformed_requests() {
    let engine = registered_engine(&[0x2a]);

    assert!(engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("first vote"));

    // Same target, different root: double vote.
    assert!(!engine.may_sign_attestation(&public_key(0x2a), &signing_root(4), 10, 20).expect("double vote"));
    // Same target, same root: idempotent.
    assert!(engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("re-sign"));

    // source > target is malformed: refused with no record and no error.
    assert!(!engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 21, 20).expect("malformed"));
    assert_eq!(engine.store().list_attestations(ValidatorId::new(1)).expect("attestations").len(), 1);
}

#[test]
fn watermarks_gate_decisions_and_prune_history() {
    let engine = registered_engine(&[0x2a]);

    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("sign"));

    engine
        .set_watermarks(&public_key(0x2a), Watermarks { min_block_slot: Some(2), ..Default::default() })
        .expect("raise watermark");

    // The record at slot 2 was pruned and the floor refuses slots at or below it.
    assert!(engine.store().list_blocks(ValidatorId::new(1)).expect("blocks").is_empty());
    assert!(!engine.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("at floor"));
    assert!(!engine.may_sign_block(&public_key(0x2a), &signing_root(3), 1).expect("below floor"));
    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 3).expect("above floor"));
}

#[test]
fn source_watermark_is_inclusive() {
    let engine = registered_engine(&[0x2a]);

    engine
        .set_watermarks(&public_key(0x2a), Watermarks { min_source_epoch: Some(5), ..Default::default() })
        .expect("raise watermark");

    assert!(!engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 4, 10).expect("below source floor"));
    assert!(engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 5, 10).expect("at source floor"));
}

#[test]
fn watermarks_never_lower() {
    let engine = registered_engine(&[0x2a]);

    engine
        .set_watermarks(&public_key(0x2a), Watermarks { min_block_slot: Some(10), ..Default::default() })
        .expect("raise");
    engine
        .set_watermarks(&public_key(0x2a), Watermarks { min_block_slot: Some(4), ..Default::default() })
        .expect("attempt lower");

    assert!(!engine.may_sign_block(&public_key(0x2a), &signing_root(3), 10).expect("still gated"));
    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 11).expect("above floor"));
}

#[test]
fn decisions_survive_restart() {
    let temp_dir = TempDir::new().expect("temp dir");

    {
        let store = RocksStore::open_in_dir(temp_dir.path()).expect("open");
        let engine = SlashingProtection::new(store, GENESIS_ROOT).expect("engine");
        engine.register_validators(&[public_key(0x2a)]).expect("register");
        assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("sign"));
    }

    let store = RocksStore::open_in_dir(temp_dir.path()).expect("reopen");
    let engine = SlashingProtection::new(store, GENESIS_ROOT).expect("engine");
    // The registry cache warms from the store, so no re-registration is needed.
    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("idempotent after restart"));
    assert!(!engine.may_sign_block(&public_key(0x2a), &signing_root(4), 2).expect("conflict after restart"));
}

#[test]
fn engine_refuses_store_bound_to_other_genesis_root() {
    let temp_dir = TempDir::new().expect("temp dir");
    {
        let store = RocksStore::open_in_dir(temp_dir.path()).expect("open");
        SlashingProtection::new(store, GENESIS_ROOT).expect("engine");
    }

    let store = RocksStore::open_in_dir(temp_dir.path()).expect("reopen");
    let err = SlashingProtection::new(store, "0xdead").expect_err("mismatched root");
    assert!(matches!(err, ProtectionError::GenesisValidatorsRootMismatch { .. }));
}
