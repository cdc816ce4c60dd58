use crate::fixtures::{memory_engine, public_key, registered_engine, signing_root};
use guardrail::domain::Watermarks;
use guardrail::foundation::{ProtectionError, ValidatorId};
use guardrail::infrastructure::interchange::InterchangeDocument;
use guardrail::infrastructure::store::{HistoryReader, ProtectionStore};

#[test]
fn export_then_import_reproduces_the_store() {
    let source = registered_engine(&[0x2a, 0x2b]);
    assert!(source.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("sign block"));
    assert!(source.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("sign attestation"));
    assert!(source.may_sign_attestation(&public_key(0x2b), &signing_root(5), 1, 2).expect("sign attestation"));

    let exported = source.export_interchange().expect("export");

    let fresh = memory_engine();
    let outcome = fresh.import_interchange(&exported).expect("import");
    assert_eq!(outcome.validators, 2);
    assert_eq!(outcome.imported_blocks, 1);
    assert_eq!(outcome.imported_attestations, 2);

    // A second export of the fresh engine reproduces the document.
    let re_exported = fresh.export_interchange().expect("re-export");
    assert_eq!(exported.to_json_string().expect("json"), re_exported.to_json_string().expect("json"));
}

#[test]
fn import_raises_floors_to_highest_seen_records() {
    let source = registered_engine(&[0x2a]);
    assert!(source.may_sign_block(&public_key(0x2a), &signing_root(3), 5).expect("sign block"));
    assert!(source.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("sign attestation"));
    let exported = source.export_interchange().expect("export");

    let fresh = memory_engine();
    fresh.import_interchange(&exported).expect("import");

    // The imported history is the floor: slots and targets at or below the
    // highest-seen records are refused, fresh coordinates above are permitted.
    assert!(!fresh.may_sign_block(&public_key(0x2a), &signing_root(9), 5).expect("at floor"));
    assert!(fresh.may_sign_block(&public_key(0x2a), &signing_root(9), 6).expect("above floor"));
    assert!(!fresh.may_sign_attestation(&public_key(0x2a), &signing_root(9), 10, 20).expect("at target floor"));
    assert!(fresh.may_sign_attestation(&public_key(0x2a), &signing_root(9), 10, 21).expect("above target floor"));

    let watermarks = fresh.store().watermarks(ValidatorId::new(1)).expect("watermarks").expect("present");
    assert_eq!(watermarks, Watermarks { min_block_slot: Some(5), min_source_epoch: Some(10), min_target_epoch: Some(20) });
}

#[test]
fn import_is_idempotent() {
    let source = registered_engine(&[0x2a]);
    assert!(source.may_sign_block(&public_key(0x2a), &signing_root(3), 2).expect("sign"));
    let exported = source.export_interchange().expect("export");

    let fresh = memory_engine();
    fresh.import_interchange(&exported).expect("first import");
    let outcome = fresh.import_interchange(&exported).expect("second import");
    assert_eq!(outcome.imported_blocks, 0);
    assert_eq!(outcome.skipped_records, 1);
    assert_eq!(fresh.store().list_blocks(ValidatorId::new(1)).expect("blocks").len(), 1);
}

#[test]
fn pruned_watermarks_survive_the_round_trip() {
    let source = registered_engine(&[0x2a]);
    source
        .set_watermarks(&public_key(0x2a), Watermarks { min_block_slot: Some(7), min_source_epoch: Some(4), min_target_epoch: Some(9) })
        .expect("raise");
    let exported = source.export_interchange().expect("export");

    let fresh = memory_engine();
    fresh.import_interchange(&exported).expect("import");

    assert!(!fresh.may_sign_block(&public_key(0x2a), &signing_root(3), 7).expect("at floor"));
    assert!(fresh.may_sign_block(&public_key(0x2a), &signing_root(3), 8).expect("above floor"));
    assert!(!fresh.may_sign_attestation(&public_key(0x2a), &signing_root(3), 3, 10).expect("below source floor"));
    assert!(!fresh.may_sign_attestation(&public_key(0x2a), &signing_root(3), 4, 9).expect("at target floor"));
    assert!(fresh.may_sign_attestation(&public_key(0x2a), &signing_root(3), 4, 10).expect("above floors"));
}

#[test]
fn import_rejects_wrong_version_and_root() {
    let source = registered_engine(&[0x2a]);
    let exported = source.export_interchange().expect("export");

    let fresh = memory_engine();

    let mut wrong_version = exported.clone();
    wrong_version.metadata.interchange_format_version = "4".to_string();
    assert!(matches!(
        fresh.import_interchange(&wrong_version).expect_err("version"),
        ProtectionError::UnsupportedInterchangeVersion { .. }
    ));

    let mut wrong_root = exported;
    wrong_root.metadata.genesis_validators_root = "0xdead".to_string();
    assert!(matches!(
        fresh.import_interchange(&wrong_root).expect_err("root"),
        ProtectionError::GenesisValidatorsRootMismatch { .. }
    ));
}

#[test]
fn import_rejects_conflicting_history() {
    let engine = registered_engine(&[0x2a]);
    assert!(engine.may_sign_attestation(&public_key(0x2a), &signing_root(3), 10, 20).expect("sign"));

    // Build a document whose attestation surrounds the existing vote.
    let document = serde_json::from_str::<InterchangeDocument>(&format!(
        r#"{{
            "metadata": {{ "interchange_format_version": "5", "genesis_validators_root": "{}" }},
            "data": [ {{
                "pubkey": "0x2a",
                "signed_blocks": [],
                "signed_attestations": [ {{ "source_epoch": "9", "target_epoch": "21" }} ]
            }} ]
        }}"#,
        crate::fixtures::GENESIS_ROOT
    ))
    .expect("document");

    let err = engine.import_interchange(&document).expect_err("conflict");
    assert!(matches!(err, ProtectionError::InterchangeRejected { .. }));
    assert_eq!(engine.store().list_attestations(ValidatorId::new(1)).expect("attestations").len(), 1);
}

#[test]
fn null_root_records_block_their_coordinate_after_import() {
    let engine = registered_engine(&[0x2a]);

    let document = serde_json::from_str::<InterchangeDocument>(&format!(
        r#"{{
            "metadata": {{ "interchange_format_version": "5", "genesis_validators_root": "{}" }},
            "data": [ {{
                "pubkey": "0x2a",
                "signed_blocks": [ {{ "slot": "4" }} ],
                "signed_attestations": []
            }} ]
        }}"#,
        crate::fixtures::GENESIS_ROOT
    ))
    .expect("document");

    engine.import_interchange(&document).expect("import");

    // Slot 4 carries a record with unknown content and is also the floor.
    assert!(!engine.may_sign_block(&public_key(0x2a), &signing_root(3), 4).expect("blocked coordinate"));
    assert!(engine.may_sign_block(&public_key(0x2a), &signing_root(3), 5).expect("above floor"));
}
