use crate::domain::{HistoryReader, SignedAttestation, SignedBlock, Watermarks};
use crate::foundation::{Epoch, ProtectionError, SigningRoot, Slot, ValidatorId};
use crate::infrastructure::interchange::format::{InterchangeEntry, InterchangeMetadata, INTERCHANGE_FORMAT_VERSION};
use crate::infrastructure::store::ProtectionStore;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImportOutcome {
    pub validators: usize,
    pub imported_blocks: usize,
    pub imported_attestations: usize,
    pub skipped_records: usize,
}

impl ImportOutcome {
    pub fn absorb(&mut self, other: &ImportOutcome) {
        self.validators += other.validators;
        self.imported_blocks += other.imported_blocks;
        self.imported_attestations += other.imported_attestations;
        self.skipped_records += other.skipped_records;
    }
}

/// Parse and re-render a hex root in canonical form (0x-prefixed, lowercase).
pub fn normalize_root(root: &str) -> Result<String, ProtectionError> {
    let trimmed = root.strip_prefix("0x").unwrap_or(root);
    let bytes = hex::decode(trimmed)?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

pub fn verify_metadata(metadata: &InterchangeMetadata, engine_root: &str) -> Result<(), ProtectionError> {
    if metadata.interchange_format_version != INTERCHANGE_FORMAT_VERSION {
        return Err(ProtectionError::UnsupportedInterchangeVersion { found: metadata.interchange_format_version.clone() });
    }
    let document_root = normalize_root(&metadata.genesis_validators_root)?;
    if document_root != engine_root {
        return Err(ProtectionError::GenesisValidatorsRootMismatch { stored: engine_root.to_string(), provided: document_root });
    }
    Ok(())
}

/// Import one validator's entry in a single store transaction. The caller
/// must already hold that validator's lock. Exact duplicates are skipped;
/// records in the pruned region below existing watermarks are skipped; any
/// record that conflicts with history (or with another record in the entry)
/// rejects the entry and nothing is committed.
pub fn import_entry(
    store: &dyn ProtectionStore,
    validator_id: ValidatorId,
    entry: &InterchangeEntry,
) -> Result<ImportOutcome, ProtectionError> {
    let public_key = format!("{:#x}", entry.pubkey);
    let existing_watermarks = store.watermarks(validator_id)?.unwrap_or_default();
    let mut batch = store.begin_batch()?;
    let mut outcome = ImportOutcome { validators: 1, ..Default::default() };
    let mut update = Watermarks::default();

    let mut seen_slots: HashMap<Slot, Option<SigningRoot>> = HashMap::new();
    for block in &entry.signed_blocks {
        // Every record contributes to the post-import floor, inserted or not.
        update.raise(&Watermarks { min_block_slot: Some(block.slot), ..Default::default() });

        if let Some(previous_root) = seen_slots.get(&block.slot) {
            if previous_root == &block.signing_root {
                outcome.skipped_records += 1;
                continue;
            }
            return Err(rejected(&public_key, format!("conflicting blocks at slot {}", block.slot)));
        }
        seen_slots.insert(block.slot, block.signing_root.clone());

        if let Some(existing) = store.find_block(validator_id, block.slot)? {
            if existing.signing_root == block.signing_root {
                outcome.skipped_records += 1;
                continue;
            }
            return Err(rejected(&public_key, format!("block at slot {} conflicts with existing history", block.slot)));
        }

        if existing_watermarks.min_block_slot.map_or(false, |min_slot| block.slot <= min_slot) {
            outcome.skipped_records += 1;
            continue;
        }

        batch.insert_block(&SignedBlock { validator_id, slot: block.slot, signing_root: block.signing_root.clone() })?;
        outcome.imported_blocks += 1;
    }

    let mut accepted = store.list_attestations(validator_id)?;
    let mut seen_targets: HashMap<Epoch, (Epoch, Option<SigningRoot>)> = HashMap::new();
    for attestation in &entry.signed_attestations {
        if attestation.source_epoch > attestation.target_epoch {
            return Err(rejected(
                &public_key,
                format!("attestation source {} exceeds target {}", attestation.source_epoch, attestation.target_epoch),
            ));
        }

        update.raise(&Watermarks {
            min_source_epoch: Some(attestation.source_epoch),
            min_target_epoch: Some(attestation.target_epoch),
            ..Default::default()
        });

        if let Some((previous_source, previous_root)) = seen_targets.get(&attestation.target_epoch) {
            if *previous_source == attestation.source_epoch && previous_root == &attestation.signing_root {
                outcome.skipped_records += 1;
                continue;
            }
            return Err(rejected(&public_key, format!("conflicting attestations for target {}", attestation.target_epoch)));
        }
        seen_targets.insert(attestation.target_epoch, (attestation.source_epoch, attestation.signing_root.clone()));

        if let Some(existing) = store.find_attestation_by_target(validator_id, attestation.target_epoch)? {
            if existing.source_epoch == attestation.source_epoch && existing.signing_root == attestation.signing_root {
                outcome.skipped_records += 1;
                continue;
            }
            return Err(rejected(
                &public_key,
                format!("attestation for target {} conflicts with existing history", attestation.target_epoch),
            ));
        }

        if existing_watermarks.min_source_epoch.map_or(false, |min_source| attestation.source_epoch < min_source)
            || existing_watermarks.min_target_epoch.map_or(false, |min_target| attestation.target_epoch <= min_target)
        {
            outcome.skipped_records += 1;
            continue;
        }

        if let Some(conflict) = accepted
            .iter()
            .find(|stored| {
                stored.surrounds(attestation.source_epoch, attestation.target_epoch)
                    || stored.surrounded_by(attestation.source_epoch, attestation.target_epoch)
            })
        {
            return Err(rejected(
                &public_key,
                format!(
                    "attestation ({}, {}) in surround conflict with ({}, {})",
                    attestation.source_epoch, attestation.target_epoch, conflict.source_epoch, conflict.target_epoch
                ),
            ));
        }

        let record = SignedAttestation {
            validator_id,
            source_epoch: attestation.source_epoch,
            target_epoch: attestation.target_epoch,
            signing_root: attestation.signing_root.clone(),
        };
        batch.insert_attestation(&record)?;
        accepted.push(record);
        outcome.imported_attestations += 1;
    }

    if !update.is_empty() {
        batch.raise_watermarks(validator_id, &update)?;
    }
    batch.commit()?;
    Ok(outcome)
}

fn rejected(public_key: &str, details: String) -> ProtectionError {
    ProtectionError::InterchangeRejected { public_key: public_key.to_string(), details }
}
