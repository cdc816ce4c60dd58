use crate::application::{ValidatorLocks, ValidatorRegistry};
use crate::domain::rules::{AttestationRules, BlockRules, DefaultAttestationRules, DefaultBlockRules, RuleOutcome};
use crate::domain::{HistoryReader, SignedAttestation, SignedBlock, Watermarks};
use crate::foundation::{Epoch, ProtectionError, PublicKey, Result, SigningRoot, Slot, ValidatorId};
use crate::infrastructure::interchange::{self, ImportOutcome, InterchangeDocument};
use crate::infrastructure::store::ProtectionStore;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Decision coordinator: the public façade of the engine. Every signing
/// decision resolves the key, takes the validator's lock, evaluates the
/// candidate against history, and on permit records the artifact in the same
/// transaction before the verdict is returned. A failed commit surfaces as an
/// error; callers must treat it as refuse-to-sign.
pub struct SlashingProtection<S: ProtectionStore> {
    store: S,
    registry: ValidatorRegistry,
    locks: ValidatorLocks,
    block_rules: Box<dyn BlockRules>,
    attestation_rules: Box<dyn AttestationRules>,
    genesis_validators_root: String,
}

impl<S: ProtectionStore> SlashingProtection<S> {
    /// Open the engine over a store, binding it to a genesis validators root.
    /// A store previously bound to a different root refuses to open.
    pub fn new(store: S, genesis_validators_root: &str) -> Result<Self> {
        Self::with_rules(store, genesis_validators_root, Box::new(DefaultBlockRules::new()), Box::new(DefaultAttestationRules::new()))
    }

    pub fn with_rules(
        store: S,
        genesis_validators_root: &str,
        block_rules: Box<dyn BlockRules>,
        attestation_rules: Box<dyn AttestationRules>,
    ) -> Result<Self> {
        let normalized = interchange::normalize_root(genesis_validators_root)?;
        match store.genesis_validators_root()? {
            Some(stored) if stored != normalized => {
                return Err(ProtectionError::GenesisValidatorsRootMismatch { stored, provided: normalized });
            }
            Some(_) => {}
            None => {
                let mut batch = store.begin_batch()?;
                batch.set_genesis_validators_root(&normalized)?;
                batch.commit()?;
            }
        }

        let registry = ValidatorRegistry::warm(&store)?;
        Ok(Self {
            store,
            registry,
            locks: ValidatorLocks::new(),
            block_rules,
            attestation_rules,
            genesis_validators_root: normalized,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register_validators(&self, public_keys: &[PublicKey]) -> Result<()> {
        self.registry.register(&self.store, public_keys)
    }

    pub fn may_sign_block(&self, public_key: &PublicKey, signing_root: &SigningRoot, slot: Slot) -> Result<bool> {
        let validator_id = self.registry.resolve(public_key)?;
        let lock = self.locks.lock_for(validator_id)?;
        let _guard = lock_validator(&lock, validator_id)?;

        match self.block_rules.evaluate(&self.store, validator_id, Some(signing_root), slot)? {
            RuleOutcome::Permit => {
                let mut batch = self.store.begin_batch()?;
                batch.insert_block(&SignedBlock { validator_id, slot, signing_root: Some(signing_root.clone()) })?;
                batch.commit()?;
                Ok(true)
            }
            RuleOutcome::PermitExisting => Ok(true),
            RuleOutcome::Deny(reason) => {
                warn!("refused block signature for {:#x} at slot {}: {}", public_key, slot, reason.as_str());
                Ok(false)
            }
        }
    }

    pub fn may_sign_attestation(
        &self,
        public_key: &PublicKey,
        signing_root: &SigningRoot,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<bool> {
        let validator_id = self.registry.resolve(public_key)?;
        let lock = self.locks.lock_for(validator_id)?;
        let _guard = lock_validator(&lock, validator_id)?;

        match self.attestation_rules.evaluate(&self.store, validator_id, Some(signing_root), source_epoch, target_epoch)? {
            RuleOutcome::Permit => {
                let mut batch = self.store.begin_batch()?;
                batch.insert_attestation(&SignedAttestation {
                    validator_id,
                    source_epoch,
                    target_epoch,
                    signing_root: Some(signing_root.clone()),
                })?;
                batch.commit()?;
                Ok(true)
            }
            RuleOutcome::PermitExisting => Ok(true),
            RuleOutcome::Deny(reason) => {
                warn!(
                    "refused attestation signature for {:#x} at ({}, {}): {}",
                    public_key,
                    source_epoch,
                    target_epoch,
                    reason.as_str()
                );
                Ok(false)
            }
        }
    }

    /// Administrative watermark raise. Floors never drop; records left at or
    /// below the new floors are pruned in the same transaction so the stored
    /// history and the floors stay consistent.
    pub fn set_watermarks(&self, public_key: &PublicKey, update: Watermarks) -> Result<()> {
        let validator_id = self.registry.resolve(public_key)?;
        let lock = self.locks.lock_for(validator_id)?;
        let _guard = lock_validator(&lock, validator_id)?;

        let mut effective = self.store.watermarks(validator_id)?.unwrap_or_default();
        effective.raise(&update);

        let mut batch = self.store.begin_batch()?;
        batch.raise_watermarks(validator_id, &update)?;

        if let Some(min_slot) = effective.min_block_slot {
            for block in self.store.list_blocks(validator_id)? {
                if block.slot <= min_slot {
                    batch.delete_block(validator_id, block.slot)?;
                }
            }
        }
        for attestation in self.store.list_attestations(validator_id)? {
            let below_source = effective.min_source_epoch.map_or(false, |min_source| attestation.source_epoch < min_source);
            let below_target = effective.min_target_epoch.map_or(false, |min_target| attestation.target_epoch <= min_target);
            if below_source || below_target {
                batch.delete_attestation(validator_id, attestation.target_epoch)?;
            }
        }
        batch.commit()?;

        info!("raised watermarks for {:#x}: {:?}", public_key, effective);
        Ok(())
    }

    /// Import an EIP-3076 document, one transaction per validator entry. A
    /// conflicting entry fails the import; entries committed before it stand.
    pub fn import_interchange(&self, document: &InterchangeDocument) -> Result<ImportOutcome> {
        interchange::verify_metadata(&document.metadata, &self.genesis_validators_root)?;

        let mut outcome = ImportOutcome::default();
        for entry in &document.data {
            self.register_validators(std::slice::from_ref(&entry.pubkey))?;
            let validator_id = self.registry.resolve(&entry.pubkey)?;
            let lock = self.locks.lock_for(validator_id)?;
            let _guard = lock_validator(&lock, validator_id)?;

            let entry_outcome = interchange::import_entry(&self.store, validator_id, entry)?;
            outcome.absorb(&entry_outcome);
        }

        info!(
            "interchange import: {} validator(s), {} block(s), {} attestation(s), {} skipped",
            outcome.validators, outcome.imported_blocks, outcome.imported_attestations, outcome.skipped_records
        );
        Ok(outcome)
    }

    pub fn export_interchange(&self) -> Result<InterchangeDocument> {
        interchange::export(&self.store, &self.genesis_validators_root)
    }

    pub fn health_check(&self) -> Result<()> {
        self.store.health_check()
    }
}

impl<S: ProtectionStore> std::fmt::Debug for SlashingProtection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlashingProtection").finish()
    }
}

fn lock_validator(lock: &Arc<Mutex<()>>, validator_id: ValidatorId) -> Result<MutexGuard<'_, ()>> {
    lock.lock().map_err(|_| ProtectionError::storage("locks", format!("validator {} lock poisoned", validator_id)))
}
