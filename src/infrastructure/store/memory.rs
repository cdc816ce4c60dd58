use crate::domain::{HistoryReader, SignedAttestation, SignedBlock, Validator, Watermarks};
use crate::foundation::{Epoch, ProtectionError, PublicKey, Slot, ValidatorId};
use crate::infrastructure::store::{ProtectionStore, StoreBatch};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

struct MemoryInner {
    next_validator_id: u32,
    validators: HashMap<PublicKey, Validator>,
    blocks: HashMap<ValidatorId, BTreeMap<Slot, SignedBlock>>,
    attestations: HashMap<ValidatorId, BTreeMap<Epoch, SignedAttestation>>,
    watermarks: HashMap<ValidatorId, Watermarks>,
    genesis_validators_root: Option<String>,
}

impl MemoryInner {
    fn new() -> Self {
        Self {
            next_validator_id: 1,
            validators: HashMap::new(),
            blocks: HashMap::new(),
            attestations: HashMap::new(),
            watermarks: HashMap::new(),
            genesis_validators_root: None,
        }
    }
}

/// In-memory history store. Backs unit tests and hosts that keep protection
/// state alongside their own persistence.
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryInner::new())) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>, ProtectionError> {
        self.inner.lock().map_err(|_| ProtectionError::storage("memory", "store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryReader for MemoryStore {
    fn find_block(&self, validator_id: ValidatorId, slot: Slot) -> Result<Option<SignedBlock>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner.blocks.get(&validator_id).and_then(|blocks| blocks.get(&slot)).cloned())
    }

    fn find_attestation_by_target(
        &self,
        validator_id: ValidatorId,
        target_epoch: Epoch,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner.attestations.get(&validator_id).and_then(|attestations| attestations.get(&target_epoch)).cloned())
    }

    fn find_surrounding(
        &self,
        validator_id: ValidatorId,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner
            .attestations
            .get(&validator_id)
            .and_then(|attestations| attestations.values().find(|stored| stored.surrounds(source_epoch, target_epoch)).cloned()))
    }

    fn find_surrounded(
        &self,
        validator_id: ValidatorId,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner
            .attestations
            .get(&validator_id)
            .and_then(|attestations| attestations.values().find(|stored| stored.surrounded_by(source_epoch, target_epoch)).cloned()))
    }

    fn watermarks(&self, validator_id: ValidatorId) -> Result<Option<Watermarks>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner.watermarks.get(&validator_id).copied())
    }
}

impl ProtectionStore for MemoryStore {
    fn retrieve_validators(&self, public_keys: &[PublicKey]) -> Result<Vec<Validator>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(public_keys.iter().filter_map(|key| inner.validators.get(key).cloned()).collect())
    }

    fn register_validators(&self, public_keys: &[PublicKey]) -> Result<Vec<Validator>, ProtectionError> {
        let mut inner = self.lock_inner()?;
        for key in public_keys {
            if inner.validators.contains_key(key) {
                return Err(ProtectionError::DuplicateValidator { public_key: format!("{:#x}", key) });
            }
        }
        let mut created = Vec::with_capacity(public_keys.len());
        for key in public_keys {
            let validator = Validator { id: ValidatorId::new(inner.next_validator_id), public_key: key.clone() };
            inner.next_validator_id += 1;
            inner.validators.insert(key.clone(), validator.clone());
            created.push(validator);
        }
        Ok(created)
    }

    fn list_validators(&self) -> Result<Vec<Validator>, ProtectionError> {
        let inner = self.lock_inner()?;
        let mut validators: Vec<Validator> = inner.validators.values().cloned().collect();
        validators.sort_by_key(|validator| validator.id);
        Ok(validators)
    }

    fn list_blocks(&self, validator_id: ValidatorId) -> Result<Vec<SignedBlock>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner.blocks.get(&validator_id).map(|blocks| blocks.values().cloned().collect()).unwrap_or_default())
    }

    fn list_attestations(&self, validator_id: ValidatorId) -> Result<Vec<SignedAttestation>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner.attestations.get(&validator_id).map(|attestations| attestations.values().cloned().collect()).unwrap_or_default())
    }

    fn genesis_validators_root(&self) -> Result<Option<String>, ProtectionError> {
        let inner = self.lock_inner()?;
        Ok(inner.genesis_validators_root.clone())
    }

    fn begin_batch(&self) -> Result<Box<dyn StoreBatch + '_>, ProtectionError> {
        Ok(Box::new(MemoryBatch {
            inner: Arc::clone(&self.inner),
            ops: Vec::new(),
            staged_blocks: HashSet::new(),
            staged_attestations: HashSet::new(),
            staged_watermarks: HashMap::new(),
        }))
    }
}

enum Op {
    InsertBlock(SignedBlock),
    InsertAttestation(SignedAttestation),
    SetWatermarks(ValidatorId, Watermarks),
    DeleteBlock(ValidatorId, Slot),
    DeleteAttestation(ValidatorId, Epoch),
    SetGenesisValidatorsRoot(String),
}

struct MemoryBatch {
    inner: Arc<Mutex<MemoryInner>>,
    ops: Vec<Op>,
    staged_blocks: HashSet<(ValidatorId, Slot)>,
    staged_attestations: HashSet<(ValidatorId, Epoch)>,
    staged_watermarks: HashMap<ValidatorId, Watermarks>,
}

impl MemoryBatch {
    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>, ProtectionError> {
        self.inner.lock().map_err(|_| ProtectionError::storage("memory", "store lock poisoned"))
    }
}

impl StoreBatch for MemoryBatch {
    fn insert_block(&mut self, block: &SignedBlock) -> Result<(), ProtectionError> {
        let coordinate = (block.validator_id, block.slot);
        let committed = self.lock_inner()?.blocks.get(&block.validator_id).map_or(false, |blocks| blocks.contains_key(&block.slot));
        if committed || !self.staged_blocks.insert(coordinate) {
            return Err(ProtectionError::DuplicateRecord {
                kind: "signed block",
                validator_id: block.validator_id.value(),
                coordinate: block.slot,
            });
        }
        self.ops.push(Op::InsertBlock(block.clone()));
        Ok(())
    }

    fn insert_attestation(&mut self, attestation: &SignedAttestation) -> Result<(), ProtectionError> {
        let coordinate = (attestation.validator_id, attestation.target_epoch);
        let committed = self
            .lock_inner()?
            .attestations
            .get(&attestation.validator_id)
            .map_or(false, |attestations| attestations.contains_key(&attestation.target_epoch));
        if committed || !self.staged_attestations.insert(coordinate) {
            return Err(ProtectionError::DuplicateRecord {
                kind: "signed attestation",
                validator_id: attestation.validator_id.value(),
                coordinate: attestation.target_epoch,
            });
        }
        self.ops.push(Op::InsertAttestation(attestation.clone()));
        Ok(())
    }

    fn raise_watermarks(&mut self, validator_id: ValidatorId, update: &Watermarks) -> Result<(), ProtectionError> {
        let committed = self.lock_inner()?.watermarks.get(&validator_id).copied().unwrap_or_default();
        let mut effective = *self.staged_watermarks.get(&validator_id).unwrap_or(&committed);
        effective.raise(update);
        self.staged_watermarks.insert(validator_id, effective);
        self.ops.push(Op::SetWatermarks(validator_id, effective));
        Ok(())
    }

    fn delete_block(&mut self, validator_id: ValidatorId, slot: Slot) -> Result<(), ProtectionError> {
        self.ops.push(Op::DeleteBlock(validator_id, slot));
        Ok(())
    }

    fn delete_attestation(&mut self, validator_id: ValidatorId, target_epoch: Epoch) -> Result<(), ProtectionError> {
        self.ops.push(Op::DeleteAttestation(validator_id, target_epoch));
        Ok(())
    }

    fn set_genesis_validators_root(&mut self, root: &str) -> Result<(), ProtectionError> {
        self.ops.push(Op::SetGenesisValidatorsRoot(root.to_string()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), ProtectionError> {
        let MemoryBatch { inner, ops, .. } = *self;
        let mut inner = inner.lock().map_err(|_| ProtectionError::storage("memory", "store lock poisoned"))?;
        for op in ops {
            match op {
                Op::InsertBlock(block) => {
                    inner.blocks.entry(block.validator_id).or_default().insert(block.slot, block);
                }
                Op::InsertAttestation(attestation) => {
                    inner.attestations.entry(attestation.validator_id).or_default().insert(attestation.target_epoch, attestation);
                }
                Op::SetWatermarks(validator_id, watermarks) => {
                    inner.watermarks.insert(validator_id, watermarks);
                }
                Op::DeleteBlock(validator_id, slot) => {
                    if let Some(blocks) = inner.blocks.get_mut(&validator_id) {
                        blocks.remove(&slot);
                    }
                }
                Op::DeleteAttestation(validator_id, target_epoch) => {
                    if let Some(attestations) = inner.attestations.get_mut(&validator_id) {
                        attestations.remove(&target_epoch);
                    }
                }
                Op::SetGenesisValidatorsRoot(root) => {
                    inner.genesis_validators_root = Some(root);
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        drop(self);
    }
}
