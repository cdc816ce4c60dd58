use crate::domain::{HistoryReader, SignedAttestation, SignedBlock, Validator, Watermarks};
use crate::foundation::{Epoch, ProtectionError, PublicKey, Slot, ValidatorId};
use crate::infrastructure::store::{ProtectionStore, StoreBatch};
use bincode::Options;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options as RocksOptions, WriteBatch, DB};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::{env, fs};

const CF_VALIDATORS: &str = "validators";
const CF_BLOCKS: &str = "blocks";
const CF_ATTESTATIONS: &str = "attestations";
const CF_WATERMARKS: &str = "watermarks";
const CF_META: &str = "meta";

const META_NEXT_VALIDATOR_ID: &[u8] = b"next_validator_id";
const META_GENESIS_VALIDATORS_ROOT: &[u8] = b"genesis_validators_root";

/// RocksDB-backed history store. Blocks are keyed by (validator, slot) and
/// attestations by (validator, target), both big-endian so one validator's
/// history is a contiguous, ordered key range.
pub struct RocksStore {
    db: Arc<DB>,
    // Serializes id assignment across concurrent registrations.
    registration_lock: Mutex<()>,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProtectionError> {
        let mut options = RocksOptions::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);

        // Durability over throughput: a decision must be on disk before the
        // signature leaves the host process.
        options.set_use_fsync(true);
        options.set_paranoid_checks(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_VALIDATORS, RocksOptions::default()),
            ColumnFamilyDescriptor::new(CF_BLOCKS, RocksOptions::default()),
            ColumnFamilyDescriptor::new(CF_ATTESTATIONS, RocksOptions::default()),
            ColumnFamilyDescriptor::new(CF_WATERMARKS, RocksOptions::default()),
            ColumnFamilyDescriptor::new(CF_META, RocksOptions::default()),
        ];

        let db = DB::open_cf_descriptors(&options, path, cfs).map_err(|err| ProtectionError::storage("rocksdb open", err))?;
        Ok(Self { db: Arc::new(db), registration_lock: Mutex::new(()) })
    }

    pub fn open_default() -> Result<Self, ProtectionError> {
        if let Ok(data_dir) = env::var("GUARDRAIL_DATA_DIR") {
            let trimmed = data_dir.trim();
            if !trimmed.is_empty() {
                return Self::open_in_dir(trimmed);
            }
        }
        let base = env::current_dir().map_err(|err| ProtectionError::storage("io", err))?;
        Self::open_in_dir(base.join(".guardrail"))
    }

    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self, ProtectionError> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir).map_err(|err| ProtectionError::storage("io", err))?;
        Self::open(dir.join("slashing-protection"))
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily, ProtectionError> {
        self.db.cf_handle(name).ok_or_else(|| ProtectionError::storage("rocksdb", format!("missing column family: {}", name)))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ProtectionError> {
        Ok(bincode::DefaultOptions::new().with_fixint_encoding().serialize(value)?)
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtectionError> {
        Ok(bincode::DefaultOptions::new().with_fixint_encoding().deserialize(bytes)?)
    }

    fn key_validator(public_key: &PublicKey) -> Vec<u8> {
        public_key.as_bytes().to_vec()
    }

    fn key_prefix(validator_id: ValidatorId) -> [u8; 4] {
        validator_id.value().to_be_bytes()
    }

    fn key_record(validator_id: ValidatorId, position: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(12);
        key.extend_from_slice(&validator_id.value().to_be_bytes());
        key.extend_from_slice(&position.to_be_bytes());
        key
    }

    fn next_validator_id(&self) -> Result<u32, ProtectionError> {
        let cf = self.cf_handle(CF_META)?;
        let value = self.db.get_cf(cf, META_NEXT_VALIDATOR_ID).map_err(|err| ProtectionError::storage("meta read", err))?;
        match value {
            Some(bytes) => {
                let array: [u8; 4] =
                    bytes.as_slice().try_into().map_err(|_| ProtectionError::storage("meta read", "malformed validator id counter"))?;
                Ok(u32::from_be_bytes(array))
            }
            None => Ok(1),
        }
    }

    fn scan_attestations(
        &self,
        validator_id: ValidatorId,
        mut predicate: impl FnMut(&SignedAttestation) -> bool,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        let prefix = Self::key_prefix(validator_id);
        let cf = self.cf_handle(CF_ATTESTATIONS)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|err| ProtectionError::storage("attestation scan", err))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let stored = Self::decode::<SignedAttestation>(&value)?;
            if predicate(&stored) {
                return Ok(Some(stored));
            }
        }
        Ok(None)
    }
}

impl HistoryReader for RocksStore {
    fn find_block(&self, validator_id: ValidatorId, slot: Slot) -> Result<Option<SignedBlock>, ProtectionError> {
        let cf = self.cf_handle(CF_BLOCKS)?;
        let value =
            self.db.get_cf(cf, Self::key_record(validator_id, slot)).map_err(|err| ProtectionError::storage("block read", err))?;
        match value {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_attestation_by_target(
        &self,
        validator_id: ValidatorId,
        target_epoch: Epoch,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        let cf = self.cf_handle(CF_ATTESTATIONS)?;
        let value = self
            .db
            .get_cf(cf, Self::key_record(validator_id, target_epoch))
            .map_err(|err| ProtectionError::storage("attestation read", err))?;
        match value {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_surrounding(
        &self,
        validator_id: ValidatorId,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        self.scan_attestations(validator_id, |stored| stored.surrounds(source_epoch, target_epoch))
    }

    fn find_surrounded(
        &self,
        validator_id: ValidatorId,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<Option<SignedAttestation>, ProtectionError> {
        self.scan_attestations(validator_id, |stored| stored.surrounded_by(source_epoch, target_epoch))
    }

    fn watermarks(&self, validator_id: ValidatorId) -> Result<Option<Watermarks>, ProtectionError> {
        let cf = self.cf_handle(CF_WATERMARKS)?;
        let value = self
            .db
            .get_cf(cf, Self::key_prefix(validator_id))
            .map_err(|err| ProtectionError::storage("watermark read", err))?;
        match value {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl ProtectionStore for RocksStore {
    fn retrieve_validators(&self, public_keys: &[PublicKey]) -> Result<Vec<Validator>, ProtectionError> {
        let cf = self.cf_handle(CF_VALIDATORS)?;
        let mut found = Vec::new();
        for key in public_keys {
            let value = self.db.get_cf(cf, Self::key_validator(key)).map_err(|err| ProtectionError::storage("validator read", err))?;
            if let Some(bytes) = value {
                found.push(Self::decode(&bytes)?);
            }
        }
        Ok(found)
    }

    fn register_validators(&self, public_keys: &[PublicKey]) -> Result<Vec<Validator>, ProtectionError> {
        let _guard = self.registration_lock.lock().map_err(|_| ProtectionError::storage("registration", "lock poisoned"))?;
        let cf = self.cf_handle(CF_VALIDATORS)?;
        for key in public_keys {
            let existing =
                self.db.get_cf(cf, Self::key_validator(key)).map_err(|err| ProtectionError::storage("validator read", err))?;
            if existing.is_some() {
                return Err(ProtectionError::DuplicateValidator { public_key: format!("{:#x}", key) });
            }
        }

        let mut next_id = self.next_validator_id()?;
        let mut created = Vec::with_capacity(public_keys.len());
        let mut batch = WriteBatch::default();
        for key in public_keys {
            let validator = Validator { id: ValidatorId::new(next_id), public_key: key.clone() };
            next_id += 1;
            batch.put_cf(cf, Self::key_validator(key), Self::encode(&validator)?);
            created.push(validator);
        }
        let meta_cf = self.cf_handle(CF_META)?;
        batch.put_cf(meta_cf, META_NEXT_VALIDATOR_ID, next_id.to_be_bytes());
        self.db.write(batch).map_err(|err| ProtectionError::storage("registration commit", err))?;
        Ok(created)
    }

    fn list_validators(&self) -> Result<Vec<Validator>, ProtectionError> {
        let cf = self.cf_handle(CF_VALIDATORS)?;
        let mut validators = Vec::new();
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        for item in iter {
            let (_, value) = item.map_err(|err| ProtectionError::storage("validator scan", err))?;
            validators.push(Self::decode::<Validator>(&value)?);
        }
        validators.sort_by_key(|validator| validator.id);
        Ok(validators)
    }

    fn list_blocks(&self, validator_id: ValidatorId) -> Result<Vec<SignedBlock>, ProtectionError> {
        let prefix = Self::key_prefix(validator_id);
        let cf = self.cf_handle(CF_BLOCKS)?;
        let mut blocks = Vec::new();
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|err| ProtectionError::storage("block scan", err))?;
            if !key.starts_with(&prefix) {
                break;
            }
            blocks.push(Self::decode::<SignedBlock>(&value)?);
        }
        Ok(blocks)
    }

    fn list_attestations(&self, validator_id: ValidatorId) -> Result<Vec<SignedAttestation>, ProtectionError> {
        let prefix = Self::key_prefix(validator_id);
        let cf = self.cf_handle(CF_ATTESTATIONS)?;
        let mut attestations = Vec::new();
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|err| ProtectionError::storage("attestation scan", err))?;
            if !key.starts_with(&prefix) {
                break;
            }
            attestations.push(Self::decode::<SignedAttestation>(&value)?);
        }
        Ok(attestations)
    }

    fn genesis_validators_root(&self) -> Result<Option<String>, ProtectionError> {
        let cf = self.cf_handle(CF_META)?;
        let value = self.db.get_cf(cf, META_GENESIS_VALIDATORS_ROOT).map_err(|err| ProtectionError::storage("meta read", err))?;
        match value {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes.to_vec()).map_err(|_| ProtectionError::storage("meta read", "malformed genesis root"))?,
            )),
            None => Ok(None),
        }
    }

    fn begin_batch(&self) -> Result<Box<dyn StoreBatch + '_>, ProtectionError> {
        Ok(Box::new(RocksBatch {
            store: self,
            batch: WriteBatch::default(),
            staged_blocks: HashSet::new(),
            staged_attestations: HashSet::new(),
            staged_watermarks: HashMap::new(),
        }))
    }

    fn health_check(&self) -> Result<(), ProtectionError> {
        self.db.property_value("rocksdb.stats").map_err(|err| ProtectionError::storage("health check", err))?;
        Ok(())
    }
}

struct RocksBatch<'a> {
    store: &'a RocksStore,
    batch: WriteBatch,
    staged_blocks: HashSet<(ValidatorId, Slot)>,
    staged_attestations: HashSet<(ValidatorId, Epoch)>,
    staged_watermarks: HashMap<ValidatorId, Watermarks>,
}

impl StoreBatch for RocksBatch<'_> {
    fn insert_block(&mut self, block: &SignedBlock) -> Result<(), ProtectionError> {
        let coordinate = (block.validator_id, block.slot);
        if self.store.find_block(block.validator_id, block.slot)?.is_some() || !self.staged_blocks.insert(coordinate) {
            return Err(ProtectionError::DuplicateRecord {
                kind: "signed block",
                validator_id: block.validator_id.value(),
                coordinate: block.slot,
            });
        }
        let cf = self.store.cf_handle(CF_BLOCKS)?;
        self.batch.put_cf(cf, RocksStore::key_record(block.validator_id, block.slot), RocksStore::encode(block)?);
        Ok(())
    }

    fn insert_attestation(&mut self, attestation: &SignedAttestation) -> Result<(), ProtectionError> {
        let coordinate = (attestation.validator_id, attestation.target_epoch);
        if self.store.find_attestation_by_target(attestation.validator_id, attestation.target_epoch)?.is_some()
            || !self.staged_attestations.insert(coordinate)
        {
            return Err(ProtectionError::DuplicateRecord {
                kind: "signed attestation",
                validator_id: attestation.validator_id.value(),
                coordinate: attestation.target_epoch,
            });
        }
        let cf = self.store.cf_handle(CF_ATTESTATIONS)?;
        self.batch
            .put_cf(cf, RocksStore::key_record(attestation.validator_id, attestation.target_epoch), RocksStore::encode(attestation)?);
        Ok(())
    }

    fn raise_watermarks(&mut self, validator_id: ValidatorId, update: &Watermarks) -> Result<(), ProtectionError> {
        let committed = self.store.watermarks(validator_id)?.unwrap_or_default();
        let mut effective = *self.staged_watermarks.get(&validator_id).unwrap_or(&committed);
        effective.raise(update);
        self.staged_watermarks.insert(validator_id, effective);
        let cf = self.store.cf_handle(CF_WATERMARKS)?;
        self.batch.put_cf(cf, RocksStore::key_prefix(validator_id), RocksStore::encode(&effective)?);
        Ok(())
    }

    fn delete_block(&mut self, validator_id: ValidatorId, slot: Slot) -> Result<(), ProtectionError> {
        let cf = self.store.cf_handle(CF_BLOCKS)?;
        self.batch.delete_cf(cf, RocksStore::key_record(validator_id, slot));
        Ok(())
    }

    fn delete_attestation(&mut self, validator_id: ValidatorId, target_epoch: Epoch) -> Result<(), ProtectionError> {
        let cf = self.store.cf_handle(CF_ATTESTATIONS)?;
        self.batch.delete_cf(cf, RocksStore::key_record(validator_id, target_epoch));
        Ok(())
    }

    fn set_genesis_validators_root(&mut self, root: &str) -> Result<(), ProtectionError> {
        let cf = self.store.cf_handle(CF_META)?;
        self.batch.put_cf(cf, META_GENESIS_VALIDATORS_ROOT, root.as_bytes());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), ProtectionError> {
        self.store.db.write(self.batch).map_err(|err| ProtectionError::storage("batch commit", err))
    }

    fn rollback(self: Box<Self>) {
        drop(self);
    }
}
