use crate::domain::{HistoryReader, SignedAttestation, SignedBlock, Validator, Watermarks};
use crate::foundation::{Epoch, ProtectionError, PublicKey, Slot, ValidatorId};

pub type Result<T> = std::result::Result<T, ProtectionError>;

/// History store backing the signing rules: the [`HistoryReader`] queries the
/// evaluators run, plus registration, listing, and write batching. Reads
/// taken between a coordinator's lock acquisition and its batch commit
/// observe a stable snapshot of that validator's history; writes go through
/// [`StoreBatch`] and land atomically.
pub trait ProtectionStore: HistoryReader + Send + Sync {
    /// Look up the given keys; returns only those already registered.
    fn retrieve_validators(&self, public_keys: &[PublicKey]) -> Result<Vec<Validator>>;

    /// Insert the given keys in caller order, assigning fresh ids. Fails with
    /// `DuplicateValidator` if any key is already present.
    fn register_validators(&self, public_keys: &[PublicKey]) -> Result<Vec<Validator>>;

    fn list_validators(&self) -> Result<Vec<Validator>>;

    /// All blocks of one validator in ascending slot order.
    fn list_blocks(&self, validator_id: ValidatorId) -> Result<Vec<SignedBlock>>;

    /// All attestations of one validator in ascending target order.
    fn list_attestations(&self, validator_id: ValidatorId) -> Result<Vec<SignedAttestation>>;

    /// The genesis validators root this store is bound to, recorded on first use.
    fn genesis_validators_root(&self) -> Result<Option<String>>;

    fn begin_batch(&self) -> Result<Box<dyn StoreBatch + '_>>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Staged writes applied atomically on commit. Duplicate checks run against
/// committed state plus this batch's own staged inserts, so a batch can never
/// commit two records at one coordinate.
pub trait StoreBatch {
    fn insert_block(&mut self, block: &SignedBlock) -> Result<()>;
    fn insert_attestation(&mut self, attestation: &SignedAttestation) -> Result<()>;

    /// Field-wise maximum with the committed watermarks; floors never drop.
    fn raise_watermarks(&mut self, validator_id: ValidatorId, update: &Watermarks) -> Result<()>;

    fn delete_block(&mut self, validator_id: ValidatorId, slot: Slot) -> Result<()>;
    fn delete_attestation(&mut self, validator_id: ValidatorId, target_epoch: Epoch) -> Result<()>;

    fn set_genesis_validators_root(&mut self, root: &str) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>);
}
