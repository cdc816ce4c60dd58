use crate::foundation::{ProtectionError, Result, ValidatorId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-validator lock table. Holding a validator's lock across a decision's
/// read-evaluate-insert sequence gives the same guarantee as row-level
/// locking on that validator's identity row: same-validator decisions are
/// linearized, different validators never contend.
pub struct ValidatorLocks {
    inner: Mutex<HashMap<ValidatorId, Arc<Mutex<()>>>>,
}

impl ValidatorLocks {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    /// The lock for one validator; callers lock the returned mutex for the
    /// duration of their transaction.
    pub fn lock_for(&self, validator_id: ValidatorId) -> Result<Arc<Mutex<()>>> {
        let mut table = self.inner.lock().map_err(|_| ProtectionError::storage("locks", "lock table poisoned"))?;
        Ok(Arc::clone(table.entry(validator_id).or_insert_with(|| Arc::new(Mutex::new(())))))
    }
}

impl Default for ValidatorLocks {
    fn default() -> Self {
        Self::new()
    }
}
