use crate::foundation::{ProtectionError, PublicKey, Result, ValidatorId};
use crate::infrastructure::store::ProtectionStore;
use log::info;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

/// In-memory map from public key to validator id. The cache is the authority
/// for signing: a key absent here is refused even if a row exists in the
/// database, so a signing request can never silently elevate an unknown key
/// to a protected signer.
pub struct ValidatorRegistry {
    cache: RwLock<HashMap<PublicKey, ValidatorId>>,
    // Serializes retrieve-then-insert so a key races to exactly one id.
    registration: Mutex<()>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self { cache: RwLock::new(HashMap::new()), registration: Mutex::new(()) }
    }

    /// Populate the cache from the validators table at startup.
    pub fn warm(store: &dyn ProtectionStore) -> Result<Self> {
        let registry = Self::new();
        {
            let mut cache = registry.write_cache()?;
            for validator in store.list_validators()? {
                cache.insert(validator.public_key, validator.id);
            }
        }
        Ok(registry)
    }

    pub fn resolve(&self, public_key: &PublicKey) -> Result<ValidatorId> {
        let cache = self.cache.read().map_err(|_| ProtectionError::storage("registry", "cache lock poisoned"))?;
        cache
            .get(public_key)
            .copied()
            .ok_or_else(|| ProtectionError::UnregisteredValidator { public_key: format!("{:#x}", public_key) })
    }

    /// Register the given keys: look up which already exist, insert the rest
    /// in caller order, then extend the cache with all of them. Idempotent.
    pub fn register(&self, store: &dyn ProtectionStore, public_keys: &[PublicKey]) -> Result<()> {
        let _guard = self.registration.lock().map_err(|_| ProtectionError::storage("registry", "registration lock poisoned"))?;

        let existing = store.retrieve_validators(public_keys)?;
        let known: HashSet<&PublicKey> = existing.iter().map(|validator| &validator.public_key).collect();

        let mut missing = Vec::new();
        let mut queued: HashSet<&PublicKey> = HashSet::new();
        for key in public_keys {
            if !known.contains(key) && queued.insert(key) {
                missing.push(key.clone());
            }
        }

        let created = if missing.is_empty() { Vec::new() } else { store.register_validators(&missing)? };
        if !created.is_empty() {
            info!("registered {} new validator(s)", created.len());
        }

        let mut cache = self.write_cache()?;
        for validator in existing.into_iter().chain(created) {
            cache.insert(validator.public_key, validator.id);
        }
        Ok(())
    }

    fn write_cache(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PublicKey, ValidatorId>>> {
        self.cache.write().map_err(|_| ProtectionError::storage("registry", "cache lock poisoned"))
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
