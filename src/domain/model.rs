use crate::foundation::{Epoch, PublicKey, SigningRoot, Slot, ValidatorId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Validator {
    pub id: ValidatorId,
    pub public_key: PublicKey,
}

/// A block proposal this engine has permitted. Unique per (validator, slot).
/// An absent signing root asserts existence with unknown content; no future
/// signing at that slot is permitted.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SignedBlock {
    pub validator_id: ValidatorId,
    pub slot: Slot,
    pub signing_root: Option<SigningRoot>,
}

/// An attestation this engine has permitted. Unique per (validator, target).
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SignedAttestation {
    pub validator_id: ValidatorId,
    pub source_epoch: Epoch,
    pub target_epoch: Epoch,
    pub signing_root: Option<SigningRoot>,
}

impl SignedAttestation {
    /// True when this stored vote surrounds a candidate (source, target) pair.
    pub fn surrounds(&self, source_epoch: Epoch, target_epoch: Epoch) -> bool {
        self.source_epoch < source_epoch && self.target_epoch > target_epoch
    }

    /// True when a candidate (source, target) pair surrounds this stored vote.
    pub fn surrounded_by(&self, source_epoch: Epoch, target_epoch: Epoch) -> bool {
        self.source_epoch > source_epoch && self.target_epoch < target_epoch
    }
}

/// Per-validator floors below which history may have been pruned. Signing at
/// or below a floor is refused because absence of a record proves nothing
/// there. Floors only ever rise.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct Watermarks {
    pub min_block_slot: Option<Slot>,
    pub min_source_epoch: Option<Epoch>,
    pub min_target_epoch: Option<Epoch>,
}

impl Watermarks {
    /// Field-wise maximum with `update`; never lowers an established floor.
    pub fn raise(&mut self, update: &Watermarks) {
        self.min_block_slot = max_option(self.min_block_slot, update.min_block_slot);
        self.min_source_epoch = max_option(self.min_source_epoch, update.min_source_epoch);
        self.min_target_epoch = max_option(self.min_target_epoch, update.min_target_epoch);
    }

    pub fn is_empty(&self) -> bool {
        self.min_block_slot.is_none() && self.min_source_epoch.is_none() && self.min_target_epoch.is_none()
    }
}

fn max_option(current: Option<u64>, update: Option<u64>) -> Option<u64> {
    match (current, update) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
