pub use attestations::{AttestationRules, DefaultAttestationRules};
pub use blocks::{BlockRules, DefaultBlockRules};
pub mod attestations;
pub mod blocks;

use crate::domain::{SignedAttestation, SignedBlock, Watermarks};
use crate::foundation::{Epoch, Result, Slot, ValidatorId};

/// Read-only view of one validator's signed history, as the rule evaluators
/// consume it. The full store contract extends this with registration,
/// listing, and write batching.
pub trait HistoryReader {
    fn find_block(&self, validator_id: ValidatorId, slot: Slot) -> Result<Option<SignedBlock>>;

    fn find_attestation_by_target(&self, validator_id: ValidatorId, target_epoch: Epoch) -> Result<Option<SignedAttestation>>;

    /// Any stored attestation with source < `source_epoch` and target > `target_epoch`.
    fn find_surrounding(&self, validator_id: ValidatorId, source_epoch: Epoch, target_epoch: Epoch)
        -> Result<Option<SignedAttestation>>;

    /// Any stored attestation with source > `source_epoch` and target < `target_epoch`.
    fn find_surrounded(&self, validator_id: ValidatorId, source_epoch: Epoch, target_epoch: Epoch)
        -> Result<Option<SignedAttestation>>;

    fn watermarks(&self, validator_id: ValidatorId) -> Result<Option<Watermarks>>;
}

/// Result of evaluating a candidate against one validator's history.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleOutcome {
    /// Safe to sign; the coordinator must record the artifact before commit.
    Permit,
    /// Identical artifact already recorded; safe to re-sign, nothing to insert.
    PermitExisting,
    /// Signing would be slashable or unverifiable; refuse.
    Deny(DenyReason),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DenyReason {
    SlotBelowWatermark,
    ConflictingBlock,
    UnknownBlockContent,
    MalformedAttestation,
    SourceBelowWatermark,
    TargetBelowWatermark,
    ConflictingAttestation,
    UnknownAttestationContent,
    SurroundedByExisting,
    SurroundsExisting,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::SlotBelowWatermark => "slot at or below pruning watermark",
            DenyReason::ConflictingBlock => "conflicting block at same slot",
            DenyReason::UnknownBlockContent => "existing block with unknown signing root",
            DenyReason::MalformedAttestation => "source epoch greater than target epoch",
            DenyReason::SourceBelowWatermark => "source epoch below pruning watermark",
            DenyReason::TargetBelowWatermark => "target epoch at or below pruning watermark",
            DenyReason::ConflictingAttestation => "conflicting attestation for same target",
            DenyReason::UnknownAttestationContent => "existing attestation with unknown signing root",
            DenyReason::SurroundedByExisting => "candidate surrounded by existing attestation",
            DenyReason::SurroundsExisting => "candidate surrounds existing attestation",
        }
    }
}
