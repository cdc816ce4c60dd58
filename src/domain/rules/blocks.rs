use crate::domain::rules::{DenyReason, HistoryReader, RuleOutcome};
use crate::foundation::{Result, SigningRoot, Slot, ValidatorId};

/// Decides whether one validator may sign a candidate block proposal. Reads
/// run against the caller's store snapshot; the evaluator itself never writes.
pub trait BlockRules: Send + Sync {
    fn evaluate(
        &self,
        store: &dyn HistoryReader,
        validator_id: ValidatorId,
        signing_root: Option<&SigningRoot>,
        slot: Slot,
    ) -> Result<RuleOutcome>;
}

pub struct DefaultBlockRules;

impl DefaultBlockRules {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultBlockRules {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRules for DefaultBlockRules {
    fn evaluate(
        &self,
        store: &dyn HistoryReader,
        validator_id: ValidatorId,
        signing_root: Option<&SigningRoot>,
        slot: Slot,
    ) -> Result<RuleOutcome> {
        if let Some(watermarks) = store.watermarks(validator_id)? {
            // History at or below the floor may have been pruned; absence of a
            // record there proves nothing.
            if let Some(min_slot) = watermarks.min_block_slot {
                if slot <= min_slot {
                    return Ok(RuleOutcome::Deny(DenyReason::SlotBelowWatermark));
                }
            }
        }

        match store.find_block(validator_id, slot)? {
            None => Ok(RuleOutcome::Permit),
            Some(existing) => match (existing.signing_root.as_ref(), signing_root) {
                (Some(stored), Some(candidate)) if stored == candidate => Ok(RuleOutcome::PermitExisting),
                (Some(_), _) => Ok(RuleOutcome::Deny(DenyReason::ConflictingBlock)),
                (None, _) => Ok(RuleOutcome::Deny(DenyReason::UnknownBlockContent)),
            },
        }
    }
}
