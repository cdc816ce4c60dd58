use crate::domain::rules::{DenyReason, HistoryReader, RuleOutcome};
use crate::foundation::{Epoch, Result, SigningRoot, ValidatorId};

/// Decides whether one validator may sign a candidate attestation. Rule order
/// matters: the malformed check runs before any store access, watermarks
/// before record lookups, the double-vote lookup before the surround scans.
pub trait AttestationRules: Send + Sync {
    fn evaluate(
        &self,
        store: &dyn HistoryReader,
        validator_id: ValidatorId,
        signing_root: Option<&SigningRoot>,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<RuleOutcome>;
}

pub struct DefaultAttestationRules;

impl DefaultAttestationRules {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultAttestationRules {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationRules for DefaultAttestationRules {
    fn evaluate(
        &self,
        store: &dyn HistoryReader,
        validator_id: ValidatorId,
        signing_root: Option<&SigningRoot>,
        source_epoch: Epoch,
        target_epoch: Epoch,
    ) -> Result<RuleOutcome> {
        // source == target is valid (genesis); only an inverted pair is malformed.
        if source_epoch > target_epoch {
            return Ok(RuleOutcome::Deny(DenyReason::MalformedAttestation));
        }

        if let Some(watermarks) = store.watermarks(validator_id)? {
            if let Some(min_source) = watermarks.min_source_epoch {
                if source_epoch < min_source {
                    return Ok(RuleOutcome::Deny(DenyReason::SourceBelowWatermark));
                }
            }
            if let Some(min_target) = watermarks.min_target_epoch {
                if target_epoch <= min_target {
                    return Ok(RuleOutcome::Deny(DenyReason::TargetBelowWatermark));
                }
            }
        }

        if let Some(existing) = store.find_attestation_by_target(validator_id, target_epoch)? {
            return Ok(match (existing.signing_root.as_ref(), signing_root) {
                (Some(stored), Some(candidate)) if stored == candidate => RuleOutcome::PermitExisting,
                (Some(_), _) => RuleOutcome::Deny(DenyReason::ConflictingAttestation),
                (None, _) => RuleOutcome::Deny(DenyReason::UnknownAttestationContent),
            });
        }

        if store.find_surrounding(validator_id, source_epoch, target_epoch)?.is_some() {
            return Ok(RuleOutcome::Deny(DenyReason::SurroundedByExisting));
        }

        if store.find_surrounded(validator_id, source_epoch, target_epoch)?.is_some() {
            return Ok(RuleOutcome::Deny(DenyReason::SurroundsExisting));
        }

        Ok(RuleOutcome::Permit)
    }
}
