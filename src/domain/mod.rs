//! Domain layer: the protection data model and the pure signing rules.

pub mod model;
pub mod rules;

pub use model::*;
pub use rules::{
    AttestationRules, BlockRules, DefaultAttestationRules, DefaultBlockRules, DenyReason, HistoryReader, RuleOutcome,
};
