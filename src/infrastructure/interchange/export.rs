use crate::domain::HistoryReader;
use crate::foundation::ProtectionError;
use crate::infrastructure::interchange::format::{
    InterchangeAttestation, InterchangeBlock, InterchangeDocument, InterchangeEntry, InterchangeMetadata,
    INTERCHANGE_FORMAT_VERSION,
};
use crate::infrastructure::store::ProtectionStore;

/// Dump every validator's history as an EIP-3076 document. Watermarks with no
/// record at their floor are covered by a synthetic null-root record so a
/// re-import reconstructs at least the same floors.
pub fn export(store: &dyn ProtectionStore, genesis_validators_root: &str) -> Result<InterchangeDocument, ProtectionError> {
    let mut data = Vec::new();
    for validator in store.list_validators()? {
        let blocks = store.list_blocks(validator.id)?;
        let attestations = store.list_attestations(validator.id)?;
        let watermarks = store.watermarks(validator.id)?.unwrap_or_default();

        let mut signed_blocks: Vec<InterchangeBlock> =
            blocks.iter().map(|block| InterchangeBlock { slot: block.slot, signing_root: block.signing_root.clone() }).collect();
        if let Some(min_slot) = watermarks.min_block_slot {
            if blocks.last().map_or(true, |block| block.slot < min_slot) {
                signed_blocks.push(InterchangeBlock { slot: min_slot, signing_root: None });
            }
        }

        let mut signed_attestations: Vec<InterchangeAttestation> = attestations
            .iter()
            .map(|attestation| InterchangeAttestation {
                source_epoch: attestation.source_epoch,
                target_epoch: attestation.target_epoch,
                signing_root: attestation.signing_root.clone(),
            })
            .collect();
        if attestations.is_empty() && (watermarks.min_source_epoch.is_some() || watermarks.min_target_epoch.is_some()) {
            let source_epoch = watermarks.min_source_epoch.unwrap_or(0);
            let target_epoch = watermarks.min_target_epoch.unwrap_or(source_epoch).max(source_epoch);
            signed_attestations.push(InterchangeAttestation { source_epoch, target_epoch, signing_root: None });
        }

        data.push(InterchangeEntry { pubkey: validator.public_key, signed_blocks, signed_attestations });
    }

    Ok(InterchangeDocument {
        metadata: InterchangeMetadata {
            interchange_format_version: INTERCHANGE_FORMAT_VERSION.to_string(),
            genesis_validators_root: genesis_validators_root.to_string(),
        },
        data,
    })
}
