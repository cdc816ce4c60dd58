use crate::foundation::{Epoch, ProtectionError, PublicKey, SigningRoot, Slot};
use serde::{Deserialize, Serialize};

/// The EIP-3076 format generation this engine reads and writes.
pub const INTERCHANGE_FORMAT_VERSION: &str = "5";

/// EIP-3076 slashing-protection interchange document. Slots and epochs are
/// decimal strings on the wire; keys and roots are 0x-prefixed hex.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterchangeDocument {
    pub metadata: InterchangeMetadata,
    pub data: Vec<InterchangeEntry>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterchangeMetadata {
    pub interchange_format_version: String,
    pub genesis_validators_root: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterchangeEntry {
    pub pubkey: PublicKey,
    pub signed_blocks: Vec<InterchangeBlock>,
    pub signed_attestations: Vec<InterchangeAttestation>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterchangeBlock {
    #[serde(with = "decimal_u64")]
    pub slot: Slot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_root: Option<SigningRoot>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InterchangeAttestation {
    #[serde(with = "decimal_u64")]
    pub source_epoch: Epoch,
    #[serde(with = "decimal_u64")]
    pub target_epoch: Epoch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_root: Option<SigningRoot>,
}

impl InterchangeDocument {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ProtectionError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json_string(&self) -> Result<String, ProtectionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod decimal_u64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
