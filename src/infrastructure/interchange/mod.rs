pub use export::export;
pub use format::{InterchangeAttestation, InterchangeBlock, InterchangeDocument, InterchangeEntry, InterchangeMetadata};
pub use import::{import_entry, normalize_root, verify_metadata, ImportOutcome};
pub mod export;
pub mod format;
pub mod import;
