use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnregisteredValidator,
    DuplicateValidator,
    DuplicateRecord,
    StorageError,
    SerializationError,
    EncodingError,
    UnsupportedInterchangeVersion,
    GenesisValidatorsRootMismatch,
    InterchangeRejected,
    Message,
}

#[derive(Debug, Error)]
pub enum ProtectionError {
    /// A signing request named a key absent from the registry cache. This is an
    /// operator error, never a silent refusal.
    #[error("unregistered validator for {public_key}")]
    UnregisteredValidator { public_key: String },

    #[error("validator already registered: {public_key}")]
    DuplicateValidator { public_key: String },

    #[error("duplicate {kind} for validator {validator_id} at {coordinate}")]
    DuplicateRecord { kind: &'static str, validator_id: u32, coordinate: u64 },

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("unsupported interchange format version: {found}")]
    UnsupportedInterchangeVersion { found: String },

    #[error("genesis validators root mismatch: stored={stored} provided={provided}")]
    GenesisValidatorsRootMismatch { stored: String, provided: String },

    #[error("interchange rejected for {public_key}: {details}")]
    InterchangeRejected { public_key: String, details: String },

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ProtectionError>;

impl ProtectionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProtectionError::UnregisteredValidator { .. } => ErrorCode::UnregisteredValidator,
            ProtectionError::DuplicateValidator { .. } => ErrorCode::DuplicateValidator,
            ProtectionError::DuplicateRecord { .. } => ErrorCode::DuplicateRecord,
            ProtectionError::StorageError { .. } => ErrorCode::StorageError,
            ProtectionError::SerializationError { .. } => ErrorCode::SerializationError,
            ProtectionError::EncodingError(_) => ErrorCode::EncodingError,
            ProtectionError::UnsupportedInterchangeVersion { .. } => ErrorCode::UnsupportedInterchangeVersion,
            ProtectionError::GenesisValidatorsRootMismatch { .. } => ErrorCode::GenesisValidatorsRootMismatch,
            ProtectionError::InterchangeRejected { .. } => ErrorCode::InterchangeRejected,
            ProtectionError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn storage(operation: impl Into<String>, details: impl ToString) -> Self {
        ProtectionError::StorageError { operation: operation.into(), details: details.to_string() }
    }
}

impl From<rocksdb::Error> for ProtectionError {
    fn from(err: rocksdb::Error) -> Self {
        ProtectionError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for ProtectionError {
    fn from(err: bincode::Error) -> Self {
        ProtectionError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for ProtectionError {
    fn from(err: serde_json::Error) -> Self {
        ProtectionError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<hex::FromHexError> for ProtectionError {
    fn from(err: hex::FromHexError) -> Self {
        ProtectionError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<io::Error> for ProtectionError {
    fn from(err: io::Error) -> Self {
        ProtectionError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}
