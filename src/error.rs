//! Error types for tallykv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TallyError
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type for tallykv operations
#[derive(Debug, Error)]
pub enum TallyError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for TallyError {
    fn from(e: bincode::Error) -> Self {
        TallyError::Serialization(e.to_string())
    }
}

impl TallyError {
    /// True for server-side failures (as opposed to bad input), including
    /// stored records that no longer decode
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            TallyError::Io(_)
                | TallyError::WalCorruption(_)
                | TallyError::Storage(_)
                | TallyError::Serialization(_)
                | TallyError::Decode(_)
        )
    }
}
