//! Credential storage abstraction for the FitMatch session client.
//!
//! The session client persists exactly one secret (the refresh
//! credential) through the [`TokenStorage`] trait. Platform apps plug
//! in their own backend (browser persistent storage, mobile encrypted
//! storage); [`MemoryStorage`] is the in-process reference
//! implementation.

mod keys;
mod memory;
mod traits;

pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::TokenStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
