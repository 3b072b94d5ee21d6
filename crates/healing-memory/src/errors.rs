//! Error types for the memory store

use thiserror::Error;

/// Failures loading or persisting the memory file
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Filesystem failure reading or writing the backing file
    #[error("Memory storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file contents could not be decoded
    #[error("Memory storage format error: {0}")]
    Format(String),
}
