//! Crate-wide error type.

use thiserror::Error;

/// Errors produced anywhere in the ingest-to-product pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A recognized APID's length field did not match the expected value.
    #[error("unexpected length {got} for apid {apid} (expected {want})")]
    UnexpectedLength {
        /// Offending APID.
        apid: u16,
        /// Length field actually read.
        got: u16,
        /// Length field expected for this APID.
        want: u16,
    },

    /// Stream ended (or a read returned short) before a full packet arrived.
    #[error("truncated packet: wanted {want} bytes, got {got}")]
    TruncatedPacket {
        /// Bytes wanted.
        want: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// `.lock` sentinel could not be created or removed.
    #[error("product lock error for {path}: {source}")]
    Lock {
        /// Path of the product being locked.
        path: std::path::PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// External compressor process failed or was not found.
    #[error("compression failed for {path}: {reason}")]
    Compress {
        /// Path of the file that failed to compress.
        path: std::path::PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// Startup configuration problem (missing/unwritable data root, etc).
    #[error("configuration error: {0}")]
    Config(String),

    /// Wrapped IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapped JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;
