//! Error types for the EWF engine

use thiserror::Error;

/// The error kinds raised by the EWF engine, grouped the way callers at the
/// handle API boundary need to distinguish them.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid value, out-of-bounds value, or unsupported argument to an API call
    #[error("Argument error: {0}")]
    Argument(String),

    /// Value already set / missing / get-failed / set-failed / initialize-failed / generic
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Insufficient memory, or a copy/set into an allocated buffer failed
    #[error("Memory error: {0}")]
    Memory(String),

    /// Open/close/read/write/seek failure against a segment file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk's stored checksum did not match the recomputed one
    #[error("Checksum mismatch: {0}")]
    ChecksumMismatch(String),

    /// A segment file's signature did not match any recognized EWF variant
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Deflate/bzip2 compression failed
    #[error("Compression failed: {0}")]
    CompressFailed(String),

    /// Deflate/bzip2 decompression failed
    #[error("Decompression failed: {0}")]
    DecompressFailed(String),

    /// UTF-8 <-> UTF-16LE metadata string conversion failed
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A feature named by the format but intentionally left as a documented extension point
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Result type alias for EWF engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime(msg.into())
    }

    pub fn memory(msg: impl Into<String>) -> Self {
        Error::Memory(msg.into())
    }

    pub fn checksum_mismatch(msg: impl Into<String>) -> Self {
        Error::ChecksumMismatch(msg.into())
    }

    pub fn signature_mismatch(msg: impl Into<String>) -> Self {
        Error::SignatureMismatch(msg.into())
    }

    pub fn compress_failed(msg: impl Into<String>) -> Self {
        Error::CompressFailed(msg.into())
    }

    pub fn decompress_failed(msg: impl Into<String>) -> Self {
        Error::DecompressFailed(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Error::Conversion(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }
}
