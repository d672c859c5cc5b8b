//! # ewf-handle
//!
//! The read/write/resume state machine over one EWF image set: owns the
//! file-IO pool, the chunk table, and the running MD5/SHA-1 digest behind
//! one per-handle lock, and drives the sections-correction pass that
//! back-patches placeholder sections when a write completes.

pub mod cancel;
pub mod config;
pub mod error;
pub mod handle;
pub mod hash;
pub mod progress;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use error::{HandleError, Result};
pub use handle::{Handle, HandleState};
pub use hash::{HashAlgorithm, HashResult, Hasher};
pub use progress::{AcquireProgress, ProgressCallback};

// Re-exported so `ewf-cli` (and other consumers) don't need a direct
// `ewf-format` dependency just to read a handle's media values or stored
// hash section.
pub use ewf_format::section::HashSection;
pub use ewf_format::{MediaFlags, MediaType, MediaValues};
