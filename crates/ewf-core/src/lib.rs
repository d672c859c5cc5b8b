//! # ewf-core
//!
//! Error types, capability traits, and security limits shared by the EWF
//! engine crates: [`ewf-pipeline`](../ewf_pipeline/index.html),
//! [`ewf-format`](../ewf_format/index.html), and
//! [`ewf-handle`](../ewf_handle/index.html).
//!
//! This crate has no knowledge of the EWF segment/section/chunk layout
//! itself; it only defines the vocabulary the other crates share:
//! - [`Error`] and [`Result`]: the engine-wide error taxonomy
//! - [`SegmentIo`]: the capability object a segment file reads and writes
//!   through, so the format crate never depends on `std::fs` directly
//! - [`security`]: allocation and geometry limits applied while parsing
//!   untrusted segment files
//!
//! ```rust,no_run
//! use ewf_core::{Result, SegmentIo};
//!
//! fn read_header(io: &mut dyn SegmentIo) -> Result<[u8; 13]> {
//!     let mut header = [0u8; 13];
//!     io.read_at(0, &mut header)?;
//!     Ok(header)
//! }
//! ```

pub mod error;
pub mod security;
pub mod traits;

pub use error::{Error, Result};
pub use security::*;
pub use traits::{ReadSeek, ReadWriteSeek, SegmentIo};
