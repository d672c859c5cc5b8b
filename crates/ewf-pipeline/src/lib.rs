//! # ewf-pipeline
//!
//! Stream and file-pool I/O abstractions used by the EWF segment file layer.
//!
//! - [`MmapPipeline`]: memory-mapped segment file access
//! - [`PartialPipeline`]: a windowed view into a section or chunk's payload
//! - [`FilePool`]: a bounded, LRU-evicting pool of open segment file handles
//!
//! ## Example
//!
//! ```rust,no_run
//! use ewf_pipeline::{PartialPipeline, MmapPipeline};
//! use std::path::Path;
//! use std::io::Read;
//!
//! let mmap = MmapPipeline::open(Path::new("evidence.E01")).unwrap();
//!
//! // Window onto a single section's payload
//! let mut partial = PartialPipeline::new(mmap, 0x8000, 0x100000).unwrap();
//!
//! let mut buf = [0u8; 512];
//! partial.read(&mut buf).unwrap();
//! ```

pub mod file_pool;
pub mod mmap;
pub mod partial;

pub use file_pool::FilePool;
pub use mmap::MmapPipeline;
pub use partial::PartialPipeline;
