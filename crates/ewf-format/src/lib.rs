//! # ewf-format
//!
//! On-disk Expert Witness Compression Format codec: segment files,
//! sections, the chunk data path, and the descriptive metadata strings
//! that carry acquisition context.
//!
//! This crate knows the wire format; it does not own file descriptors or
//! drive a read/write state machine across multiple segment files — that
//! is `ewf-handle`'s job, layered on top of the types here.
//!
//! - [`checksum`]: Adler-32, used by section descriptors, table entries,
//!   and the chunk checksum-append fallback.
//! - [`compression`]: zlib-wrapped Deflate pack/unpack (`bzip2` is
//!   declared but unsupported).
//! - [`chunk`]: the chunk data path — pattern-fill, empty-block,
//!   compression, and checksum-append pack/unpack with 16-byte alignment.
//! - [`section`]: typed section descriptors and their per-type payloads.
//! - [`media`]: the media-values snapshot carried in volume/disk/data
//!   sections.
//! - [`segment_file`]: the per-file signature, fields header, and
//!   lifecycle state.
//! - [`segment_table`]: extension naming/rollover rules and filesystem
//!   glob.
//! - [`chunk_table`]: lazy chunk-index resolution and the bounded LRU
//!   cache of decoded chunks.
//! - [`metadata`]: device-information/case-data UTF-8 <-> UTF-16LE codec.

pub mod checksum;
pub mod chunk;
pub mod chunk_table;
pub mod compression;
pub mod media;
pub mod metadata;
pub mod section;
pub mod segment_file;
pub mod segment_table;

pub use chunk::{pack, unpack, ChunkData, PackFlags, RangeFlags};
pub use chunk_table::{ChunkCache, ChunkIndex, ChunkTable, ChunkTableEntry, SegmentTableBlock};
pub use compression::{CompressionLevel, CompressionMethod};
pub use media::{MediaFlags, MediaType, MediaValues};
pub use section::{HashSection, OpaquePayload, SectionDescriptor, SectionType, TableEntry, TableSection, VolumeSection};
pub use segment_file::{FieldsHeader, SegmentFile, SegmentFileKind, SegmentFileState};
