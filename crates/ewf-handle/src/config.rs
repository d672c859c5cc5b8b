//! Engine-wide configuration, plumbed through the handle at construction
//! instead of the source's global mutable codepage/notify-verbose flags.

use ewf_format::{CompressionLevel, CompressionMethod, PackFlags};

/// Configuration governing how a `Handle` packs chunks and splits
/// segment files. Immutable once a handle is opened; build a new
/// `EngineConfig` and reopen to change it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sectors grouped into one chunk; combined with `bytes_per_sector`
    /// to compute `chunk_size` (see `ewf_core::validate_chunk_geometry`).
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub compression_method: CompressionMethod,
    pub compression_level: CompressionLevel,
    /// Segment file roll-over threshold in bytes.
    pub max_segment_size: u64,
    pub use_pattern_fill: bool,
    pub use_empty_block_compression: bool,
    pub add_alignment_padding: bool,
    /// Size of the decoded-chunk LRU cache, in number of chunks.
    pub chunk_cache_capacity: usize,
    /// Maximum simultaneously open segment-file descriptors.
    pub open_file_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sectors_per_chunk: 64,
            bytes_per_sector: 512,
            compression_method: CompressionMethod::Deflate,
            compression_level: CompressionLevel::Default,
            max_segment_size: 1024 * 1024 * 1024 * 2, // 2 GiB, matches historical EWF1 segment cap
            use_pattern_fill: true,
            use_empty_block_compression: true,
            // Off by default: the chunk table only stores a size and a
            // compressed/raw bit, not an out-of-band checksum, so the
            // checksum-append branch relies on the trailing 4 bytes of the
            // stored range being the checksum. Alignment padding appended
            // after that checksum would shift it out from under that
            // convention.
            add_alignment_padding: false,
            chunk_cache_capacity: 256,
            open_file_capacity: ewf_core::MAX_OPEN_SEGMENT_FILES,
        }
    }
}

impl EngineConfig {
    pub fn chunk_size(&self) -> ewf_core::Result<u32> {
        ewf_core::validate_chunk_geometry(self.sectors_per_chunk, self.bytes_per_sector)
    }

    pub fn pack_flags(&self) -> PackFlags {
        // Checksum-append is not a write-time choice: a raw chunk's table
        // entry carries only a compressed/not-compressed bit, so the read
        // path has no way to know whether to expect a trailing checksum
        // unless every raw chunk this engine ever writes carries one.
        let mut flags = PackFlags::CALCULATE_CHECKSUM;
        if self.use_empty_block_compression {
            flags |= PackFlags::USE_EMPTY_BLOCK_COMPRESSION;
        }
        if self.use_pattern_fill {
            flags |= PackFlags::USE_PATTERN_FILL_COMPRESSION;
        }
        if self.add_alignment_padding {
            flags |= PackFlags::ADD_ALIGNMENT_PADDING;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_computes_a_valid_chunk_size() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size().unwrap(), 64 * 512);
    }

    #[test]
    fn pack_flags_reflect_all_toggles() {
        let config = EngineConfig {
            use_pattern_fill: false,
            use_empty_block_compression: false,
            add_alignment_padding: false,
            ..EngineConfig::default()
        };
        assert_eq!(config.pack_flags(), PackFlags::CALCULATE_CHECKSUM);
    }
}
