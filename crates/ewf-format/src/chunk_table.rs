//! Chunk table: lazy resolution of chunk index -> on-disk location,
//! backed by a bounded LRU cache of decoded chunks.
//!
//! No crate in the teacher's dependency table provides an LRU cache, so
//! eviction is hand-rolled the same way `ewf_pipeline::FilePool` rolls
//! its own recency list: a `VecDeque` of indices alongside a `HashMap`.

use crate::section::TableEntry;
use ewf_core::Result;
use std::collections::{HashMap, VecDeque};

/// Where one chunk's packed bytes live on disk, and how they were stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTableEntry {
    pub segment_file_index: usize,
    pub file_offset: u64,
    pub compressed_size: u32,
    pub is_compressed: bool,
}

/// One segment file's table section, already parsed: a base offset plus
/// the ordered entries that are relative to it, and the offset one past
/// the last entry (the section's end, needed to size the final entry).
#[derive(Debug, Clone)]
pub struct SegmentTableBlock {
    pub segment_file_index: usize,
    pub base_offset: u64,
    pub entries: Vec<TableEntry>,
    pub section_end: u64,
}

impl SegmentTableBlock {
    pub fn new(segment_file_index: usize, base_offset: u64, entries: Vec<TableEntry>, section_end: u64) -> Self {
        Self { segment_file_index, base_offset, entries, section_end }
    }

    /// Resolve the `local_index`-th entry (0-based within this block) to
    /// its absolute file offset and packed size.
    fn resolve(&self, local_index: usize) -> Option<ChunkTableEntry> {
        let entry = self.entries.get(local_index)?;
        let file_offset = self.base_offset + entry.offset as u64;
        let next_offset = match self.entries.get(local_index + 1) {
            Some(next) => self.base_offset + next.offset as u64,
            None => self.section_end,
        };
        let compressed_size = next_offset.saturating_sub(file_offset) as u32;
        Some(ChunkTableEntry {
            segment_file_index: self.segment_file_index,
            file_offset,
            compressed_size,
            is_compressed: entry.is_compressed,
        })
    }
}

/// Maps a global chunk index to the segment-table block that contains it
/// and the chunk's position within that block.
#[derive(Debug, Default)]
pub struct ChunkIndex {
    blocks: Vec<SegmentTableBlock>,
    /// Cumulative chunk count at the start of each block, same length/order
    /// as `blocks`.
    starts: Vec<u64>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self { blocks: Vec::new(), starts: Vec::new() }
    }

    pub fn push_block(&mut self, block: SegmentTableBlock) {
        let start = self.starts.last().copied().unwrap_or(0)
            + self.blocks.last().map(|b| b.entries.len() as u64).unwrap_or(0);
        self.starts.push(start);
        self.blocks.push(block);
    }

    pub fn total_chunks(&self) -> u64 {
        self.starts.last().copied().unwrap_or(0) + self.blocks.last().map(|b| b.entries.len() as u64).unwrap_or(0)
    }

    pub fn resolve(&self, chunk_index: u64) -> Option<ChunkTableEntry> {
        let block_pos = self.starts.partition_point(|&start| start <= chunk_index).checked_sub(1)?;
        let block = self.blocks.get(block_pos)?;
        let local_index = (chunk_index - self.starts[block_pos]) as usize;
        block.resolve(local_index)
    }
}

struct CachedChunk {
    data: Vec<u8>,
}

/// A bounded cache of already-unpacked chunk buffers, keyed by global
/// chunk index, evicted least-recently-used.
pub struct ChunkCache {
    capacity: usize,
    entries: HashMap<u64, CachedChunk>,
    recency: VecDeque<u64>,
}

impl ChunkCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: HashMap::new(), recency: VecDeque::new() }
    }

    pub fn get(&mut self, chunk_index: u64) -> Option<&[u8]> {
        if self.entries.contains_key(&chunk_index) {
            self.touch(chunk_index);
            self.entries.get(&chunk_index).map(|c| c.data.as_slice())
        } else {
            None
        }
    }

    pub fn insert(&mut self, chunk_index: u64, data: Vec<u8>) {
        if !self.entries.contains_key(&chunk_index) && self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.insert(chunk_index, CachedChunk { data });
        self.touch(chunk_index);
    }

    fn touch(&mut self, chunk_index: u64) {
        self.recency.retain(|&i| i != chunk_index);
        self.recency.push_back(chunk_index);
    }

    fn evict_one(&mut self) {
        if let Some(victim) = self.recency.pop_front() {
            self.entries.remove(&victim);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The full lazily-populated chunk table: an index over already-parsed
/// segment table blocks, plus the decoded-chunk cache sitting in front
/// of it. Parsing new table blocks from segment files is the caller's
/// job (it needs file I/O); this type only tracks what has been parsed
/// so far and caches what has been unpacked.
pub struct ChunkTable {
    pub index: ChunkIndex,
    pub cache: ChunkCache,
}

impl ChunkTable {
    pub fn new(cache_capacity: usize) -> Self {
        Self { index: ChunkIndex::new(), cache: ChunkCache::new(cache_capacity) }
    }

    pub fn locate(&self, chunk_index: u64) -> Result<ChunkTableEntry> {
        self.index
            .resolve(chunk_index)
            .ok_or_else(|| ewf_core::Error::argument(format!("chunk index {chunk_index} out of range")))
    }
}
