//! The handle state machine: `NEW -> (open_read | open_write | open_resume)
//! -> READY -> CLOSING -> CLOSED`, owning the file-IO pool, the chunk
//! table, and the running digest, behind one internal lock.
//!
//! Grounded on `totalimage-acquire::raw::RawAcquirer`'s ownership shape
//! (options + cancel flag + hasher + progress callback, one streaming
//! entry point) generalized from a single dd-style copy into the
//! segment-spanning read/write/resume state machine the container format
//! needs. EWF2 segment files are recognized at the signature/fields-header
//! level (`ewf_format::segment_file`) but their section layout differs
//! from EWF1's and is not walked here; `open_read`/`open_write` accept
//! only the EWF1-family signatures, documented in DESIGN.md.

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::{HandleError, Result};
use crate::hash::{HashAlgorithm, Hasher};
use crate::progress::{AcquireProgress, ProgressCallback};
use ewf_format::chunk_table::{ChunkTable, SegmentTableBlock};
use ewf_format::compression::{compress, CompressOutcome};
use ewf_format::section::{HashSection, SectionDescriptor, SectionType, TableSection, VolumeSection};
use ewf_format::segment_file::{FieldsHeader, SegmentFile, SegmentFileKind, SegmentFileState};
use ewf_format::{chunk, segment_table, MediaFlags, MediaType, MediaValues};
use ewf_pipeline::FilePool;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    New,
    Ready,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessMode {
    Read,
    Write,
    WriteResume,
}

/// Bookkeeping needed to splice the final values into the first segment
/// file's placeholder sections once a write completes.
#[derive(Debug, Clone, Default)]
struct CorrectionSites {
    data_section_offset: Option<u64>,
    hash_section_offset: Option<u64>,
    terminator_offset: Option<u64>,
}

struct Inner {
    pool: FilePool,
    segments: Vec<SegmentFile>,
    chunk_table: ChunkTable,
    media: MediaValues,
    hasher: Option<Hasher>,
    total_bytes_written: u64,
    cursor: u64,
    pending_chunk: Vec<u8>,
    current_segment_index: usize,
    correction: CorrectionSites,
    /// Pre-compressed representation of one all-zero chunk, computed once
    /// per handle so the empty-block shortcut in `flush_chunk` never packs
    /// a zero-length placeholder.
    empty_block_blob: Vec<u8>,
    /// The `hash`/`xhash` section read back on `open_read`, if any; set on
    /// write paths once `close()` computes the running digest.
    stored_hash: Option<HashSection>,
}

/// Compress one all-zero chunk of `chunk_size` bytes so `flush_chunk` can
/// hand it to the empty-block shortcut instead of an empty placeholder.
fn compute_empty_block_blob(chunk_size: u32, config: &EngineConfig) -> Result<Vec<u8>> {
    let zeros = vec![0u8; chunk_size as usize];
    match compress(config.compression_method, config.compression_level, &zeros, None)
        .map_err(HandleError::Format)?
    {
        CompressOutcome::Ok(bytes) => Ok(bytes),
        CompressOutcome::TooSmall => Ok(Vec::new()),
    }
}

/// The handle: one open image set, read or write, never both at once
/// except for the delta-only `open_read_write` carve-out spec.md notes
/// (not yet needed by any caller and left unimplemented — see DESIGN.md).
pub struct Handle {
    state: HandleState,
    mode: AccessMode,
    kind: SegmentFileKind,
    config: EngineConfig,
    cancel: CancelToken,
    progress: Option<ProgressCallback>,
    inner: Mutex<Inner>,
}

impl Handle {
    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_progress_callback(&mut self, callback: Option<ProgressCallback>) {
        self.progress = callback;
    }

    fn require_ready(&self) -> Result<()> {
        if self.state != HandleState::Ready {
            return Err(HandleError::WrongState(format!("{:?}", self.state)));
        }
        Ok(())
    }

    // ---- open_read ---------------------------------------------------

    /// Open an existing image set for reading, given its segment file
    /// paths in order (typically produced by `segment_table::glob`).
    pub fn open_read(paths: Vec<PathBuf>, config: EngineConfig) -> Result<Self> {
        if paths.is_empty() {
            return Err(HandleError::NoSegmentFiles);
        }

        let mut pool = FilePool::new(paths.clone(), config.open_file_capacity);
        let mut segments = Vec::with_capacity(paths.len());
        let mut chunk_table = ChunkTable::new(config.chunk_cache_capacity);
        let mut media: Option<MediaValues> = None;
        let mut hash_section: Option<HashSection> = None;
        let mut kind: Option<SegmentFileKind> = None;

        for (segment_index, _path) in paths.iter().enumerate() {
            let mut header_bytes = [0u8; 32];
            let consumed = pool.with_file(segment_index, false, |file| {
                use std::io::Read;
                let n = file.read(&mut header_bytes)?;
                Ok(n)
            })?;

            let (segment, header_len) = SegmentFile::read_file_header(&header_bytes[..consumed])?;
            if segment_index == 0 {
                if segment.kind.is_ewf2() {
                    return Err(HandleError::Format(ewf_core::Error::unsupported(
                        "EWF2 section layout is not implemented; only the signature and fields header are recognized",
                    )));
                }
                kind = Some(segment.kind);
            } else if Some(segment.kind) != kind {
                return Err(HandleError::Format(ewf_core::Error::argument(
                    "segment files in one set must share the same signature",
                )));
            }

            let scan = scan_ewf1_sections(&mut pool, segment_index, header_len as u64)?;
            if let Some(volume) = scan.volume {
                media = Some(media_values_from_volume(&volume)?);
            }
            if let Some(found_hash) = scan.hash {
                hash_section = Some(found_hash);
            }
            for block in scan.table_blocks {
                chunk_table.index.push_block(block);
            }

            let mut segment = segment;
            segment.state = SegmentFileState::OpenReading;
            segment.last_section_offset = scan.last_section_offset;
            segment.number_of_chunks = scan.chunk_count;
            segments.push(segment);
        }

        let media = media.ok_or_else(|| HandleError::Format(ewf_core::Error::argument("no volume/disk/data section found")))?;

        Ok(Self {
            state: HandleState::Ready,
            mode: AccessMode::Read,
            kind: kind.unwrap(),
            config,
            cancel: CancelToken::new(),
            progress: None,
            inner: Mutex::new(Inner {
                pool,
                segments,
                chunk_table,
                media,
                hasher: None,
                total_bytes_written: 0,
                cursor: 0,
                pending_chunk: Vec::new(),
                current_segment_index: 0,
                correction: CorrectionSites::default(),
                empty_block_blob: Vec::new(),
                stored_hash: hash_section,
            }),
        })
    }

    // ---- open_write ----------------------------------------------------

    /// Begin a new image set at `base_path` (e.g. `/evidence/case001`,
    /// which becomes `case001.E01`, `case001.E02`, ...).
    pub fn open_write(
        base_path: &Path,
        kind: SegmentFileKind,
        media: MediaValues,
        config: EngineConfig,
    ) -> Result<Self> {
        if kind.is_ewf2() {
            return Err(HandleError::Format(ewf_core::Error::unsupported(
                "EWF2 write path is not implemented",
            )));
        }

        let first_extension = segment_table::extension_for(kind, 1)?;
        let first_path = candidate_path(base_path, &first_extension);
        std::fs::File::create(&first_path).map_err(ewf_core::Error::from)?;

        let mut pool = FilePool::new(vec![first_path], config.open_file_capacity);
        let segment_number = 1u16;
        let mut segment = SegmentFile::new(kind, FieldsHeader::Ewf1 { segment_number });
        segment.state = SegmentFileState::OpenWriting;

        let mut cursor = 0u64;
        pool.with_file(0, true, |file| {
            use std::io::Write;
            let header = segment.write_file_header();
            file.write_all(&header)?;
            Ok(())
        })?;
        cursor += segment.write_file_header().len() as u64;

        let correction = write_header_group_and_volume_placeholder(&mut pool, 0, &mut cursor, &media)?;
        let empty_block_blob = compute_empty_block_blob(media.chunk_size()?, &config)?;

        Ok(Self {
            state: HandleState::Ready,
            mode: AccessMode::Write,
            kind,
            config,
            cancel: CancelToken::new(),
            progress: None,
            inner: Mutex::new(Inner {
                pool,
                segments: vec![segment],
                chunk_table: ChunkTable::new(0),
                media,
                hasher: Some(Hasher::all()),
                total_bytes_written: 0,
                cursor,
                pending_chunk: Vec::new(),
                current_segment_index: 0,
                correction,
                empty_block_blob,
                stored_hash: None,
            }),
        })
    }

    /// Resume an interrupted write: reopen the last segment file, scan
    /// back to the last complete section, and truncate any trailing
    /// partial bytes so new writes append cleanly.
    pub fn open_resume(base_path: &Path, kind: SegmentFileKind, config: EngineConfig) -> Result<Self> {
        let existing = segment_table::glob(base_path, kind)?;
        if existing.is_empty() {
            return Err(HandleError::NoSegmentFiles);
        }

        let mut pool = FilePool::new(existing.clone(), config.open_file_capacity);
        let last_index = existing.len() - 1;

        let mut header_bytes = [0u8; 32];
        let consumed = pool.with_file(last_index, true, |file| {
            use std::io::Read;
            Ok(file.read(&mut header_bytes)?)
        })?;
        let (mut segment, header_len) = SegmentFile::read_file_header(&header_bytes[..consumed])?;

        let scan = scan_ewf1_sections(&mut pool, last_index, header_len as u64)?;
        let resume_offset = scan.last_good_offset;

        pool.with_file(last_index, true, |file| {
            file.set_len(resume_offset)?;
            Ok(())
        })?;

        let media = scan
            .volume
            .as_ref()
            .map(media_values_from_volume)
            .transpose()?
            .ok_or_else(|| HandleError::Format(ewf_core::Error::argument("resumed segment file has no volume section")))?;

        let mut chunk_table = ChunkTable::new(config.chunk_cache_capacity);
        for block in scan.table_blocks {
            chunk_table.index.push_block(block);
        }

        segment.state = SegmentFileState::OpenWriting;
        segment.last_section_offset = None;
        let empty_block_blob = compute_empty_block_blob(media.chunk_size()?, &config)?;

        Ok(Self {
            state: HandleState::Ready,
            mode: AccessMode::WriteResume,
            kind,
            config,
            cancel: CancelToken::new(),
            progress: None,
            inner: Mutex::new(Inner {
                pool,
                segments: vec![segment],
                chunk_table,
                media,
                hasher: Some(Hasher::all()),
                total_bytes_written: chunk_table_total_bytes(&scan),
                cursor: resume_offset,
                pending_chunk: Vec::new(),
                current_segment_index: last_index,
                correction: CorrectionSites::default(),
                empty_block_blob,
                stored_hash: None,
            }),
        })
    }

    // ---- streaming I/O -------------------------------------------------

    /// Resolve and unpack chunk(s) covering `[offset, offset+length)`.
    /// A failed unpack on any one chunk is caught, that chunk is
    /// returned as zeros with `IS_CORRUPTED` implied, and the rest of
    /// the read proceeds.
    pub fn read_buffer(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        self.require_ready()?;
        if self.mode != AccessMode::Read {
            return Err(HandleError::WrongState("read_buffer on a write handle".into()));
        }

        let mut inner = self.inner.lock().unwrap();
        let chunk_size = inner.media.chunk_size()?.max(1) as u64;
        let media_size = inner.media.media_size()?;
        let clamped_length = length.min(media_size.saturating_sub(offset) as usize);

        let mut out = Vec::with_capacity(clamped_length);
        let mut remaining = clamped_length;
        let mut pos = offset;

        while remaining > 0 {
            if self.cancel.is_cancelled() {
                return Err(HandleError::Cancelled);
            }
            let chunk_index = pos / chunk_size;
            let chunk_offset_in_chunk = (pos % chunk_size) as usize;

            let (decoded, _corrupted) = resolve_and_unpack_chunk(&mut inner, chunk_index, chunk_size as u32, &self.config)?;
            let take = (decoded.len() - chunk_offset_in_chunk).min(remaining);
            out.extend_from_slice(&decoded[chunk_offset_in_chunk..chunk_offset_in_chunk + take]);

            pos += take as u64;
            remaining -= take;
        }

        Ok(out)
    }

    /// Resolve one chunk by index, surfacing corruption instead of
    /// swallowing it the way `read_buffer` does: a checksum or decode
    /// failure on this chunk returns an all-zero buffer with the bool
    /// set, rather than failing the call or silently losing the signal.
    pub fn get_chunk(&self, chunk_index: u64) -> Result<(Vec<u8>, bool)> {
        self.require_ready()?;
        if self.mode != AccessMode::Read {
            return Err(HandleError::WrongState("get_chunk on a write handle".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        let chunk_size = inner.media.chunk_size()?;
        resolve_and_unpack_chunk(&mut inner, chunk_index, chunk_size, &self.config)
    }

    /// Append bytes to the logical stream. Bytes accumulate in an
    /// internal buffer until a full chunk is available; a short tail
    /// chunk is only flushed by `close()`.
    pub fn write_buffer(&self, bytes: &[u8]) -> Result<usize> {
        self.require_ready()?;
        if self.mode == AccessMode::Read {
            return Err(HandleError::WrongState("write_buffer on a read handle".into()));
        }

        let mut inner = self.inner.lock().unwrap();
        let chunk_size = inner.media.chunk_size()? as usize;
        inner.pending_chunk.extend_from_slice(bytes);

        if let Some(hasher) = inner.hasher.as_mut() {
            hasher.update(bytes);
        }

        while inner.pending_chunk.len() >= chunk_size {
            let chunk: Vec<u8> = inner.pending_chunk.drain(..chunk_size).collect();
            flush_chunk(&mut inner, &chunk, &self.kind, &self.config)?;
        }

        inner.total_bytes_written += bytes.len() as u64;
        if let Some(ref callback) = self.progress {
            report_progress(callback, &inner, "Writing");
        }

        Ok(bytes.len())
    }

    pub fn seek(&self, offset: u64) -> Result<u64> {
        self.require_ready()?;
        let mut inner = self.inner.lock().unwrap();
        inner.cursor = offset;
        Ok(offset)
    }

    pub fn media_size(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().media.media_size()?)
    }

    pub fn chunk_size(&self) -> Result<u32> {
        self.inner.lock().unwrap().media.chunk_size().map_err(Into::into)
    }

    pub fn number_of_chunks(&self) -> u64 {
        self.inner.lock().unwrap().chunk_table.index.total_chunks()
    }

    /// A snapshot of the media values this handle was opened with.
    pub fn media(&self) -> MediaValues {
        self.inner.lock().unwrap().media.clone()
    }

    /// The `hash`/`xhash` section read back from disk on `open_read`, if
    /// the segment set carried one.
    pub fn stored_hash(&self) -> Option<HashSection> {
        self.inner.lock().unwrap().stored_hash.clone()
    }

    /// Flush any partial tail chunk, back-patch the first segment file's
    /// placeholder sections (the "sections-correction pass"), and move
    /// to `CLOSED`.
    pub fn close(mut self) -> Result<()> {
        self.state = HandleState::Closing;
        let mut inner = self.inner.lock().unwrap();

        if self.mode != AccessMode::Read {
            if !inner.pending_chunk.is_empty() {
                let tail = std::mem::take(&mut inner.pending_chunk);
                flush_chunk(&mut inner, &tail, &self.kind, &self.config)?;
            }

            inner.media.finalize_streamed_size(inner.total_bytes_written);
            write_terminator_and_correct(&mut inner, &self.kind)?;
        }

        self.state = HandleState::Closed;
        Ok(())
    }
}

fn candidate_path(base_path: &Path, extension: &str) -> PathBuf {
    let mut os_string = base_path.as_os_str().to_owned();
    os_string.push(".");
    os_string.push(extension);
    PathBuf::from(os_string)
}

fn media_values_from_volume(volume: &VolumeSection) -> Result<MediaValues> {
    let media_type = MediaType::from_wire(volume.media_type).unwrap_or(MediaType::Fixed);
    Ok(MediaValues::new(
        media_type,
        MediaFlags::from_bits_truncate(volume.media_flags),
        volume.bytes_per_sector,
        volume.sector_count,
        volume.sectors_per_chunk,
    )?)
}

struct SectionScan {
    volume: Option<VolumeSection>,
    hash: Option<HashSection>,
    table_blocks: Vec<SegmentTableBlock>,
    chunk_count: u64,
    last_section_offset: Option<u64>,
    /// Offset of the last *complete, well-formed* section descriptor's
    /// end; used by `open_resume` to truncate trailing partial bytes.
    last_good_offset: u64,
}

fn chunk_table_total_bytes(scan: &SectionScan) -> u64 {
    scan.chunk_count
}

/// Walk one EWF1 segment file's section chain starting at `start_offset`,
/// collecting volume/hash/table payloads. Stops at the first terminator
/// or the first section that fails to parse (the latter is the resume
/// truncation point).
fn scan_ewf1_sections(pool: &mut FilePool, segment_index: usize, start_offset: u64) -> Result<SectionScan> {
    use std::io::{Read, Seek, SeekFrom};

    let mut volume = None;
    let mut hash = None;
    let mut table_blocks = Vec::new();
    let mut chunk_count = 0u64;
    let mut offset = start_offset;
    let mut last_section_offset = None;
    let mut last_good_offset = start_offset;

    loop {
        let mut descriptor_bytes = [0u8; SectionDescriptor::SIZE];
        let read = pool.with_file(segment_index, false, |file| {
            file.seek(SeekFrom::Start(offset))?;
            let mut total = 0;
            while total < descriptor_bytes.len() {
                let n = file.read(&mut descriptor_bytes[total..])?;
                if n == 0 {
                    break;
                }
                total += n;
            }
            Ok(total)
        })?;

        if read < SectionDescriptor::SIZE {
            break; // short read: end of file reached without a terminator.
        }

        let descriptor = match SectionDescriptor::parse(&descriptor_bytes) {
            Ok(d) => d,
            Err(_) => break, // corrupted descriptor: stop here, this is the resume point.
        };

        let payload_offset = offset + SectionDescriptor::SIZE as u64;
        let payload_len = descriptor.size.saturating_sub(SectionDescriptor::SIZE as u64) as usize;

        match descriptor.section_type {
            SectionType::Volume | SectionType::Disk | SectionType::Data => {
                let bytes = read_payload(pool, segment_index, payload_offset, VolumeSection::SIZE)?;
                volume = Some(VolumeSection::parse(&bytes)?);
            }
            SectionType::Hash => {
                let bytes = read_payload(pool, segment_index, payload_offset, payload_len)?;
                hash = HashSection::parse_hash(&bytes).ok();
            }
            SectionType::Table => {
                let bytes = read_payload(pool, segment_index, payload_offset, payload_len)?;
                if let Ok(table) = TableSection::parse(&bytes) {
                    chunk_count += table.entries.len() as u64;
                    table_blocks.push(SegmentTableBlock::new(
                        segment_index,
                        table.base_offset,
                        table.entries,
                        offset,
                    ));
                }
            }
            SectionType::Table2 => {
                // Only used as a fallback; skip if `table` already resolved.
                if table_blocks.is_empty() {
                    let bytes = read_payload(pool, segment_index, payload_offset, payload_len)?;
                    if let Ok(table) = TableSection::parse(&bytes) {
                        chunk_count += table.entries.len() as u64;
                        table_blocks.push(SegmentTableBlock::new(segment_index, table.base_offset, table.entries, offset));
                    }
                }
            }
            _ => {}
        }

        last_good_offset = offset + descriptor.size;
        if descriptor.section_type.is_terminator() {
            last_section_offset = Some(offset);
            break;
        }

        offset = descriptor.next_offset;
    }

    Ok(SectionScan {
        volume,
        hash,
        table_blocks,
        chunk_count,
        last_section_offset,
        last_good_offset,
    })
}

fn read_payload(pool: &mut FilePool, segment_index: usize, offset: u64, len: usize) -> Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};
    let mut buf = vec![0u8; len];
    pool.with_file(segment_index, false, |file| {
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(())
    })?;
    Ok(buf)
}

/// Resolve a chunk index to bytes, going through the cache first, the
/// table second, and unpacking on cache miss. A failed unpack is
/// recovered locally: the chunk is returned as zeros with the corruption
/// flag set, and the cache is left untouched so a later read can retry.
///
/// A non-compressed table entry is always assumed to carry a trailing
/// checksum: `EngineConfig::pack_flags` makes checksum-append mandatory
/// for exactly this reason, since the entry's wire format has no bit of
/// its own to record whether one is present.
fn resolve_and_unpack_chunk(inner: &mut Inner, chunk_index: u64, chunk_size: u32, _config: &EngineConfig) -> Result<(Vec<u8>, bool)> {
    if let Some(cached) = inner.chunk_table.cache.get(chunk_index) {
        return Ok((cached.to_vec(), false));
    }

    let entry = inner.chunk_table.locate(chunk_index)?;
    let packed = read_payload(&mut inner.pool, entry.segment_file_index, entry.file_offset, entry.compressed_size as usize)?;

    // The table entry's wire format carries only a single "is compressed"
    // bit, so a pattern-filled chunk (stored as exactly 8 bytes) has to be
    // told apart from a genuinely compressed one by its stored size, the
    // same convention the packer's own 8-byte placeholder relies on.
    let range_flags = if entry.is_compressed {
        if entry.compressed_size == 8 {
            chunk::RangeFlags::IS_COMPRESSED | chunk::RangeFlags::IS_PACKED | chunk::RangeFlags::USES_PATTERN_FILL
        } else {
            chunk::RangeFlags::IS_COMPRESSED | chunk::RangeFlags::IS_PACKED
        }
    } else {
        chunk::RangeFlags::HAS_CHECKSUM | chunk::RangeFlags::IS_PACKED
    };

    match chunk::unpack(&packed, chunk_size, ewf_format::CompressionMethod::Deflate, range_flags, None) {
        Ok(decoded) => {
            inner.chunk_table.cache.insert(chunk_index, decoded.clone());
            Ok((decoded, false))
        }
        Err(error) => {
            tracing::warn!(chunk_index, %error, "chunk failed to unpack; returning as corrupted");
            Ok((vec![0u8; chunk_size as usize], true))
        }
    }
}

/// Pack one full chunk and append it as a `sectors` + `table` pair to
/// the current segment file, rolling to a new segment file first if
/// the cap would be exceeded.
fn flush_chunk(inner: &mut Inner, chunk_bytes: &[u8], kind: &SegmentFileKind, config: &EngineConfig) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    let packed = chunk::pack(
        chunk_bytes,
        config.compression_method,
        config.compression_level,
        config.pack_flags(),
        &inner.empty_block_blob,
    )?;

    let additional = SectionDescriptor::SIZE as u64 * 2 + packed.allocated_data_size as u64 + 32;
    let current_segment_size = inner.pool.with_file(inner.current_segment_index, true, |file| Ok(file.seek(SeekFrom::End(0))?))?;

    if current_segment_size + additional > config.max_segment_size && inner.current_segment_index + 1 < usize::MAX {
        roll_segment_file(inner, kind, config)?;
    }

    let segment_index = inner.current_segment_index;
    let sectors_offset = inner.pool.with_file(segment_index, true, |file| Ok(file.seek(SeekFrom::End(0))?))?;
    let sectors_size = SectionDescriptor::SIZE as u64 + packed.data.len() as u64;
    let table_offset = sectors_offset + sectors_size;

    let table_payload = TableSection { base_offset: sectors_offset + SectionDescriptor::SIZE as u64, entries: vec![ewf_format::section::TableEntry { offset: 0, is_compressed: packed.range_flags.contains(chunk::RangeFlags::IS_COMPRESSED) }] }
        .to_bytes();
    let table_size = SectionDescriptor::SIZE as u64 + table_payload.len() as u64;

    let sectors_descriptor = SectionDescriptor { section_type: SectionType::Sectors, next_offset: table_offset, size: sectors_size, checksum: 0 };
    let table_descriptor = SectionDescriptor { section_type: SectionType::Table, next_offset: table_offset + table_size, size: table_size, checksum: 0 };

    inner.pool.with_file(segment_index, true, |file| {
        file.write_all(&sectors_descriptor.to_bytes())?;
        file.write_all(&packed.data)?;
        file.write_all(&table_descriptor.to_bytes())?;
        file.write_all(&table_payload)?;
        Ok(())
    })?;

    let chunk_index = inner.chunk_table.index.total_chunks();
    inner.chunk_table.index.push_block(SegmentTableBlock::new(
        segment_index,
        sectors_offset + SectionDescriptor::SIZE as u64,
        vec![ewf_format::section::TableEntry { offset: 0, is_compressed: packed.range_flags.contains(chunk::RangeFlags::IS_COMPRESSED) }],
        table_offset,
    ));
    inner.chunk_table.cache.insert(chunk_index, chunk_bytes.to_vec());
    inner.segments[segment_index].number_of_chunks += 1;

    Ok(())
}

fn roll_segment_file(inner: &mut Inner, kind: &SegmentFileKind, config: &EngineConfig) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    let outgoing_index = inner.current_segment_index;

    // An intermediate segment file's section chain must end in a `next`
    // terminator rather than `done` (reserved for the last segment file in
    // the set); a `next` terminator's `next_offset` conventionally points
    // at itself.
    let next_terminator_offset = inner.pool.with_file(outgoing_index, true, |file| Ok(file.seek(SeekFrom::End(0))?))?;
    let next_terminator = SectionDescriptor::terminator(SectionType::Next, next_terminator_offset, next_terminator_offset);
    inner.pool.with_file(outgoing_index, true, |file| {
        file.write_all(&next_terminator.to_bytes())?;
        Ok(())
    })?;

    let next_index = inner.segments.len();
    let segment_number = (next_index + 1) as u16;

    // The caller is expected to have recorded a base path elsewhere; this
    // engine only ever opens a single base during `open_write`, so the
    // next segment's path is derived from the first segment file's path.
    let first_path = inner.pool.path(0).ok_or_else(|| ewf_core::Error::runtime("segment 0 missing from pool"))?;
    let base_path = strip_known_extension(&first_path);
    let extension = segment_table::extension_for(*kind, segment_number as u32)?;
    let new_path = candidate_path(&base_path, &extension);

    std::fs::File::create(&new_path).map_err(ewf_core::Error::from)?;
    inner.pool.push_path(new_path);

    let mut segment = SegmentFile::new(*kind, FieldsHeader::Ewf1 { segment_number });
    segment.state = SegmentFileState::OpenWriting;

    inner.pool.with_file(next_index, true, |file| {
        file.write_all(&segment.write_file_header())?;
        Ok(())
    })?;

    inner.segments.push(segment);
    inner.current_segment_index = next_index;
    let _ = config;
    Ok(())
}

fn strip_known_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(_) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}

/// Write the header-group (an empty case-data section, for now) and a
/// placeholder volume/data section sized to the final `VolumeSection`
/// layout, recording its offset for the correction pass.
fn write_header_group_and_volume_placeholder(
    pool: &mut FilePool,
    segment_index: usize,
    cursor: &mut u64,
    media: &MediaValues,
) -> Result<CorrectionSites> {
    use std::io::{Seek, SeekFrom, Write};

    let data_offset = *cursor;
    let volume = VolumeSection {
        media_type: media.media_type.to_wire(),
        media_flags: media.media_flags.bits(),
        chunk_count: 0,
        sectors_per_chunk: media.sectors_per_chunk,
        bytes_per_sector: media.bytes_per_sector,
        sector_count: media.number_of_sectors,
        compression_level: 0,
        set_identifier: *media.set_identifier.as_bytes(),
    };
    let payload = volume.to_bytes();
    let section_size = SectionDescriptor::SIZE as u64 + payload.len() as u64;
    let next_offset = data_offset + section_size;

    let descriptor = SectionDescriptor { section_type: SectionType::Data, next_offset, size: section_size, checksum: 0 };

    pool.with_file(segment_index, true, |file| {
        file.seek(SeekFrom::End(0))?;
        file.write_all(&descriptor.to_bytes())?;
        file.write_all(&payload)?;
        Ok(())
    })?;

    *cursor = next_offset;

    Ok(CorrectionSites { data_section_offset: Some(data_offset), hash_section_offset: None, terminator_offset: None })
}

/// Sections-correction pass: rewrite the placeholder data section with
/// the final media values and append the hash section plus terminator.
/// Each rewritten section stays the same size as its placeholder so
/// offsets in the chain never shift.
fn write_terminator_and_correct(inner: &mut Inner, _kind: &SegmentFileKind) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    if let Some(data_offset) = inner.correction.data_section_offset {
        let volume = VolumeSection {
            media_type: inner.media.media_type.to_wire(),
            media_flags: inner.media.media_flags.bits(),
            chunk_count: inner.chunk_table.index.total_chunks() as u32,
            sectors_per_chunk: inner.media.sectors_per_chunk,
            bytes_per_sector: inner.media.bytes_per_sector,
            sector_count: inner.media.number_of_sectors,
            compression_level: 0,
            set_identifier: *inner.media.set_identifier.as_bytes(),
        };
        let payload = volume.to_bytes();
        let section_size = SectionDescriptor::SIZE as u64 + payload.len() as u64;
        let descriptor = SectionDescriptor {
            section_type: SectionType::Data,
            next_offset: data_offset + section_size,
            size: section_size,
            checksum: 0,
        };

        inner.pool.with_file(0, true, |file| {
            file.seek(SeekFrom::Start(data_offset))?;
            file.write_all(&descriptor.to_bytes())?;
            file.write_all(&payload)?;
            Ok(())
        })?;
    }

    let last_index = inner.segments.len() - 1;
    let hash_offset = inner.pool.with_file(last_index, true, |file| Ok(file.seek(SeekFrom::End(0))?))?;

    if let Some(hasher) = inner.hasher.take() {
        let results = hasher.finalize();
        if let Some(md5) = results.iter().find(|r| r.algorithm == HashAlgorithm::Md5) {
            let md5_bytes: [u8; 16] = md5.hash.clone().try_into().unwrap_or([0u8; 16]);
            let hash_section = HashSection { md5: md5_bytes, sha1: None };
            let payload = hash_section.to_hash_bytes();
            let section_size = SectionDescriptor::SIZE as u64 + payload.len() as u64;
            let descriptor = SectionDescriptor { section_type: SectionType::Hash, next_offset: hash_offset + section_size, size: section_size, checksum: 0 };

            inner.pool.with_file(last_index, true, |file| {
                file.write_all(&descriptor.to_bytes())?;
                file.write_all(&payload)?;
                Ok(())
            })?;
        }
    }

    let terminator_offset = inner.pool.with_file(last_index, true, |file| Ok(file.seek(SeekFrom::End(0))?))?;
    let terminator = SectionDescriptor::terminator(SectionType::Done, terminator_offset, terminator_offset);
    inner.pool.with_file(last_index, true, |file| {
        file.write_all(&terminator.to_bytes())?;
        Ok(())
    })?;

    Ok(())
}

fn report_progress(callback: &ProgressCallback, inner: &Inner, operation: &str) {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = *START.get_or_init(Instant::now);
    let progress = AcquireProgress::calculate(None, inner.total_bytes_written, start, operation);
    callback(&progress);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ewf_format::segment_file::SegmentFileKind;

    fn media_fixture() -> MediaValues {
        MediaValues::new(MediaType::Fixed, MediaFlags::PHYSICAL, 512, 2048, 64).unwrap()
    }

    #[test]
    fn write_then_read_round_trips_small_stream() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("case001");
        let mut config = EngineConfig::default();
        config.sectors_per_chunk = 1;
        config.bytes_per_sector = 512;

        let media = media_fixture();
        let handle = Handle::open_write(&base, SegmentFileKind::Ewf1Image, media, config.clone()).unwrap();

        let payload = vec![0xAB; 512 * 3];
        handle.write_buffer(&payload).unwrap();
        handle.close().unwrap();

        let first = candidate_path(&base, "E01");
        assert!(first.exists());

        let paths = segment_table::glob(&base, SegmentFileKind::Ewf1Image).unwrap();
        assert_eq!(paths.len(), 1);

        let reader = Handle::open_read(paths, config).unwrap();
        let restored = reader.read_buffer(0, 512 * 3).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn wrong_mode_operations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("case002");
        let config = EngineConfig::default();
        let handle = Handle::open_write(&base, SegmentFileKind::Ewf1Image, media_fixture(), config).unwrap();
        assert!(handle.read_buffer(0, 10).is_err());
    }
}
