//! Security validation constants and helpers
//!
//! These limits exist to prevent a malformed or hostile segment file from
//! driving the engine into an unbounded allocation or an infinite loop.

use crate::Error;

/// Largest chunk payload we will allocate a decompression buffer for (64 MiB).
///
/// libewf chunk sizes are `sectors_per_chunk * bytes_per_sector`; this caps
/// the product regardless of how a volume section's fields are forged.
pub const MAX_CHUNK_SIZE: u32 = 64 * 1024 * 1024;

/// Largest `bytes_per_sector` value accepted from a volume/disk section.
pub const MAX_BYTES_PER_SECTOR: u32 = 8192;

/// Largest `sectors_per_chunk` value accepted from a volume/disk section.
pub const MAX_SECTORS_PER_CHUNK: u32 = 128 * 1024;

/// Largest single segment file size this engine will write (2 TiB).
///
/// EWF1 historically limits segments to under 2 GiB on FAT-formatted
/// evidence drives; EWF2 lifts the limit. This is a generous upper bound
/// for both, not the default target size.
pub const MAX_SEGMENT_SIZE: u64 = 2 * 1024 * 1024 * 1024 * 1024;

/// Largest number of entries accepted out of a single table/table2 section.
pub const MAX_TABLE_ENTRIES: usize = 16 * 1024 * 1024;

/// Largest allocation a single buffer is allowed to make (256 MiB).
pub const MAX_ALLOCATION_SIZE: usize = 256 * 1024 * 1024;

/// Largest file size this engine will memory-map (16 GiB).
pub const MAX_MMAP_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Largest number of segment files kept open concurrently by the file-IO pool.
pub const MAX_OPEN_SEGMENT_FILES: usize = 16;

/// Largest decoded length accepted for a single device-information or
/// case-data metadata string (1 MiB of UTF-16LE text).
pub const MAX_METADATA_STRING_LENGTH: usize = 1024 * 1024;

/// Validate that a size is within allocation limits.
pub fn validate_allocation_size(size: u64, limit: usize, context: &str) -> crate::Result<usize> {
    if size > limit as u64 {
        return Err(Error::argument(format!(
            "{context} size {size} exceeds limit {limit}"
        )));
    }

    size.try_into()
        .map_err(|_| Error::argument(format!("{context} size exceeds platform limits")))
}

/// Safely multiply two u64 values with overflow checking.
pub fn checked_multiply_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| Error::argument(format!("{context}: multiplication overflow")))
}

/// Safely multiply two u32 values and return a u64.
pub fn checked_multiply_u32_to_u64(a: u32, b: u32, context: &str) -> crate::Result<u64> {
    (a as u64)
        .checked_mul(b as u64)
        .ok_or_else(|| Error::argument(format!("{context}: multiplication overflow")))
}

/// Safely convert a u64 to usize, rejecting values that would truncate.
pub fn u64_to_usize(value: u64, context: &str) -> crate::Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::argument(format!("{context}: value {value} exceeds platform usize limit")))
}

/// Validate `bytes_per_sector` from a volume/disk section.
pub fn validate_bytes_per_sector(bytes_per_sector: u32) -> crate::Result<()> {
    if bytes_per_sector == 0 || bytes_per_sector > MAX_BYTES_PER_SECTOR {
        return Err(Error::argument(format!(
            "invalid bytes_per_sector {bytes_per_sector} (must be 1-{MAX_BYTES_PER_SECTOR})"
        )));
    }
    Ok(())
}

/// Validate `sectors_per_chunk` and the resulting chunk size from a
/// volume/disk section, catching the overflow and bomb cases a forged
/// section could otherwise trigger during allocation.
pub fn validate_chunk_geometry(sectors_per_chunk: u32, bytes_per_sector: u32) -> crate::Result<u32> {
    if sectors_per_chunk == 0 || sectors_per_chunk > MAX_SECTORS_PER_CHUNK {
        return Err(Error::argument(format!(
            "invalid sectors_per_chunk {sectors_per_chunk} (must be 1-{MAX_SECTORS_PER_CHUNK})"
        )));
    }
    validate_bytes_per_sector(bytes_per_sector)?;

    let chunk_size = checked_multiply_u32_to_u64(sectors_per_chunk, bytes_per_sector, "chunk_size")?;
    if chunk_size > MAX_CHUNK_SIZE as u64 {
        return Err(Error::argument(format!(
            "chunk size {chunk_size} exceeds limit {MAX_CHUNK_SIZE}"
        )));
    }
    Ok(chunk_size as u32)
}

/// Validate a requested or discovered segment file size.
pub fn validate_segment_size(size: u64) -> crate::Result<()> {
    if size > MAX_SEGMENT_SIZE {
        return Err(Error::argument(format!(
            "segment size {size} exceeds limit {MAX_SEGMENT_SIZE}"
        )));
    }
    Ok(())
}
