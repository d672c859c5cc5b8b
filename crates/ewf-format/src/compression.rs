//! Deflate compression for chunk payloads and header-group sections.
//!
//! `bzip2` is deliberately not wired to a working codec here: the source
//! itself guards its bzip2 path with `#ifdef IGNORE` and a `TODO`
//! comment in `libewf_chunk_data_pack_buffer`. `CompressionMethod::Bzip2`
//! exists so EWF2 files that declare it still open and report the method
//! correctly, but `compress`/`decompress` reject it.

use ewf_core::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compression method recorded in a volume/data section or EWF2 fields header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Deflate,
    /// Declared-but-unsupported; see module docs.
    Bzip2,
}

impl CompressionMethod {
    pub fn from_wire(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Deflate,
            2 => Self::Bzip2,
            _ => Self::None,
        }
    }

    pub fn to_wire(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Deflate => 1,
            Self::Bzip2 => 2,
        }
    }
}

/// Compression level, matching the source's none/fast/default/best levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    None,
    Fast,
    Default,
    Best,
}

impl CompressionLevel {
    fn to_flate2(self) -> Compression {
        match self {
            Self::None => Compression::none(),
            Self::Fast => Compression::new(1),
            Self::Default => Compression::new(6),
            Self::Best => Compression::new(9),
        }
    }
}

/// Outcome of a compress attempt that distinguishes "ran out of room in
/// the destination buffer" from a hard error, as the chunk codec needs to.
pub enum CompressOutcome {
    Ok(Vec<u8>),
    TooSmall,
}

/// Compress `src` with `method` at `level`.
///
/// `max_size`, when `Some`, is the destination buffer budget: if the
/// compressed stream would not fit, returns `CompressOutcome::TooSmall`
/// instead of a larger buffer, matching the source's too-small outcome.
pub fn compress(
    method: CompressionMethod,
    level: CompressionLevel,
    src: &[u8],
    max_size: Option<usize>,
) -> Result<CompressOutcome> {
    match method {
        CompressionMethod::None => Ok(CompressOutcome::Ok(src.to_vec())),
        CompressionMethod::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level.to_flate2());
            encoder
                .write_all(src)
                .map_err(|e| Error::compress_failed(e.to_string()))?;
            let compressed = encoder
                .finish()
                .map_err(|e| Error::compress_failed(e.to_string()))?;

            if let Some(max) = max_size {
                if compressed.len() > max {
                    return Ok(CompressOutcome::TooSmall);
                }
            }
            Ok(CompressOutcome::Ok(compressed))
        }
        CompressionMethod::Bzip2 => Err(Error::unsupported(
            "bzip2 compression is not implemented; declared-only per EWF2 fields header",
        )),
    }
}

/// Decompress a zlib-wrapped Deflate stream (or pass through uncompressed data).
pub fn decompress(method: CompressionMethod, src: &[u8]) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(src.to_vec()),
        CompressionMethod::Deflate => {
            let mut decoder = ZlibDecoder::new(src);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::decompress_failed(e.to_string()))?;
            Ok(out)
        }
        CompressionMethod::Bzip2 => Err(Error::unsupported(
            "bzip2 decompression is not implemented; declared-only per EWF2 fields header",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_round_trips() {
        let src = b"Hello, world!\n".repeat(100);
        let packed = match compress(CompressionMethod::Deflate, CompressionLevel::Default, &src, None).unwrap() {
            CompressOutcome::Ok(bytes) => bytes,
            CompressOutcome::TooSmall => panic!("unexpected too-small"),
        };
        assert!(packed.len() < src.len());
        let restored = decompress(CompressionMethod::Deflate, &packed).unwrap();
        assert_eq!(restored, src);
    }

    #[test]
    fn none_method_passes_through() {
        let src = b"raw bytes".to_vec();
        let packed = match compress(CompressionMethod::None, CompressionLevel::Default, &src, None).unwrap() {
            CompressOutcome::Ok(bytes) => bytes,
            CompressOutcome::TooSmall => panic!("unexpected too-small"),
        };
        assert_eq!(packed, src);
        assert_eq!(decompress(CompressionMethod::None, &packed).unwrap(), src);
    }

    #[test]
    fn too_small_budget_is_reported() {
        let src = vec![0xAAu8; 4096]; // high-entropy-ish alternating, won't compress to nothing
        let outcome = compress(CompressionMethod::Deflate, CompressionLevel::Best, &src, Some(1)).unwrap();
        assert!(matches!(outcome, CompressOutcome::TooSmall));
    }

    #[test]
    fn bzip2_is_unsupported() {
        assert!(compress(CompressionMethod::Bzip2, CompressionLevel::Default, b"x", None).is_err());
        assert!(decompress(CompressionMethod::Bzip2, b"x").is_err());
    }

    #[test]
    fn method_wire_round_trip() {
        for m in [CompressionMethod::None, CompressionMethod::Deflate, CompressionMethod::Bzip2] {
            assert_eq!(CompressionMethod::from_wire(m.to_wire()), m);
        }
    }
}
