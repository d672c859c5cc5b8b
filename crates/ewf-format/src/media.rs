//! Media values: the snapshot of the acquired device carried alongside a
//! segment file's volume/disk/data sections.

use bitflags::bitflags;
use ewf_core::{checked_multiply_u64, validate_chunk_geometry, Error, Result};
use uuid::Uuid;

/// Kind of media acquired, mirroring the source's `LIBEWF_MEDIA_TYPE_*` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Removable,
    Fixed,
    Optical,
    SingleFiles,
    Memory,
}

impl MediaType {
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Removable),
            0x01 => Ok(Self::Fixed),
            0x03 => Ok(Self::Optical),
            0x0E => Ok(Self::SingleFiles),
            0x10 => Ok(Self::Memory),
            v => Err(Error::argument(format!("unrecognized media type 0x{v:02x}"))),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Removable => 0x00,
            Self::Fixed => 0x01,
            Self::Optical => 0x03,
            Self::SingleFiles => 0x0E,
            Self::Memory => 0x10,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Removable => "Removable",
            Self::Fixed => "Fixed Disk",
            Self::Optical => "Optical",
            Self::SingleFiles => "Single Files",
            Self::Memory => "Memory",
        };
        write!(f, "{text}")
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MediaFlags: u8 {
        const PHYSICAL = 0b0000_0001;
        const FASTBLOC_WRITE_BLOCKED = 0b0000_0010;
        const TABLEAU_WRITE_BLOCKED = 0b0000_0100;
    }
}

/// A snapshot of the acquired device, valid for the lifetime of the image.
#[derive(Debug, Clone)]
pub struct MediaValues {
    pub media_type: MediaType,
    pub media_flags: MediaFlags,
    pub bytes_per_sector: u32,
    pub number_of_sectors: u64,
    pub sectors_per_chunk: u32,
    pub set_identifier: Uuid,
    pub error_granularity: u32,
}

impl MediaValues {
    pub fn new(
        media_type: MediaType,
        media_flags: MediaFlags,
        bytes_per_sector: u32,
        number_of_sectors: u64,
        sectors_per_chunk: u32,
    ) -> Result<Self> {
        if bytes_per_sector == 0 {
            return Err(Error::argument("bytes_per_sector must be non-zero"));
        }
        validate_chunk_geometry(sectors_per_chunk, bytes_per_sector)?;

        Ok(Self {
            media_type,
            media_flags,
            bytes_per_sector,
            number_of_sectors,
            sectors_per_chunk,
            set_identifier: Uuid::nil(),
            error_granularity: 64,
        })
    }

    /// `0` when the size is unknown until close (streamed writes).
    pub fn media_size(&self) -> Result<u64> {
        if self.number_of_sectors == 0 {
            return Ok(0);
        }
        checked_multiply_u64(self.number_of_sectors, self.bytes_per_sector as u64, "media_size")
    }

    pub fn chunk_size(&self) -> Result<u32> {
        validate_chunk_geometry(self.sectors_per_chunk, self.bytes_per_sector)
    }

    /// Recompute `number_of_sectors` for a streamed write whose size was
    /// unknown at open; the last partial sector is treated as padded.
    pub fn finalize_streamed_size(&mut self, total_bytes_written: u64) {
        let whole = total_bytes_written / self.bytes_per_sector as u64;
        let remainder = total_bytes_written % self.bytes_per_sector as u64;
        self.number_of_sectors = if remainder == 0 { whole } else { whole + 1 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_size_is_product_of_sectors_and_sector_size() {
        let media = MediaValues::new(MediaType::Fixed, MediaFlags::PHYSICAL, 512, 2048, 64).unwrap();
        assert_eq!(media.media_size().unwrap(), 2048 * 512);
        assert_eq!(media.chunk_size().unwrap(), 64 * 512);
    }

    #[test]
    fn zero_sectors_means_unknown_size() {
        let media = MediaValues::new(MediaType::Fixed, MediaFlags::empty(), 512, 0, 64).unwrap();
        assert_eq!(media.media_size().unwrap(), 0);
    }

    #[test]
    fn rejects_zero_bytes_per_sector() {
        assert!(MediaValues::new(MediaType::Fixed, MediaFlags::empty(), 0, 100, 64).is_err());
    }

    #[test]
    fn streamed_write_close_pads_final_partial_sector() {
        let mut media = MediaValues::new(MediaType::Fixed, MediaFlags::empty(), 512, 0, 64).unwrap();
        media.finalize_streamed_size(512 * 10 + 100);
        assert_eq!(media.number_of_sectors, 11);
    }

    #[test]
    fn media_type_wire_round_trip() {
        for t in [MediaType::Removable, MediaType::Fixed, MediaType::Optical, MediaType::SingleFiles, MediaType::Memory] {
            assert_eq!(MediaType::from_wire(t.to_wire()).unwrap(), t);
        }
    }
}
