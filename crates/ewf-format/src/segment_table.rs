//! Segment table: the sequence of segment files belonging to one image
//! set, with the extension naming/rollover rules and filesystem glob.
//!
//! `glob()` probes `std::fs::metadata` for each successive candidate
//! name rather than using the `glob` crate: that crate matches
//! shell-style patterns against an existing directory listing, whereas
//! this engine needs to *construct* the next candidate name and test
//! for its existence — a smaller, different operation, and one the
//! teacher's own `e01` module doesn't reach for a crate to do either.

use crate::segment_file::SegmentFileKind;
use ewf_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Largest representable segment index across the numeric and letter
/// phases of the classic EWF1 naming scheme (99 numeric + 22*26*26 letter).
const EWF1_MAX_INDEX: u32 = 99 + 22 * 26 * 26;

/// Largest representable segment index for the EWF2 naming scheme
/// (99 numeric + 26*26 letter).
const EWF2_MAX_INDEX: u32 = 99 + 26 * 26;

fn classic_extension(base: char, upper_case: bool, index: u32) -> Result<String> {
    if index == 0 {
        return Err(Error::argument("segment index must be >= 1"));
    }
    if index <= 99 {
        return Ok(format!("{base}{index:02}"));
    }

    let k = index - 100;
    let last_first = if upper_case { b'Z' } else { b'z' };
    let first_base = base as u32;
    let span = (last_first as u32).saturating_sub(first_base) + 1;
    let total = span * 676;
    if k >= total {
        return Err(Error::argument("segment index exceeds the classic extension space"));
    }

    let letter_a = if upper_case { b'A' } else { b'a' } as u32;
    let first = char::from_u32(first_base + k / 676).unwrap();
    let second = char::from_u32(letter_a + (k / 26) % 26).unwrap();
    let third = char::from_u32(letter_a + k % 26).unwrap();
    Ok(format!("{first}{second}{third}"))
}

fn ewf2_extension(base: char, index: u32) -> Result<String> {
    if index == 0 {
        return Err(Error::argument("segment index must be >= 1"));
    }
    if index <= 99 {
        return Ok(format!("{base}x{index:02}"));
    }

    let k = index - 100;
    if k >= 676 {
        return Err(Error::argument("segment index exceeds the EWF2 extension space"));
    }
    let second = char::from_u32(b'A' as u32 + k / 26).unwrap();
    let third = char::from_u32(b'A' as u32 + k % 26).unwrap();
    Ok(format!("{base}x{second}{third}"))
}

/// Compute the 3-character (EWF1) or 4-character (EWF2) extension for the
/// `index`-th segment file (1-based) of an image set of the given `kind`.
pub fn extension_for(kind: SegmentFileKind, index: u32) -> Result<String> {
    match kind {
        SegmentFileKind::Ewf1Image => classic_extension('E', true, index),
        SegmentFileKind::Ewf1Logical => classic_extension('L', true, index),
        SegmentFileKind::Ewf1Delta => classic_extension('d', false, index),
        SegmentFileKind::Ewf2Image => ewf2_extension('E', index),
        SegmentFileKind::Ewf2Logical => ewf2_extension('L', index),
    }
}

fn max_index_for(kind: SegmentFileKind) -> u32 {
    if kind.is_ewf2() {
        EWF2_MAX_INDEX
    } else {
        EWF1_MAX_INDEX
    }
}

fn candidate_path(base_path: &Path, extension: &str) -> PathBuf {
    let mut os_string = base_path.as_os_str().to_owned();
    os_string.push(".");
    os_string.push(extension);
    PathBuf::from(os_string)
}

/// Enumerate successive segment file paths for `base_path` + `kind` until
/// the filesystem reports the next one missing.
pub fn glob(base_path: &Path, kind: SegmentFileKind) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let max_index = max_index_for(kind);

    for index in 1..=max_index {
        let extension = extension_for(kind, index)?;
        let candidate = candidate_path(base_path, &extension);
        if !candidate.exists() {
            break;
        }
        files.push(candidate);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn numeric_phase_matches_historical_extensions() {
        assert_eq!(extension_for(SegmentFileKind::Ewf1Image, 1).unwrap(), "E01");
        assert_eq!(extension_for(SegmentFileKind::Ewf1Image, 99).unwrap(), "E99");
    }

    #[test]
    fn letter_phase_starts_at_eaa_and_increments() {
        assert_eq!(extension_for(SegmentFileKind::Ewf1Image, 100).unwrap(), "EAA");
        assert_eq!(extension_for(SegmentFileKind::Ewf1Image, 101).unwrap(), "EAB");
        assert_eq!(extension_for(SegmentFileKind::Ewf1Image, 125).unwrap(), "EAZ");
        assert_eq!(extension_for(SegmentFileKind::Ewf1Image, 126).unwrap(), "EBA");
    }

    #[test]
    fn logical_and_delta_variants_use_their_own_first_letter() {
        assert_eq!(extension_for(SegmentFileKind::Ewf1Logical, 1).unwrap(), "L01");
        assert_eq!(extension_for(SegmentFileKind::Ewf1Delta, 1).unwrap(), "d01");
        assert_eq!(extension_for(SegmentFileKind::Ewf1Delta, 100).unwrap(), "daa");
    }

    #[test]
    fn ewf2_extensions_use_four_characters() {
        assert_eq!(extension_for(SegmentFileKind::Ewf2Image, 1).unwrap(), "Ex01");
        assert_eq!(extension_for(SegmentFileKind::Ewf2Image, 100).unwrap(), "ExAA");
        assert_eq!(extension_for(SegmentFileKind::Ewf2Logical, 1).unwrap(), "Lx01");
    }

    #[test]
    fn zero_index_is_rejected() {
        assert!(extension_for(SegmentFileKind::Ewf1Image, 0).is_err());
    }

    #[test]
    fn scenario_7_glob_stops_at_first_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("X");

        File::create(candidate_path(&base, "E01")).unwrap();
        File::create(candidate_path(&base, "E02")).unwrap();
        // E03 intentionally absent.
        File::create(candidate_path(&base, "E04")).unwrap();

        let files = glob(&base, SegmentFileKind::Ewf1Image).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].to_string_lossy().ends_with("X.E01"));
        assert!(files[1].to_string_lossy().ends_with("X.E02"));
    }
}
