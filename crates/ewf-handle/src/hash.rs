//! Running MD5/SHA-1 digests, computed alongside the chunk data path and
//! back-patched into the first segment file's hash/digest section by the
//! sections-correction pass.

use md5::{Digest, Md5};
use sha1::Sha1;
use std::io::Read;

/// Which digest(s) a `Hasher` tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
}

impl HashAlgorithm {
    pub fn output_size(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HashResult {
    pub algorithm: HashAlgorithm,
    pub hash: Vec<u8>,
    pub hex: String,
}

impl HashResult {
    pub fn new(algorithm: HashAlgorithm, hash: Vec<u8>) -> Self {
        let hex = hex::encode(&hash);
        Self { algorithm, hash, hex }
    }

    pub fn matches(&self, other: &HashResult) -> bool {
        self.algorithm == other.algorithm && self.hash == other.hash
    }

    pub fn matches_hex(&self, hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(hex)
    }
}

/// Running multi-algorithm hasher updated as chunks are written or read.
pub struct Hasher {
    md5: Option<Md5>,
    sha1: Option<Sha1>,
    bytes_processed: u64,
}

impl Hasher {
    pub fn new(algorithms: &[HashAlgorithm]) -> Self {
        let md5 = algorithms.contains(&HashAlgorithm::Md5).then(Md5::new);
        let sha1 = algorithms.contains(&HashAlgorithm::Sha1).then(Sha1::new);
        Self { md5, sha1, bytes_processed: 0 }
    }

    pub fn all() -> Self {
        Self::new(&[HashAlgorithm::Md5, HashAlgorithm::Sha1])
    }

    pub fn update(&mut self, data: &[u8]) {
        if let Some(ref mut h) = self.md5 {
            h.update(data);
        }
        if let Some(ref mut h) = self.sha1 {
            h.update(data);
        }
        self.bytes_processed += data.len() as u64;
    }

    pub fn finalize(self) -> Vec<HashResult> {
        let mut results = Vec::new();
        if let Some(h) = self.md5 {
            results.push(HashResult::new(HashAlgorithm::Md5, h.finalize().to_vec()));
        }
        if let Some(h) = self.sha1 {
            results.push(HashResult::new(HashAlgorithm::Sha1, h.finalize().to_vec()));
        }
        results
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }
}

pub fn hash_reader<R: Read>(reader: &mut R, algorithms: &[HashAlgorithm]) -> std::io::Result<Vec<HashResult>> {
    let mut hasher = Hasher::new(algorithms);
    let mut buffer = vec![0u8; 1024 * 1024];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn md5_hash_matches_known_vector() {
        let data = b"Hello, World!";
        let mut reader = Cursor::new(data);
        let results = hash_reader(&mut reader, &[HashAlgorithm::Md5]).unwrap();
        assert_eq!(results[0].hex, "65a8e27d8879283831b664bd8b7f0ad4");
    }

    #[test]
    fn multi_hash_returns_both_algorithms() {
        let data = b"test";
        let mut reader = Cursor::new(data);
        let results = hash_reader(&mut reader, &[HashAlgorithm::Md5, HashAlgorithm::Sha1]).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn hasher_incremental_matches_one_shot() {
        let mut hasher = Hasher::new(&[HashAlgorithm::Md5]);
        hasher.update(b"Hello, ");
        hasher.update(b"World!");
        let results = hasher.finalize();
        assert_eq!(results[0].hex, "65a8e27d8879283831b664bd8b7f0ad4");
    }
}
