//! Bounded pool of open segment file descriptors
//!
//! A resume or export touching a multi-segment EWF set can easily involve
//! more segment files than a process wants open file descriptors for at
//! once. `FilePool` keeps at most `capacity` files open, closing the least
//! recently used one when a new segment needs to be opened.

use ewf_core::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

struct OpenEntry {
    file: File,
    writable: bool,
}

/// A pool of lazily-opened, least-recently-used-evicted segment files.
pub struct FilePool {
    paths: Vec<PathBuf>,
    capacity: usize,
    open: HashMap<usize, OpenEntry>,
    /// Most recently used index is at the back.
    recency: VecDeque<usize>,
}

impl FilePool {
    /// Create a pool over `paths`, keeping at most `capacity` files open
    /// concurrently (see [`ewf_core::MAX_OPEN_SEGMENT_FILES`] for the
    /// engine's default).
    pub fn new(paths: Vec<PathBuf>, capacity: usize) -> Self {
        Self {
            paths,
            capacity: capacity.max(1),
            open: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    /// Number of segment file paths known to this pool.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path of the segment file at `index`.
    pub fn path(&self, index: usize) -> Option<&PathBuf> {
        self.paths.get(index)
    }

    /// Add a new segment file path to the end of the pool, e.g. when a
    /// write rolls over to the next segment file.
    pub fn push_path(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Run `f` against the open file at `index`, opening it (and evicting
    /// an LRU entry if necessary) first if it is not already open.
    pub fn with_file<T>(
        &mut self,
        index: usize,
        writable: bool,
        f: impl FnOnce(&mut File) -> Result<T>,
    ) -> Result<T> {
        self.ensure_open(index, writable)?;
        self.touch(index);
        let entry = self
            .open
            .get_mut(&index)
            .expect("just ensured this index is open");
        f(&mut entry.file)
    }

    fn ensure_open(&mut self, index: usize, writable: bool) -> Result<()> {
        let path = self
            .paths
            .get(index)
            .ok_or_else(|| Error::argument(format!("no segment file at index {index}")))?
            .clone();

        if let Some(entry) = self.open.get(&index) {
            if writable && !entry.writable {
                self.open.remove(&index);
                self.recency.retain(|&i| i != index);
            } else {
                return Ok(());
            }
        }

        if self.open.len() >= self.capacity {
            self.evict_one()?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&path)?;

        self.open.insert(index, OpenEntry { file, writable });
        Ok(())
    }

    fn evict_one(&mut self) -> Result<()> {
        if let Some(lru) = self.recency.pop_front() {
            tracing::debug!(segment_index = lru, "closing least-recently-used segment file");
            self.open.remove(&lru);
        }
        Ok(())
    }

    fn touch(&mut self, index: usize) {
        self.recency.retain(|&i| i != index);
        self.recency.push_back(index);
    }
}
