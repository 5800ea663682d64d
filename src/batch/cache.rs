//! LRU cache of open output archives
//!
//! Every key owns a folder below the cache root. The folder holds a
//! `.zipfolder` file with the JSON-encoded key and numbered archives
//! (`0.ndjson.zst`, `1.ndjson.zst`, ...). A key that is evicted and later
//! requested again gets a fresh archive; earlier archives are never touched.

use super::archive::{ArchiveWriter, ARCHIVE_EXTENSION};
use crate::error::IntervalError;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the per-folder metadata file
pub const METADATA_FILE: &str = ".zipfolder";

/// Shared handle on one open archive; lock it for the duration of a write
pub type WriterHandle = Arc<Mutex<ArchiveWriter>>;

struct Entry {
    writer: WriterHandle,
    tick: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// Keys by last access, oldest first
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl State {
    fn touch(&mut self, key: &str) -> Option<WriterHandle> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key.to_string());
        self.next_tick += 1;
        Some(Arc::clone(&entry.writer))
    }

    fn insert(&mut self, key: &str, writer: WriterHandle) {
        let tick = self.next_tick;
        self.next_tick += 1;
        self.recency.insert(tick, key.to_string());
        self.entries.insert(key.to_string(), Entry { writer, tick });
    }

    fn pop_oldest(&mut self) -> Option<(String, WriterHandle)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        Some((key, entry.writer))
    }
}

/// Bounded set of open archive writers with least-recently-used eviction.
///
/// Different keys can be written concurrently; writes to the same key are
/// serialized by the writer's own lock.
pub struct ArchiveCache {
    root: PathBuf,
    capacity: usize,
    state: Mutex<State>,
}

impl ArchiveCache {
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Result<Self, IntervalError> {
        let root = root.into();
        if capacity == 0 {
            return Err(IntervalError::InvalidCapacity(capacity));
        }
        if !root.is_dir() {
            return Err(IntervalError::InvalidConfig(format!(
                "archive root {} is not an existing directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            capacity,
            state: Mutex::new(State::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writer for `key`, opening a new archive if the key is not cached
    pub fn get_writer(&self, key: &str) -> Result<WriterHandle, IntervalError> {
        let mut state = self.state.lock();
        if let Some(writer) = state.touch(key) {
            return Ok(writer);
        }

        while state.entries.len() >= self.capacity {
            let Some((evicted, writer)) = state.pop_oldest() else {
                break;
            };
            log::debug!("evicting archive for {:?}", evicted);
            writer.lock().finish()?;
        }

        let writer = Arc::new(Mutex::new(self.open_archive(key)?));
        state.insert(key, Arc::clone(&writer));
        Ok(writer)
    }

    /// Append entries to the archive of `key`
    pub fn append<T: Serialize>(&self, key: &str, entries: &[T]) -> Result<(), IntervalError> {
        loop {
            let handle = self.get_writer(key)?;
            let mut writer = handle.lock();
            // evicted between lookup and lock, ask again for a fresh archive
            if writer.is_finished() {
                continue;
            }
            for entry in entries {
                writer.add(entry)?;
            }
            return Ok(());
        }
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Number of open archives
    pub fn size(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Finish all open archives and empty the cache.
    ///
    /// Every archive is finished even if an earlier one fails; the first
    /// failure is returned.
    pub fn dispose(&self) -> Result<(), IntervalError> {
        let mut state = self.state.lock();
        let mut result = Ok(());
        while let Some((key, writer)) = state.pop_oldest() {
            if let Err(e) = writer.lock().finish() {
                log::error!("failed to finish archive for {:?}: {}", key, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn open_archive(&self, key: &str) -> Result<ArchiveWriter, IntervalError> {
        let folder = self.root.join(key_to_relative_path(key));
        fs::create_dir_all(&folder)?;

        let metadata = folder.join(METADATA_FILE);
        if !metadata.exists() {
            fs::write(&metadata, serde_json::to_string_pretty(key)?)?;
        }

        let mut index = 0;
        loop {
            let path = folder.join(format!("{}.{}", index, ARCHIVE_EXTENSION));
            if !path.exists() {
                return ArchiveWriter::create(path);
            }
            index += 1;
        }
    }
}

impl Drop for ArchiveCache {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::warn!("failed to dispose archive cache: {}", e);
        }
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || ",+-_$()[]{}".contains(c)
}

/// Folder of a key below the cache root.
///
/// `/` and `.` separate levels and empty levels collapse; any other
/// character outside `[A-Za-z0-9,+-_$()[]{}]` becomes `_`.
pub fn key_to_relative_path(key: &str) -> PathBuf {
    let path: PathBuf = key
        .split(['/', '.'])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .chars()
                .map(|c| if is_allowed(c) { c } else { '_' })
                .collect::<String>()
        })
        .collect();
    if path.as_os_str().is_empty() {
        PathBuf::from("_")
    } else {
        path
    }
}
