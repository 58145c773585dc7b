//! On-disk digest → captured-output store.
//!
//! Entries live at `<cache_dir>/<digest[0..2]>/<digest>`, one JSON file per
//! cached invocation, sharded two hex chars deep to bound directory fan-out.

use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};

/// The captured streams and exit code of one cached tool invocation.
///
/// Serialized with the `returncode` wire name for compatibility with caches
/// written by earlier revisions of this tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CachedOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    #[serde(rename = "returncode")]
    pub(crate) exit_code: i32,
}

/// An entry file on disk, as seen by the eviction sweep.
#[derive(Debug, Clone)]
pub(crate) struct EntryMeta {
    pub(crate) path: PathBuf,
    pub(crate) mtime: SystemTime,
    pub(crate) size: u64,
}

/// Sharded key/value store rooted at the configured cache directory.
#[derive(Debug, Clone)]
pub(crate) struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, digest: &str) -> PathBuf {
        self.root.join(&digest[..2]).join(digest)
    }

    /// Look up a digest. Unreadable or malformed entries read as a miss;
    /// eviction gets rid of them eventually.
    pub(crate) fn lookup(&self, digest: &str) -> Option<CachedOutput> {
        let path = self.entry_path(digest);
        let bytes = fs::read(&path).ok()?;

        match serde_json::from_slice(&bytes) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::debug!(
                    "Treating malformed cache entry {} as a miss: {e}",
                    path.display()
                );
                None
            }
        }
    }

    /// Persist an entry, creating its shard directory on demand.
    ///
    /// The entry is written to a sibling temp file and renamed into place, so
    /// a concurrent reader sees either the whole record or nothing.
    pub(crate) fn store(&self, digest: &str, output: &CachedOutput) -> Result<()> {
        let path = self.entry_path(digest);
        let shard = path
            .parent()
            .expect("entry paths always have a shard parent");
        fs::create_dir_all(shard).with_context(|_| error::IoSnafu {
            path: shard.to_path_buf(),
        })?;

        let json = serde_json::to_vec(output).context(error::JsonSnafu)?;

        let mut tmp = tempfile::NamedTempFile::new_in(shard).with_context(|_| error::IoSnafu {
            path: shard.to_path_buf(),
        })?;
        tmp.write_all(&json).with_context(|_| error::IoSnafu {
            path: tmp.path().to_path_buf(),
        })?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|_| error::IoSnafu { path })?;

        Ok(())
    }

    /// Enumerate every entry file under the cache root.
    ///
    /// Unreadable shards and files are skipped; the sweep that consumes this
    /// is best-effort anyway.
    pub(crate) fn iter_entries(&self) -> Vec<EntryMeta> {
        let mut entries = Vec::new();
        let Ok(shards) = fs::read_dir(&self.root) else {
            return entries;
        };

        for shard in shards.flatten() {
            if !shard.file_type().is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            let Ok(files) = fs::read_dir(shard.path()) else {
                continue;
            };
            for file in files.flatten() {
                let Ok(meta) = file.metadata() else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                entries.push(EntryMeta {
                    path: file.path(),
                    mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    size: meta.len(),
                });
            }
        }

        entries
    }

    /// Total bytes currently held by the store.
    pub(crate) fn total_size(&self) -> u64 {
        self.iter_entries().iter().map(|entry| entry.size).sum()
    }

    /// Remove every entry and shard, leaving an empty cache root behind.
    pub(crate) fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).with_context(|_| error::IoSnafu {
                path: self.root.clone(),
            })?;
        }
        fs::create_dir_all(&self.root).with_context(|_| error::IoSnafu {
            path: self.root.clone(),
        })?;
        Ok(())
    }
}
