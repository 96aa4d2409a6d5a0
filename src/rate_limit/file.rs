// src/rate_limit/file.rs
//! Crash-durable counter store: the whole window table lives in one JSON file,
//! rewritten atomically (tmp + rename) after every recorded hit.
//!
//! Atomic across tasks of one process. Several processes sharing a file need the
//! Upstash store instead.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::memory::WindowTable;
use super::{CounterStore, RateLimitError};

pub struct FileCounterStore {
    path: PathBuf,
    table: Mutex<WindowTable>,
}

impl FileCounterStore {
    /// Open (or create) the store at `path`. A corrupt file starts an empty table.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let table = match load_table(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => WindowTable::default(),
            Err(e) => {
                tracing::warn!(target: "ratelimit", error = %e, path = %path.display(), "counter file unreadable, starting empty");
                WindowTable::default()
            }
        };
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_table(path: &Path) -> io::Result<WindowTable> {
    let s = fs::read_to_string(path)?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(contents.as_bytes())?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[async_trait::async_trait]
impl CounterStore for FileCounterStore {
    /// The async lock is held across the write so saves land in hit order.
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<bool, RateLimitError> {
        let mut g = self.table.lock().await;
        if !g.hit(key, limit, window_ms, now_ms) {
            return Ok(false);
        }

        let saved = match serde_json::to_string(&*g) {
            Ok(snapshot) => {
                let path = self.path.clone();
                match tokio::task::spawn_blocking(move || write_atomic(&path, &snapshot)).await {
                    Ok(res) => res.map_err(|e| e.to_string()),
                    Err(join) => Err(join.to_string()),
                }
            }
            Err(e) => Err(e.to_string()),
        };
        match saved {
            Ok(()) => Ok(true),
            Err(e) => {
                // Not admitted, so it must not consume budget.
                g.undo(key, now_ms);
                tracing::warn!(target: "ratelimit", error = %e, path = %self.path.display(), "counter file write failed");
                Err(RateLimitError::Store(e))
            }
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rl/counters.json");

        let store = FileCounterStore::open(&path).unwrap();
        assert!(store.hit("report", 2, 60_000, 1_000).await.unwrap());
        assert!(store.hit("report", 2, 60_000, 2_000).await.unwrap());
        drop(store);

        let reopened = FileCounterStore::open(&path).unwrap();
        assert!(!reopened.hit("report", 2, 60_000, 3_000).await.unwrap());
        assert!(reopened.hit("report", 2, 60_000, 62_000).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileCounterStore::open(&path).unwrap();
        assert!(store.hit("k", 1, 60_000, 0).await.unwrap());
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn failed_write_does_not_consume_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");
        let store = FileCounterStore::open(&path).unwrap();

        // A directory squatting on the temp path makes every save fail.
        let tmp = path.with_extension("json.tmp");
        fs::create_dir(&tmp).unwrap();
        assert!(matches!(
            store.hit("k", 1, 60_000, 0).await,
            Err(RateLimitError::Store(_))
        ));

        fs::remove_dir(&tmp).unwrap();
        assert!(store.hit("k", 1, 60_000, 1).await.unwrap());
        assert!(!store.hit("k", 1, 60_000, 2).await.unwrap());
    }
}
