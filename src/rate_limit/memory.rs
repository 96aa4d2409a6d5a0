// src/rate_limit/memory.rs
//! In-process sliding-window store. Shared by every request in one process.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{CounterStore, RateLimitError};

/// Minimum gap between full sweeps of expired keys.
const SWEEP_INTERVAL_MS: u64 = 1_000;

/// Event timestamps (unix ms) for one key, oldest at the front.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Window {
    window_ms: u64,
    events: VecDeque<u64>,
}

impl Window {
    fn is_live(&self, now_ms: u64) -> bool {
        self.events
            .back()
            .is_some_and(|&t| t.saturating_add(self.window_ms) > now_ms)
    }
}

/// Every key's window. Keys whose events have all expired are swept out, so the
/// table stays proportional to the keys active in the last window.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct WindowTable {
    windows: HashMap<String, Window>,
    #[serde(skip)]
    last_sweep_ms: u64,
}

impl WindowTable {
    pub(crate) fn hit(&mut self, key: &str, limit: u32, window_ms: u64, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_sweep_ms) >= SWEEP_INTERVAL_MS {
            self.windows.retain(|_, w| w.is_live(now_ms));
            self.last_sweep_ms = now_ms;
        }
        let w = self.windows.entry(key.to_string()).or_default();
        w.window_ms = window_ms;
        let admitted = slide_and_record(&mut w.events, limit, window_ms, now_ms);
        if w.events.is_empty() {
            self.windows.remove(key);
        }
        admitted
    }

    /// Take back an event recorded by `hit` at `now_ms`.
    pub(crate) fn undo(&mut self, key: &str, now_ms: u64) {
        if let Some(w) = self.windows.get_mut(key) {
            if let Some(pos) = w.events.iter().rposition(|&t| t == now_ms) {
                w.events.remove(pos);
            }
            if w.events.is_empty() {
                self.windows.remove(key);
            }
        }
    }

    pub(crate) fn count(&self, key: &str) -> usize {
        self.windows.get(key).map_or(0, |w| w.events.len())
    }

    pub(crate) fn keys(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    inner: Mutex<WindowTable>,
}

impl MemoryCounterStore {
    pub fn count(&self, key: &str) -> usize {
        self.inner.lock().map(|g| g.count(key)).unwrap_or(0)
    }

    /// Number of keys currently holding events.
    pub fn tracked_keys(&self) -> usize {
        self.inner.lock().map(|g| g.keys()).unwrap_or(0)
    }
}

/// Drop events that left the trailing window, then admit when below `limit`.
pub(crate) fn slide_and_record(buf: &mut VecDeque<u64>, limit: u32, window_ms: u64, now_ms: u64) -> bool {
    while let Some(&t) = buf.front() {
        if t.saturating_add(window_ms) <= now_ms {
            buf.pop_front();
        } else {
            break;
        }
    }
    if (buf.len() as u64) < u64::from(limit) {
        buf.push_back(now_ms);
        true
    } else {
        false
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: u64,
        now_ms: u64,
    ) -> Result<bool, RateLimitError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| RateLimitError::Store("memory store mutex poisoned".into()))?;
        Ok(g.hit(key, limit, window_ms, now_ms))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_events_are_dropped_before_counting() {
        let mut buf = VecDeque::from(vec![0, 10_000]);
        assert!(!slide_and_record(&mut buf, 2, 60_000, 59_000));
        assert!(slide_and_record(&mut buf, 2, 60_000, 60_000));
        assert_eq!(buf, VecDeque::from(vec![10_000, 60_000]));
    }

    #[test]
    fn zero_limit_always_denies() {
        let mut buf = VecDeque::new();
        assert!(!slide_and_record(&mut buf, 0, 60_000, 1));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn denied_hits_are_not_recorded() {
        let store = MemoryCounterStore::default();
        assert!(store.hit("k", 1, 1000, 0).await.unwrap());
        assert!(!store.hit("k", 1, 1000, 1).await.unwrap());
        assert_eq!(store.count("k"), 1);
    }

    #[tokio::test]
    async fn keys_are_evicted_once_their_windows_expire() {
        let store = MemoryCounterStore::default();
        for i in 0..1000 {
            let key = format!("fetch:https://site{i}.example");
            assert!(store.hit(&key, 10, 60_000, 1_000).await.unwrap());
        }
        assert_eq!(store.tracked_keys(), 1000);

        assert!(store.hit("search:rust", 5, 60_000, 1_000_000).await.unwrap());
        assert_eq!(store.tracked_keys(), 1);
        assert_eq!(store.count("search:rust"), 1);
    }

    #[tokio::test]
    async fn live_windows_survive_a_sweep() {
        let store = MemoryCounterStore::default();
        assert!(store.hit("report", 2, 60_000, 0).await.unwrap());
        assert!(store.hit("short", 2, 1_000, 0).await.unwrap());
        assert!(store.hit("other", 2, 60_000, 30_000).await.unwrap());
        assert_eq!(store.count("report"), 1);
        assert_eq!(store.count("short"), 0);
        assert_eq!(store.tracked_keys(), 2);
    }

    #[test]
    fn undo_removes_the_recorded_event() {
        let mut table = WindowTable::default();
        assert!(table.hit("k", 1, 60_000, 5));
        table.undo("k", 5);
        assert_eq!(table.keys(), 0);
        assert!(table.hit("k", 1, 60_000, 6));
    }
}
