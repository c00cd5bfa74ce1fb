// ── Snapshot store ──
//
// Holds the single current snapshot behind an atomically swappable
// pointer. The refresh loop is the only writer; readers get a cheap `Arc`
// to a complete, immutable snapshot and never observe a partial update.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// One refresh cycle's resolved values, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    cycle: u64,
    captured_at: DateTime<Utc>,
    values: IndexMap<String, Value>,
}

impl Snapshot {
    pub fn new(cycle: u64, values: IndexMap<String, Value>) -> Self {
        Self {
            cycle,
            captured_at: Utc::now(),
            values,
        }
    }

    /// Monotonic install number, starting at 1 for the first snapshot.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Values in registry order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }

    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The current snapshot, or none before the first successful refresh.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
    installs: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with a new one built from `values`.
    ///
    /// Single writer: only the refresh loop calls this.
    pub fn install(&self, values: IndexMap<String, Value>) -> Arc<Snapshot> {
        let cycle = self.installs.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(Snapshot::new(cycle, values));
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// Number of snapshots installed so far.
    pub fn installs(&self) -> u64 {
        self.installs.load(Ordering::Acquire)
    }

    /// Whether a snapshot newer than install number `after` is current.
    pub fn has_newer_than(&self, after: u64) -> bool {
        self.current.load().as_ref().is_some_and(|s| s.cycle > after)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use super::*;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_until_first_install() {
        let store = SnapshotStore::new();
        assert!(!store.is_ready());
        assert!(store.current().is_none());
        assert_eq!(store.installs(), 0);
    }

    #[test]
    fn install_replaces_and_numbers_cycles() {
        let store = SnapshotStore::new();
        store.install(values(&[("x", json!(1))]));
        let second = store.install(values(&[("x", json!(2))]));

        assert_eq!(second.cycle(), 2);
        let current = store.current().unwrap();
        assert_eq!(current.get("x"), Some(&json!(2)));
        assert!(store.has_newer_than(1));
        assert!(!store.has_newer_than(2));
    }

    #[test]
    fn held_snapshot_is_unaffected_by_later_installs() {
        let store = SnapshotStore::new();
        store.install(values(&[("x", json!("old"))]));
        let held = store.current().unwrap();
        store.install(values(&[("x", json!("new"))]));

        assert_eq!(held.get("x"), Some(&json!("old")));
    }

    #[test]
    fn concurrent_readers_never_see_torn_snapshots() {
        let store = Arc::new(SnapshotStore::new());
        store.install(values(&[("a", json!(0)), ("b", json!(0)), ("c", json!(0))]));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=2_000 {
                    store.install(values(&[("a", json!(i)), ("b", json!(i)), ("c", json!(i))]));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snap = store.current().unwrap();
                        let first = snap.values().next().unwrap().clone();
                        assert!(snap.values().all(|v| *v == first));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
