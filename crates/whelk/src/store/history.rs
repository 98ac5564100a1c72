//! Bounded snapshot history for rollback.
//!
//! The live file map is an `Arc<FileMap>`. Taking a snapshot clones the
//! outer `Arc`; the next mutation goes through `Arc::make_mut`, which copies
//! the map of `Arc<VirtualFile>` pointers (never file contents) only while a
//! snapshot still shares it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use super::VirtualFile;

/// Path-keyed map of shared files.
pub(crate) type FileMap = BTreeMap<String, Arc<VirtualFile>>;

/// Opaque point-in-time copy of the file mapping.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<FileMap>);

impl Snapshot {
    pub(crate) fn capture(files: &Arc<FileMap>) -> Self {
        Self(Arc::clone(files))
    }

    pub(crate) fn into_files(self) -> Arc<FileMap> {
        self.0
    }

    /// Number of files in the snapshot.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no files.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stack of snapshots that forgets its oldest entry past `depth`.
#[derive(Debug, Clone)]
pub(crate) struct History {
    snapshots: VecDeque<Snapshot>,
    depth: usize,
}

impl History {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        if self.depth == 0 {
            return;
        }
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.depth {
            self.snapshots.pop_front();
            tracing::debug!("history full, dropped oldest snapshot");
        }
        tracing::trace!("pushed snapshot, history depth now {}", self.snapshots.len());
    }

    pub(crate) fn pop(&mut self) -> Option<Snapshot> {
        self.snapshots.pop_back()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn map_with(paths: &[&str]) -> Arc<FileMap> {
        let mut map = FileMap::new();
        for path in paths {
            map.insert(
                (*path).to_string(),
                Arc::new(VirtualFile::new(path.to_string(), String::new())),
            );
        }
        Arc::new(map)
    }

    #[test]
    fn test_push_pop_is_lifo() {
        let mut history = History::new(10);
        history.push(Snapshot::capture(&map_with(&["a.ts"])));
        history.push(Snapshot::capture(&map_with(&["a.ts", "b.ts"])));

        assert_eq!(history.pop().unwrap().len(), 2);
        assert_eq!(history.pop().unwrap().len(), 1);
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_oldest_dropped_past_depth() {
        let mut history = History::new(2);
        history.push(Snapshot::capture(&map_with(&[])));
        history.push(Snapshot::capture(&map_with(&["a.ts"])));
        history.push(Snapshot::capture(&map_with(&["a.ts", "b.ts"])));

        assert_eq!(history.len(), 2);
        assert_eq!(history.pop().unwrap().len(), 2);
        assert_eq!(history.pop().unwrap().len(), 1);
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_zero_depth_keeps_nothing() {
        let mut history = History::new(0);
        history.push(Snapshot::capture(&map_with(&["a.ts"])));
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_snapshot_shares_until_mutated() {
        let mut live = map_with(&["a.ts"]);
        let snapshot = Snapshot::capture(&live);
        assert_eq!(Arc::strong_count(&live), 2);

        Arc::make_mut(&mut live).remove("a.ts");

        assert!(live.is_empty());
        assert_eq!(snapshot.len(), 1);
    }
}
