//! In-memory holder of the current catalog snapshot
//!
//! There is one catalog, so there is one slot. A successful fetch replaces
//! the whole snapshot; readers get an `Arc` and never see a half-written one.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::data::{build_tree, root_categories, CategoryRecord, CategoryTreeNode};

/// One fetched catalog: the top-level categories, the full forest, and when
/// it was fetched
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    pub root_categories: Arc<[CategoryRecord]>,
    pub tree: Arc<[CategoryTreeNode]>,
    pub fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Builds the tree and root list from a flat category list
    pub fn build(records: &[CategoryRecord], fetched_at: DateTime<Utc>) -> Self {
        Self {
            root_categories: root_categories(records).into(),
            tree: build_tree(records).into(),
            fetched_at,
        }
    }

    /// The records placed in the tree, in depth-first order
    pub fn records(&self) -> Vec<CategoryRecord> {
        let mut records = Vec::new();
        let mut stack: Vec<&CategoryTreeNode> = self.tree.iter().rev().collect();
        while let Some(node) = stack.pop() {
            records.push(node.record.clone());
            stack.extend(node.children.iter().rev());
        }
        records
    }

    /// Total number of categories in the tree
    pub fn len(&self) -> usize {
        self.tree.iter().map(CategoryTreeNode::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// Shared slot holding the current snapshot and its freshness window
#[derive(Debug)]
pub struct CacheStore {
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
    ttl: Duration,
}

impl CacheStore {
    /// Creates an empty store whose snapshots stay fresh for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true if a snapshot exists and is younger than the TTL at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.read() {
            Some(snapshot) => {
                let age = now.signed_duration_since(snapshot.fetched_at);
                // A snapshot stamped in the future counts as brand new.
                match age.to_std() {
                    Ok(age) => age < self.ttl,
                    Err(_) => true,
                }
            }
            None => false,
        }
    }

    /// Returns the current snapshot, if any
    pub fn read(&self) -> Option<Arc<CatalogSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replaces the current snapshot
    pub fn write(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Installs `snapshot` only if the store is still empty
    ///
    /// Returns the snapshot the store holds afterwards.
    pub fn write_if_empty(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match current.as_ref() {
            Some(existing) => Arc::clone(existing),
            None => {
                let snapshot = Arc::new(snapshot);
                *current = Some(Arc::clone(&snapshot));
                snapshot
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn sample_records() -> Vec<CategoryRecord> {
        vec![
            CategoryRecord::root("1").with_name("Shoes"),
            CategoryRecord::child_of("2", "1").with_name("Boots"),
            CategoryRecord::root("3").with_name("Hats"),
        ]
    }

    #[test]
    fn test_empty_store_is_not_fresh() {
        let store = CacheStore::new(Duration::from_secs(300));

        assert!(store.read().is_none());
        assert!(!store.is_fresh(Utc::now()));
    }

    #[test]
    fn test_snapshot_is_fresh_within_ttl() {
        let store = CacheStore::new(Duration::from_secs(300));
        let fetched_at = Utc::now();
        store.write(CatalogSnapshot::build(&sample_records(), fetched_at));

        assert!(store.is_fresh(fetched_at));
        assert!(store.is_fresh(fetched_at + ChronoDuration::seconds(299)));
    }

    #[test]
    fn test_snapshot_goes_stale_at_ttl() {
        let store = CacheStore::new(Duration::from_secs(300));
        let fetched_at = Utc::now();
        store.write(CatalogSnapshot::build(&sample_records(), fetched_at));

        assert!(!store.is_fresh(fetched_at + ChronoDuration::seconds(300)));
        assert!(!store.is_fresh(fetched_at + ChronoDuration::hours(1)));
        assert!(store.read().is_some(), "stale snapshot is still readable");
    }

    #[test]
    fn test_zero_ttl_is_never_fresh() {
        let store = CacheStore::new(Duration::ZERO);
        let fetched_at = Utc::now();
        store.write(CatalogSnapshot::build(&sample_records(), fetched_at));

        assert!(!store.is_fresh(fetched_at));
    }

    #[test]
    fn test_write_replaces_whole_snapshot() {
        let store = CacheStore::new(Duration::from_secs(300));
        let first = store.write(CatalogSnapshot::build(&sample_records(), Utc::now()));
        let second = store.write(CatalogSnapshot::build(
            &[CategoryRecord::root("9")],
            Utc::now(),
        ));

        let current = store.read().unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert_eq!(current.tree.len(), 1);
        assert_eq!(first.tree.len(), 2, "earlier readers keep their snapshot");
    }

    #[test]
    fn test_write_if_empty_keeps_existing() {
        let store = CacheStore::new(Duration::from_secs(300));
        let first = store.write(CatalogSnapshot::build(&sample_records(), Utc::now()));

        let kept = store.write_if_empty(CatalogSnapshot::build(&[], Utc::now()));

        assert!(Arc::ptr_eq(&first, &kept));
    }

    #[test]
    fn test_snapshot_build_derives_roots_and_tree() {
        let snapshot = CatalogSnapshot::build(&sample_records(), Utc::now());

        assert_eq!(snapshot.root_categories.len(), 2);
        assert_eq!(snapshot.root_categories[0].id.as_str(), "1");
        assert_eq!(snapshot.root_categories[1].id.as_str(), "3");
        assert_eq!(snapshot.tree[0].children.len(), 1);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_snapshot_records_walk_depth_first() {
        let snapshot = CatalogSnapshot::build(&sample_records(), Utc::now());
        let ids: Vec<String> = snapshot
            .records()
            .into_iter()
            .map(|record| record.id.to_string())
            .collect();

        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
