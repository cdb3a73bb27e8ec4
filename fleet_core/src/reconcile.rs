//! Membership diff between consecutive snapshots.

use std::collections::HashMap;
use std::hash::Hash;

/// Outcome of reconciling one overlay class against the previous cycle.
///
/// The three sets are disjoint; `added` plus `updated` is exactly the id set
/// of the current snapshot, and `removed` is every prior id now absent.
/// There is deliberately no attribute-level change detection: an id present
/// in both cycles always lands in `updated` and is re-applied, which keeps
/// the diff conservative and cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDiff<K> {
    pub added: Vec<K>,
    pub updated: Vec<K>,
    pub removed: Vec<K>,
}

impl<K> Default for EntityDiff<K> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<K> EntityDiff<K> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Split the current id set against the previous one.
///
/// Output vectors are sorted so application order is deterministic. Runs
/// once per overlay class per cycle; classes do not share id spaces.
pub fn diff_keys<K, V>(previous: &HashMap<K, V>, current: &HashMap<K, V>) -> EntityDiff<K>
where
    K: Clone + Eq + Hash + Ord,
{
    let mut diff = EntityDiff::default();

    for id in current.keys() {
        if previous.contains_key(id) {
            diff.updated.push(id.clone());
        } else {
            diff.added.push(id.clone());
        }
    }
    for id in previous.keys() {
        if !current.contains_key(id) {
            diff.removed.push(id.clone());
        }
    }

    diff.added.sort_unstable();
    diff.updated.sort_unstable();
    diff.removed.sort_unstable();
    diff
}
