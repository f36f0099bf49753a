//! Parent chain registry: which dotted paths reach each wrapped node.
//!
//! Keyed by [`NodeId`], never holding node data. Entries are pruned as soon
//! as a node is detached from a location or released, so the registry never
//! keeps bookkeeping for nodes that are gone.

use std::collections::{BTreeSet, HashMap};

use super::arena::NodeId;
use crate::path;


#[derive(Debug, Default)]
pub struct Registry {
    paths: HashMap<NodeId, BTreeSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` is reachable at `at`. Idempotent.
    pub fn register(&mut self, id: NodeId, at: String) {
        self.paths.entry(id).or_default().insert(at);
    }

    /// Every path reaching `id`, sorted. Empty for the root and for nodes
    /// the registry has never seen.
    pub fn prefixes(&self, id: NodeId) -> Vec<String> {
        self.paths
            .get(&id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.paths.contains_key(&id)
    }

    /// Drop every path of `id` that is `ancestor` or lies under it.
    ///
    /// Returns how many paths were dropped.
    pub fn unregister_within(&mut self, id: NodeId, ancestor: &str) -> usize {
        let Some(set) = self.paths.get_mut(&id) else {
            return 0;
        };
        let before = set.len();
        set.retain(|p| !path::is_within(p, ancestor));
        let dropped = before - set.len();
        if set.is_empty() {
            self.paths.remove(&id);
        }
        dropped
    }

    /// Drop the entry for `id` entirely.
    pub fn forget(&mut self, id: NodeId) {
        self.paths.remove(&id);
    }

    /// Number of nodes with at least one registered path.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
