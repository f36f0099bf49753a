//! Point-in-time reads.
//!
//! A snapshot copies one level: the keys of a composite, with nested
//! composites left as live [`Node`] handles. Bookkeeping (registry,
//! channels, hooks) never appears in it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::Level;

use super::arena::{NodeId, Slot};
use super::{walk, Item, Node, Observed};
use crate::errors::TreeError;
use crate::path::TreePath;


#[derive(Debug, Clone)]
pub enum Snapshot {
    Leaf(Value),
    Composite(BTreeMap<String, Item>),
}

impl Snapshot {
    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Snapshot::Leaf(v) => Some(v),
            Snapshot::Composite(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        match self {
            Snapshot::Composite(entries) => entries.get(key),
            Snapshot::Leaf(_) => None,
        }
    }

    /// Keys of a composite snapshot, sorted. Empty for a leaf.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Snapshot::Composite(entries) => entries.keys().map(String::as_str).collect(),
            Snapshot::Leaf(_) => Vec::new(),
        }
    }

    /// Deep JSON copy. Nested nodes are read as they are now, not as they
    /// were when the snapshot was taken.
    pub fn to_value(&self) -> Value {
        match self {
            Snapshot::Leaf(v) => v.clone(),
            Snapshot::Composite(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    out.insert(key.clone(), item.to_value());
                }
                Value::Object(out)
            }
        }
    }
}


impl Observed {
    /// Shallow copy of the root's keys.
    pub fn snapshot(&self) -> Snapshot {
        let root = self.inner.state.borrow().root;
        self.shallow(root).unwrap_or_else(|_| Snapshot::Composite(BTreeMap::new()))
    }

    /// Snapshot of whatever `path` holds, or `None` if it does not resolve.
    ///
    /// On failure the configured logger is told which segment was missing
    /// or not a composite.
    pub fn snapshot_at(&self, path: &str) -> Option<Snapshot> {
        match self.try_snapshot_at(path) {
            Ok(snap) => Some(snap),
            Err(err) => {
                self.inner.logger.log(Level::DEBUG, &format!("snapshot: {}", err));
                None
            }
        }
    }

    /// Like [`snapshot_at`](Self::snapshot_at), reporting the failure as an error.
    pub fn try_snapshot_at(&self, path: &str) -> Result<Snapshot, TreeError> {
        let parsed = TreePath::parse(path)?;
        let (parent_keys, key) = parsed.split_last();
        let slot = {
            let state = self.inner.state.borrow();
            let parent = walk(&state, state.root, parent_keys, path)?;
            let data = state.arena.get(parent).ok_or(TreeError::Detached)?;
            data.entries
                .get(key)
                .cloned()
                .ok_or_else(|| TreeError::Unresolved {
                    path: path.to_string(),
                    segment: key.to_string(),
                })?
        };
        match slot {
            Slot::Leaf(v) => Ok(Snapshot::Leaf(v)),
            Slot::Node(id) => self.shallow(id),
        }
    }

    fn shallow(&self, id: NodeId) -> Result<Snapshot, TreeError> {
        let entries: Vec<(String, Slot)> = {
            let state = self.inner.state.borrow();
            let data = state.arena.get(id).ok_or(TreeError::Detached)?;
            data.entries.iter().map(|(k, s)| (k.clone(), s.clone())).collect()
        };
        Ok(Snapshot::Composite(
            entries
                .into_iter()
                .map(|(k, slot)| (k, self.item_for(slot)))
                .collect(),
        ))
    }
}


impl Node {
    /// Shallow copy of this node's keys.
    pub fn snapshot(&self) -> Result<Snapshot, TreeError> {
        self.tree.shallow(self.id)
    }
}


#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::diag::MemoryLogger;
    use crate::hooks::{Hooks, Options};

    fn logged(initial: Value) -> (Observed, Rc<MemoryLogger>) {
        let logger = Rc::new(MemoryLogger::new());
        let tree = Observed::with_options(initial, Options::new().with_logger(logger.clone())).unwrap();
        (tree, logger)
    }

    #[test]
    fn root_snapshot_has_only_state_keys() {
        let options = Options::new().with_interceptor(Hooks::new().on_set(|_| true));
        let tree = Observed::with_options(json!({"a": {"b": 1}, "n": 2}), options).unwrap();
        tree.observe("a.b");

        let snap = tree.snapshot();
        assert_eq!(snap.keys(), vec!["a", "n"]);
        assert_eq!(snap.to_value(), json!({"a": {"b": 1}, "n": 2}));
    }

    #[test]
    fn snapshot_is_shallow() {
        let tree = Observed::new(json!({"a": {"b": {"c": 1}}, "n": 1})).unwrap();
        let snap = tree.snapshot_at("a").unwrap();
        let b = snap.get("b").and_then(Item::as_node).cloned().unwrap();

        tree.set("n", json!(2)).unwrap();
        b.set("c", json!(5)).unwrap();

        // the copied level is fixed, nested nodes are live
        assert_eq!(tree.snapshot().get("n").and_then(Item::as_leaf), Some(&json!(2)));
        assert_eq!(snap.to_value(), json!({"b": {"c": 5}}));
    }

    #[test]
    fn root_level_is_copied() {
        let tree = Observed::new(json!({"n": 1})).unwrap();
        let snap = tree.snapshot();
        tree.set("n", json!(2)).unwrap();
        tree.set("m", json!(3)).unwrap();
        assert_eq!(snap.to_value(), json!({"n": 1}));
    }

    #[test]
    fn leaf_snapshot() {
        let tree = Observed::new(json!({"a": {"b": [1, 2]}})).unwrap();
        let snap = tree.snapshot_at("a.b").unwrap();
        assert_eq!(snap.as_leaf(), Some(&json!([1, 2])));
        assert!(snap.keys().is_empty());
    }

    #[test]
    fn missing_segment_returns_none_and_logs_it() {
        let (tree, logger) = logged(json!({"a": {"c": 1}}));
        assert!(tree.snapshot_at("a.b").is_none());
        let messages = logger.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("segment 'b'"));
    }

    #[test]
    fn first_failing_segment_is_reported() {
        let (tree, logger) = logged(json!({"a": {"b": 1}}));
        assert!(tree.snapshot_at("x.y.z").is_none());
        assert!(tree.snapshot_at("a.b.c").is_none());
        let messages = logger.messages();
        assert!(messages[0].contains("segment 'x'"));
        assert!(messages[1].contains("segment 'b' is not a composite"));
    }

    #[test]
    fn try_snapshot_returns_error() {
        let tree = Observed::new(json!({"a": {}})).unwrap();
        assert_eq!(
            tree.try_snapshot_at("a.b").unwrap_err(),
            TreeError::Unresolved { path: "a.b".into(), segment: "b".into() }
        );
        assert!(matches!(tree.try_snapshot_at(""), Err(TreeError::InvalidPath(_))));
    }

    #[test]
    fn detached_node_snapshot_fails() {
        let tree = Observed::new(json!({"a": {"b": 1}})).unwrap();
        let a = tree.node("a").unwrap();
        assert_eq!(a.snapshot().unwrap().keys(), vec!["b"]);
        tree.delete("a").unwrap();
        assert_eq!(a.snapshot().unwrap_err(), TreeError::Detached);
    }
}
