//! Observed state tree.
//!
//! # Data Flow
//! ```text
//! Observed::set("a.b", v)  /  Node::set("b", v)
//!     → resolve receiver node, registry gives every path it is reachable at
//!     → chain.rs computes path → change for each full path
//!     → interceptor hook may veto
//!     → wrap.rs stores v (objects become nodes), old subtree detached
//!     → hub delivers deepest paths first, before the call returns
//! ```
//!
//! `Observed` and `Node` are cheap handles over shared, single-threaded
//! state. No internal borrow is held while hooks or subscriber callbacks
//! run, so those may read and mutate the tree freely.

pub mod arena;
pub mod intercept;
pub mod registry;
pub mod snapshot;
pub mod wrap;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::config::TreeConfig;
use crate::diag::Logger;
use crate::errors::TreeError;
use crate::hooks::{Interceptor, Options};
use crate::notify::{Channel, Hub, Subscription};
use crate::path::{self, TreePath};

use arena::{Arena, NodeId, Slot};
use registry::Registry;

pub use snapshot::Snapshot;


/// Result of a write, link, or delete that was not a structural error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored, and notifications were delivered.
    Applied,
    /// Nothing to do: same leaf value, or deleting an absent key.
    Unchanged,
    /// The interceptor refused the operation. Nothing stored, nothing sent.
    Vetoed,
}

impl WriteOutcome {
    /// True unless the interceptor vetoed.
    pub fn succeeded(self) -> bool {
        !matches!(self, WriteOutcome::Vetoed)
    }
}


/// A value read from the tree.
#[derive(Debug, Clone)]
pub enum Item {
    Leaf(Value),
    Node(Node),
}

impl Item {
    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Item::Leaf(v) => Some(v),
            Item::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Item::Node(n) => Some(n),
            Item::Leaf(_) => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Item::Node(n) => Some(n),
            Item::Leaf(_) => None,
        }
    }

    /// Deep JSON copy. A detached node reads as an empty object.
    pub fn to_value(&self) -> Value {
        match self {
            Item::Leaf(v) => v.clone(),
            Item::Node(n) => n.to_value().unwrap_or_else(|_| Value::Object(Map::new())),
        }
    }
}


pub(crate) struct TreeState {
    pub(crate) arena: Arena,
    pub(crate) registry: Registry,
    pub(crate) root: NodeId,
}

impl TreeState {
    pub(crate) fn from_object(map: &Map<String, Value>) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc();
        let mut state = TreeState {
            arena,
            registry: Registry::new(),
            root,
        };
        state.fill(root, map, &[]);
        if let Some(data) = state.arena.get_mut(root) {
            data.refs = 1;
        }
        state
    }
}


/// Full paths for `key` on a node reachable at `prefixes`.
/// No prefixes means the node is the root.
pub(crate) fn compose(prefixes: &[String], key: &str) -> Vec<String> {
    if prefixes.is_empty() {
        vec![key.to_string()]
    } else {
        prefixes.iter().map(|p| path::join(p, key)).collect()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}


struct Inner {
    state: RefCell<TreeState>,
    hub: Hub,
    interceptor: Option<Box<dyn Interceptor>>,
    logger: Rc<dyn Logger>,
    config: TreeConfig,
}


/// Root handle of an observed tree.
///
/// Cloning gives another handle on the same tree.
#[derive(Clone)]
pub struct Observed {
    inner: Rc<Inner>,
}

impl Observed {
    /// Wrap `initial`, which must be a JSON object, with default options.
    pub fn new(initial: Value) -> Result<Self, TreeError> {
        Self::with_options(initial, Options::default())
    }

    pub fn with_options(initial: Value, options: Options) -> Result<Self, TreeError> {
        let map = match initial {
            Value::Object(map) => map,
            other => return Err(TreeError::RootNotComposite(kind_of(&other))),
        };
        for (key, child) in &map {
            path::validate_key(key)?;
            wrap::check_keys(child)?;
        }
        let nesting = 1 + map.values().map(wrap::composite_depth).max().unwrap_or(0);
        wrap::check_depth(nesting, &[], options.config.max_depth)?;

        let state = TreeState::from_object(&map);
        tracing::debug!(nodes = state.arena.len(), "observed tree created");

        Ok(Observed {
            inner: Rc::new(Inner {
                state: RefCell::new(state),
                hub: Hub::new(),
                interceptor: options.interceptor,
                logger: options.logger,
                config: options.config,
            }),
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.inner.config
    }

    /// The root node.
    pub fn root(&self) -> Node {
        let root = self.inner.state.borrow().root;
        self.node_handle(root)
    }

    /// Read the value at `path`. Reading never registers anything.
    pub fn get(&self, path: &str) -> Option<Item> {
        let parsed = TreePath::parse(path).ok()?;
        let state = self.inner.state.borrow();
        let (parent_keys, key) = parsed.split_last();
        let parent = walk(&state, state.root, parent_keys, path).ok()?;
        let slot = state.arena.get(parent)?.entries.get(key)?.clone();
        drop(state);
        Some(self.item_for(slot))
    }

    /// The wrapped node at `path`, if `path` holds a composite.
    pub fn node(&self, path: &str) -> Option<Node> {
        self.get(path).and_then(Item::into_node)
    }

    /// Write `value` at `path`. The parent of `path` must already exist.
    pub fn set(&self, path: &str, value: Value) -> Result<WriteOutcome, TreeError> {
        let (parent, key) = self.resolve_parent(path)?;
        self.write(parent, &key, intercept::Incoming::Value(value))
    }

    /// Remove the key at `path`.
    pub fn delete(&self, path: &str) -> Result<WriteOutcome, TreeError> {
        let (parent, key) = self.resolve_parent(path)?;
        self.remove(parent, &key)
    }

    /// Store an existing node at `path` as well as wherever it already is.
    pub fn link(&self, path: &str, node: &Node) -> Result<WriteOutcome, TreeError> {
        let (parent, key) = self.resolve_parent(path)?;
        self.write(parent, &key, intercept::Incoming::Link(node.clone()))
    }

    /// The channel for `path`, created on first use.
    pub fn observe(&self, path: &str) -> Channel {
        self.inner.hub.observe(path)
    }

    /// Cancel a batch of subscriptions; their channels stay live.
    pub fn unsubscribe_all<I>(&self, handles: I) -> usize
    where
        I: IntoIterator<Item = Subscription>,
    {
        self.inner.hub.unsubscribe_all(handles)
    }

    /// Every path `node` is currently reachable at. Empty for the root.
    pub fn paths_of(&self, node: &Node) -> Vec<String> {
        self.inner.state.borrow().registry.prefixes(node.id)
    }

    /// Deep JSON copy of the whole tree.
    pub fn to_value(&self) -> Value {
        let state = self.inner.state.borrow();
        state.materialize(state.root)
    }

    /// Number of live wrapped nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.inner.state.borrow().arena.len()
    }

    /// Number of channels created so far.
    pub fn channel_count(&self) -> usize {
        self.inner.hub.len()
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn resolve_parent(&self, path: &str) -> Result<(NodeId, String), TreeError> {
        let parsed = TreePath::parse(path)?;
        let (parent_keys, key) = parsed.split_last();
        let state = self.inner.state.borrow();
        let parent = walk(&state, state.root, parent_keys, path)?;
        Ok((parent, key.to_string()))
    }

    fn node_handle(&self, id: NodeId) -> Node {
        Node {
            tree: self.clone(),
            id,
        }
    }

    fn item_for(&self, slot: Slot) -> Item {
        match slot {
            Slot::Leaf(v) => Item::Leaf(v),
            Slot::Node(id) => Item::Node(self.node_handle(id)),
        }
    }

    fn same_tree(&self, other: &Observed) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("nodes", &self.node_count())
            .field("channels", &self.channel_count())
            .finish()
    }
}


/// Follow `keys` down from `from`. `full` is only used in error messages.
pub(crate) fn walk(
    state: &TreeState,
    from: NodeId,
    keys: &[String],
    full: &str,
) -> Result<NodeId, TreeError> {
    let mut current = from;
    for key in keys {
        let data = state.arena.get(current).ok_or(TreeError::Detached)?;
        match data.entries.get(key) {
            Some(Slot::Node(child)) => current = *child,
            Some(Slot::Leaf(_)) => {
                return Err(TreeError::NotComposite {
                    path: full.to_string(),
                    segment: key.clone(),
                })
            }
            None => {
                return Err(TreeError::Unresolved {
                    path: full.to_string(),
                    segment: key.clone(),
                })
            }
        }
    }
    Ok(current)
}


/// Handle on one wrapped composite in an [`Observed`] tree.
///
/// A handle stays valid while the node is reachable from the root. Once
/// the node is detached everywhere and released, operations on the handle
/// return [`TreeError::Detached`].
#[derive(Clone)]
pub struct Node {
    tree: Observed,
    id: NodeId,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &Observed {
        &self.tree
    }

    pub fn is_attached(&self) -> bool {
        self.tree.inner.state.borrow().arena.is_alive(self.id)
    }

    /// Every path this node is reachable at. Empty for the root.
    pub fn paths(&self) -> Vec<String> {
        self.tree.paths_of(self)
    }

    pub fn get(&self, key: &str) -> Option<Item> {
        let slot = {
            let state = self.tree.inner.state.borrow();
            state.arena.get(self.id)?.entries.get(key)?.clone()
        };
        Some(self.tree.item_for(slot))
    }

    /// Keys of this node, sorted.
    pub fn keys(&self) -> Result<Vec<String>, TreeError> {
        let state = self.tree.inner.state.borrow();
        let data = state.arena.get(self.id).ok_or(TreeError::Detached)?;
        Ok(data.entries.keys().cloned().collect())
    }

    pub fn set(&self, key: &str, value: Value) -> Result<WriteOutcome, TreeError> {
        self.tree.write(self.id, key, intercept::Incoming::Value(value))
    }

    pub fn delete(&self, key: &str) -> Result<WriteOutcome, TreeError> {
        self.tree.remove(self.id, key)
    }

    /// Store `node` under `key` as well as wherever it already is.
    pub fn link(&self, key: &str, node: &Node) -> Result<WriteOutcome, TreeError> {
        self.tree.write(self.id, key, intercept::Incoming::Link(node.clone()))
    }

    /// Deep JSON copy of this node.
    pub fn to_value(&self) -> Result<Value, TreeError> {
        let state = self.tree.inner.state.borrow();
        if !state.arena.is_alive(self.id) {
            return Err(TreeError::Detached);
        }
        Ok(state.materialize(self.id))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.tree.same_tree(&other.tree)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Node").field(&self.id).finish()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_must_be_object() {
        assert_eq!(
            Observed::new(json!([1, 2])).unwrap_err(),
            TreeError::RootNotComposite("array")
        );
        assert!(Observed::new(json!(null)).is_err());
    }

    #[test]
    fn initial_value_reads_back() {
        let initial = json!({"a": {"b": 1}, "list": [1, 2], "s": "x"});
        let tree = Observed::new(initial.clone()).unwrap();
        assert_eq!(tree.to_value(), initial);
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn get_leaf_and_node() {
        let tree = Observed::new(json!({"a": {"b": 1}})).unwrap();
        assert_eq!(tree.get("a.b").unwrap().as_leaf(), Some(&json!(1)));
        let a = tree.node("a").unwrap();
        assert_eq!(a.to_value().unwrap(), json!({"b": 1}));
        assert_eq!(a.paths(), vec!["a"]);
    }

    #[test]
    fn get_missing_or_through_leaf_is_none() {
        let tree = Observed::new(json!({"a": {"b": 1}})).unwrap();
        assert!(tree.get("a.x").is_none());
        assert!(tree.get("a.b.c").is_none());
        assert!(tree.get("").is_none());
    }

    #[test]
    fn repeated_reads_return_same_node_without_side_effects() {
        let tree = Observed::new(json!({"a": {"b": 1}})).unwrap();
        let first = tree.node("a").unwrap();
        let second = tree.node("a").unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.channel_count(), 0);
        assert_eq!(tree.paths_of(&first), vec!["a"]);
    }

    #[test]
    fn root_has_no_paths() {
        let tree = Observed::new(json!({})).unwrap();
        assert!(tree.root().paths().is_empty());
        assert!(tree.root().is_attached());
    }

    #[test]
    fn initial_nesting_respects_limit() {
        let config = TreeConfig {
            max_depth: 1,
            ..TreeConfig::default()
        };
        let ok = Observed::with_options(json!({"a": {"b": 1}}), Options::new().with_config(config.clone()));
        assert!(ok.is_ok());
        let too_deep = Observed::with_options(json!({"a": {"b": {}}}), Options::new().with_config(config));
        assert!(matches!(too_deep, Err(TreeError::TooDeep { limit: 1, .. })));
    }

    #[test]
    fn initial_keys_must_be_addressable() {
        assert_eq!(
            Observed::new(json!({"a": {"b.c": 1}})).unwrap_err(),
            TreeError::InvalidKey("b.c".into())
        );
    }

    #[test]
    fn set_path_errors_name_the_segment() {
        let tree = Observed::new(json!({"a": {"b": 1}})).unwrap();
        assert_eq!(
            tree.set("x.y", json!(1)).unwrap_err(),
            TreeError::Unresolved { path: "x.y".into(), segment: "x".into() }
        );
        assert_eq!(
            tree.set("a.b.c", json!(1)).unwrap_err(),
            TreeError::NotComposite { path: "a.b.c".into(), segment: "b".into() }
        );
        assert!(matches!(tree.set("a..b", json!(1)), Err(TreeError::InvalidPath(_))));
    }

    #[test]
    fn node_keys_sorted() {
        let tree = Observed::new(json!({"b": 1, "a": 2})).unwrap();
        assert_eq!(tree.root().keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn item_helpers() {
        let tree = Observed::new(json!({"a": {"b": 1}, "n": 3})).unwrap();
        let leaf = tree.get("n").unwrap();
        assert!(leaf.as_node().is_none());
        assert_eq!(leaf.to_value(), json!(3));
        let node = tree.get("a").unwrap();
        assert!(node.as_leaf().is_none());
        assert_eq!(node.to_value(), json!({"b": 1}));
    }

    #[test]
    fn outcome_success() {
        assert!(WriteOutcome::Applied.succeeded());
        assert!(WriteOutcome::Unchanged.succeeded());
        assert!(!WriteOutcome::Vetoed.succeeded());
    }
}
