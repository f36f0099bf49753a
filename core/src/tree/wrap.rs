//! Wrapping JSON objects into arena nodes, and the matching teardown.
//!
//! Every object reachable through object keys becomes a node; every node
//! is registered under each path it is reachable at. Arrays and scalars
//! stay as leaf slots. Detaching a node from a location prunes the paths
//! under that location and releases nodes nothing refers to any more.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use super::arena::{NodeId, Slot};
use super::{compose, TreeState};
use crate::errors::TreeError;
use crate::path;


impl TreeState {
    /// Wrap `map` as a new node reachable at every path in `at`.
    ///
    /// Nested objects are wrapped recursively and registered under
    /// `at + "." + key`. The returned node has `refs == 0`; the caller
    /// stores it and bumps the count.
    pub(crate) fn wrap(&mut self, map: &Map<String, Value>, at: &[String]) -> NodeId {
        let id = self.arena.alloc();
        for p in at {
            self.registry.register(id, p.clone());
        }
        self.fill(id, map, at);
        id
    }

    /// Store the entries of `map` into the empty node `id` reachable at `at`.
    pub(crate) fn fill(&mut self, id: NodeId, map: &Map<String, Value>, at: &[String]) {
        for (key, value) in map {
            let slot = match value {
                Value::Object(child) => {
                    let child_at = compose(at, key);
                    let child_id = self.wrap(child, &child_at);
                    if let Some(data) = self.arena.get_mut(child_id) {
                        data.refs += 1;
                    }
                    Slot::Node(child_id)
                }
                leaf => Slot::Leaf(leaf.clone()),
            };
            if let Some(data) = self.arena.get_mut(id) {
                data.entries.insert(key.clone(), slot);
            }
        }
    }

    /// Register an existing node and its whole subtree under `at`.
    ///
    /// Paths the subtree already has are kept.
    pub(crate) fn attach(&mut self, id: NodeId, at: &[String]) {
        let mut on_stack = HashSet::new();
        self.attach_inner(id, at, &mut on_stack);
    }

    fn attach_inner(&mut self, id: NodeId, at: &[String], on_stack: &mut HashSet<NodeId>) {
        if !on_stack.insert(id) {
            tracing::warn!(?id, "cycle while registering subtree, skipping");
            return;
        }
        for p in at {
            self.registry.register(id, p.clone());
        }
        for (key, child) in self.child_nodes(id) {
            let child_at = compose(at, &key);
            self.attach_inner(child, &child_at, on_stack);
        }
        on_stack.remove(&id);
    }

    /// Remove `id` from the locations `at`, which a slot no longer holds.
    ///
    /// Drops every registered path under `at` from the subtree, then
    /// releases the node if no other slot refers to it.
    pub(crate) fn detach(&mut self, id: NodeId, at: &[String]) {
        let mut on_stack = HashSet::new();
        for p in at {
            self.prune_inner(id, p, &mut on_stack);
        }

        let remaining = match self.arena.get_mut(id) {
            Some(data) => {
                data.refs = data.refs.saturating_sub(1);
                data.refs
            }
            None => return,
        };
        if remaining == 0 {
            self.release(id);
        }
    }

    fn prune_inner(&mut self, id: NodeId, ancestor: &str, on_stack: &mut HashSet<NodeId>) {
        if !on_stack.insert(id) {
            return;
        }
        self.registry.unregister_within(id, ancestor);
        for (_, child) in self.child_nodes(id) {
            self.prune_inner(child, ancestor, on_stack);
        }
        on_stack.remove(&id);
    }

    /// Free a node nothing refers to, and any children left unreferenced.
    fn release(&mut self, id: NodeId) {
        self.registry.forget(id);
        let Some(data) = self.arena.free(id) else {
            return;
        };
        tracing::trace!(?id, "node released");
        for slot in data.entries.into_values() {
            if let Slot::Node(child) = slot {
                let remaining = match self.arena.get_mut(child) {
                    Some(c) => {
                        c.refs = c.refs.saturating_sub(1);
                        c.refs
                    }
                    None => continue,
                };
                if remaining == 0 {
                    self.release(child);
                }
            }
        }
    }

    /// Deep JSON copy of a node.
    pub(crate) fn materialize(&self, id: NodeId) -> Value {
        let mut on_stack = HashSet::new();
        self.materialize_inner(id, &mut on_stack)
    }

    pub(crate) fn materialize_slot(&self, slot: &Slot) -> Value {
        match slot {
            Slot::Leaf(v) => v.clone(),
            Slot::Node(id) => self.materialize(*id),
        }
    }

    fn materialize_inner(&self, id: NodeId, on_stack: &mut HashSet<NodeId>) -> Value {
        let mut out = Map::new();
        let Some(data) = self.arena.get(id) else {
            return Value::Object(out);
        };
        if !on_stack.insert(id) {
            return Value::Object(out);
        }
        for (key, slot) in &data.entries {
            let value = match slot {
                Slot::Leaf(v) => v.clone(),
                Slot::Node(child) => self.materialize_inner(*child, on_stack),
            };
            out.insert(key.clone(), value);
        }
        on_stack.remove(&id);
        Value::Object(out)
    }

    /// Map every path in the subtree of `id` (rooted at `at`) to its node.
    pub(crate) fn collect_nodes(&self, id: NodeId, at: &[String], out: &mut HashMap<String, NodeId>) {
        let mut on_stack = HashSet::new();
        self.collect_inner(id, at, out, &mut on_stack);
    }

    fn collect_inner(
        &self,
        id: NodeId,
        at: &[String],
        out: &mut HashMap<String, NodeId>,
        on_stack: &mut HashSet<NodeId>,
    ) {
        if !on_stack.insert(id) {
            return;
        }
        for p in at {
            out.insert(p.clone(), id);
        }
        for (key, child) in self.child_nodes(id) {
            let child_at = compose(at, &key);
            self.collect_inner(child, &child_at, out, on_stack);
        }
        on_stack.remove(&id);
    }

    /// True if `target` is `ancestor` or sits anywhere beneath it.
    pub(crate) fn subtree_contains(&self, ancestor: NodeId, target: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![ancestor];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.child_nodes(id).into_iter().map(|(_, c)| c));
            }
        }
        false
    }

    /// Levels of composite nesting in a stored node (1 for a flat node).
    pub(crate) fn node_depth(&self, id: NodeId) -> usize {
        let mut on_stack = HashSet::new();
        self.node_depth_inner(id, &mut on_stack)
    }

    fn node_depth_inner(&self, id: NodeId, on_stack: &mut HashSet<NodeId>) -> usize {
        if !on_stack.insert(id) {
            return 0;
        }
        let deepest = self
            .child_nodes(id)
            .into_iter()
            .map(|(_, c)| self.node_depth_inner(c, on_stack))
            .max()
            .unwrap_or(0);
        on_stack.remove(&id);
        deepest + 1
    }

    fn child_nodes(&self, id: NodeId) -> Vec<(String, NodeId)> {
        match self.arena.get(id) {
            Some(data) => data
                .entries
                .iter()
                .filter_map(|(k, slot)| match slot {
                    Slot::Node(c) => Some((k.clone(), *c)),
                    Slot::Leaf(_) => None,
                })
                .collect(),
            None => Vec::new(),
        }
    }
}


/// Levels of object nesting in a JSON value; 0 for leaves, 1 for a flat
/// object. Arrays are leaves and are not looked into.
pub(crate) fn composite_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(composite_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Reject objects (at any depth) with keys a dotted path cannot address.
pub(crate) fn check_keys(value: &Value) -> Result<(), TreeError> {
    if let Value::Object(map) = value {
        for (key, child) in map {
            path::validate_key(key)?;
            check_keys(child)?;
        }
    }
    Ok(())
}

/// Reject a composite whose deepest node would sit more than `limit` keys
/// below the root when stored at `at`.
pub(crate) fn check_depth(nesting: usize, at: &[String], limit: usize) -> Result<(), TreeError> {
    if nesting == 0 {
        return Ok(());
    }
    let base = at.iter().map(|p| path::depth(p)).max().unwrap_or(0);
    if base + nesting - 1 > limit {
        return Err(TreeError::TooDeep {
            path: at.first().cloned().unwrap_or_default(),
            limit,
        });
    }
    Ok(())
}
