//! Generational storage for wrapped nodes.
//!
//! Each wrapped composite occupies a slot. Released slots go on a free list
//! and are reused with a bumped generation, so a [`NodeId`] held past its
//! node's release is detected as stale instead of aliasing a newer node.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;


/// Identity of a wrapped node: slot index plus generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    idx: u32,
    generation: u32,
}

impl NodeId {
    /// Raw slot index (for diagnostics only).
    pub fn index(self) -> u32 {
        self.idx
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.idx, self.generation)
    }
}


/// What a key of a wrapped node holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Stored as-is: null, bool, number, string, array.
    Leaf(Value),
    /// A nested wrapped composite.
    Node(NodeId),
}


#[derive(Debug, Default)]
pub struct NodeData {
    pub entries: BTreeMap<String, Slot>,
    /// Number of slots (anywhere in the tree) holding this node.
    pub refs: usize,
}


#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Option<NodeData>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty node.
    pub fn alloc(&mut self) -> NodeId {
        let data = Some(NodeData::default());
        if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] = self.generation[i].wrapping_add(1);
            self.nodes[i] = data;
            NodeId { idx, generation: self.generation[i] }
        } else {
            let idx = self.nodes.len() as u32;
            self.nodes.push(data);
            self.generation.push(0);
            NodeId { idx, generation: 0 }
        }
    }

    /// Release a node's slot. Stale ids are ignored.
    pub fn free(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.is_alive(id) {
            return None;
        }
        let data = self.nodes[id.idx as usize].take();
        self.free_list.push(id.idx);
        data
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        let i = id.idx as usize;
        i < self.nodes.len() && self.generation[i] == id.generation && self.nodes[i].is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        if self.generation.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        self.nodes.get(id.idx as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        if self.generation.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        self.nodes.get_mut(id.idx as usize).and_then(Option::as_mut)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alloc_and_get() {
        let mut arena = Arena::new();
        let id = arena.alloc();
        assert!(arena.is_alive(id));
        arena
            .get_mut(id)
            .unwrap()
            .entries
            .insert("k".into(), Slot::Leaf(json!(1)));
        assert_eq!(arena.get(id).unwrap().entries.len(), 1);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut arena = Arena::new();
        let old = arena.alloc();
        assert!(arena.free(old).is_some());
        assert!(!arena.is_alive(old));

        let new = arena.alloc();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(arena.get(old).is_none());
        assert!(arena.get(new).is_some());
    }

    #[test]
    fn double_free_is_ignored() {
        let mut arena = Arena::new();
        let id = arena.alloc();
        assert!(arena.free(id).is_some());
        assert!(arena.free(id).is_none());
        assert!(arena.is_empty());
    }
}
