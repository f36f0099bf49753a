//! Notification chain computation.
//!
//! For one mutation at one path, work out every dotted path whose observed
//! value changes and what it changes to. Replacing a sub-tree fans out to
//! each descendant of the new value, and to each descendant of the old value
//! that no longer exists.

use std::collections::HashMap;

use serde_json::Value;

use crate::path;


/// What a single path changes to.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The path now holds this value.
    Value(Value),
    /// The path no longer exists.
    Removed,
}

impl Change {
    pub fn is_removed(&self) -> bool {
        matches!(self, Change::Removed)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Change::Value(v) => Some(v),
            Change::Removed => None,
        }
    }
}


/// The path→change list for one mutation.
///
/// Each path appears once. Entries keep the order they were first added in;
/// [`Chain::into_delivery_order`] reorders them deepest-first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    entries: Vec<(String, Change)>,
    index: HashMap<String, usize>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain for replacing `old` with `new` at `at`.
    ///
    /// `old` is `None` when the key did not exist before.
    pub fn build(old: Option<&Value>, new: &Change, at: &str) -> Self {
        let mut chain = Chain::new();
        chain.insert(at.to_string(), new.clone());

        if let Change::Value(new_value) = new {
            let mut added = Vec::new();
            collect_descendants(new_value, at, &mut added);
            for (p, v) in added {
                chain.insert(p, Change::Value(v));
            }
        }

        if let Some(old_value) = old {
            let mut gone = Vec::new();
            collect_descendants(old_value, at, &mut gone);
            for (p, _) in gone {
                if !chain.contains(&p) {
                    chain.insert(p, Change::Removed);
                }
            }
        }

        chain
    }

    /// Insert or overwrite the change for `path`.
    pub fn insert(&mut self, path: String, change: Change) {
        match self.index.get(&path) {
            Some(&i) => self.entries[i].1 = change,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, change));
            }
        }
    }

    /// Fold another chain into this one. Later entries win.
    pub fn merge(&mut self, other: Chain) {
        for (p, c) in other.entries {
            self.insert(p, c);
        }
    }

    pub fn get(&self, path: &str) -> Option<&Change> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c))
    }

    /// Entries ordered deepest path first; equal depths keep insertion order.
    ///
    /// Subscribers of a leaf hear about a change before subscribers of any
    /// composite enclosing it.
    pub fn into_delivery_order(self) -> Vec<(String, Change)> {
        let mut entries = self.entries;
        entries.sort_by_key(|(p, _)| std::cmp::Reverse(path::depth(p)));
        entries
    }
}


/// Every descendant path of `value` under `at`, pre-order, with its sub-value.
/// Leaves (including arrays) have no descendants.
fn collect_descendants(value: &Value, at: &str, out: &mut Vec<(String, Value)>) {
    if let Value::Object(map) = value {
        for (key, child) in map {
            let child_path = path::join(at, key);
            out.push((child_path.clone(), child.clone()));
            collect_descendants(child, &child_path, out);
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
