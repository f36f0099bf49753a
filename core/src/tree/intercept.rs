//! Write, link, and delete protocol.
//!
//! Every mutation runs the same steps: resolve the receiver's paths, read
//! what was there, compute the notification chain, consult the
//! interceptor, store, then deliver. Storage happens under a short mutable
//! borrow; hooks and callbacks always run with the state unborrowed.

use std::collections::HashMap;

use serde_json::Value;
use tracing::Level;

use super::arena::{NodeId, Slot};
use super::wrap::{check_depth, check_keys, composite_depth};
use super::{compose, Node, Observed, WriteOutcome};
use crate::errors::TreeError;
use crate::hooks::{DeleteRequest, SetRequest};
use crate::notify::{Chain, Change, Signal};
use crate::path;


/// What a write stores.
pub(crate) enum Incoming {
    /// A JSON value; objects get wrapped into fresh nodes.
    Value(Value),
    /// An existing node, stored in one more place.
    Link(Node),
}


impl Observed {
    pub(super) fn write(
        &self,
        parent: NodeId,
        key: &str,
        incoming: Incoming,
    ) -> Result<WriteOutcome, TreeError> {
        path::validate_key(key)?;
        let limit = self.inner.config.max_depth;

        let linked = match &incoming {
            Incoming::Link(node) if !self.same_tree(&node.tree) => {
                return Err(TreeError::ForeignNode)
            }
            Incoming::Link(node) => Some(node.id),
            Incoming::Value(_) => None,
        };

        let (paths, previous, new_value) = {
            let state = self.inner.state.borrow();
            let data = state.arena.get(parent).ok_or(TreeError::Detached)?;
            let paths = compose(&state.registry.prefixes(parent), key);
            let current = data.entries.get(key);

            match (&incoming, current) {
                (Incoming::Value(v), Some(Slot::Leaf(old))) if old == v => {
                    return Ok(WriteOutcome::Unchanged);
                }
                (Incoming::Link(node), Some(Slot::Node(old))) if *old == node.id => {
                    return Ok(WriteOutcome::Unchanged);
                }
                _ => {}
            }

            let new_value = match incoming {
                Incoming::Value(v) => {
                    check_keys(&v)?;
                    check_depth(composite_depth(&v), &paths, limit)?;
                    v
                }
                Incoming::Link(node) => {
                    if !state.arena.is_alive(node.id) {
                        return Err(TreeError::Detached);
                    }
                    if state.subtree_contains(node.id, parent) {
                        return Err(TreeError::Cycle {
                            path: paths.first().cloned().unwrap_or_default(),
                        });
                    }
                    check_depth(state.node_depth(node.id), &paths, limit)?;
                    state.materialize(node.id)
                }
            };
            let previous = current.map(|slot| state.materialize_slot(slot));
            (paths, previous, new_value)
        };

        let mut chain = Chain::new();
        let change = Change::Value(new_value.clone());
        for p in &paths {
            chain.merge(Chain::build(previous.as_ref(), &change, p));
        }

        if let Some(interceptor) = &self.inner.interceptor {
            let target = self.node_handle(parent);
            let request = SetRequest {
                target: &target,
                key,
                value: &new_value,
                previous: previous.as_ref(),
                paths: &paths,
            };
            if !interceptor.set(&request) {
                self.report("set", &paths, WriteOutcome::Vetoed);
                return Ok(WriteOutcome::Vetoed);
            }
        }

        let created = {
            let mut state = self.inner.state.borrow_mut();
            if !state.arena.is_alive(parent) {
                return Err(TreeError::Detached);
            }
            // Take the reference first so detaching the old value cannot
            // release a node that is being re-linked from inside it.
            if let Some(id) = linked {
                match state.arena.get_mut(id) {
                    Some(data) => data.refs += 1,
                    None => return Err(TreeError::Detached),
                }
            }

            let old = state
                .arena
                .get_mut(parent)
                .and_then(|data| data.entries.remove(key));
            if let Some(Slot::Node(old_id)) = old {
                state.detach(old_id, &paths);
            }

            let slot = match (linked, &new_value) {
                (Some(id), _) => {
                    state.attach(id, &paths);
                    Slot::Node(id)
                }
                (None, Value::Object(map)) => {
                    let id = state.wrap(map, &paths);
                    if let Some(data) = state.arena.get_mut(id) {
                        data.refs += 1;
                    }
                    Slot::Node(id)
                }
                (None, leaf) => Slot::Leaf(leaf.clone()),
            };

            let mut created = HashMap::new();
            if let Slot::Node(id) = slot {
                state.collect_nodes(id, &paths, &mut created);
            }
            if let Some(data) = state.arena.get_mut(parent) {
                data.entries.insert(key.to_string(), slot);
            }
            created
        };

        self.report(if linked.is_some() { "link" } else { "set" }, &paths, WriteOutcome::Applied);
        self.deliver(chain, &created);
        Ok(WriteOutcome::Applied)
    }

    pub(super) fn remove(&self, parent: NodeId, key: &str) -> Result<WriteOutcome, TreeError> {
        path::validate_key(key)?;

        let (paths, previous) = {
            let state = self.inner.state.borrow();
            let data = state.arena.get(parent).ok_or(TreeError::Detached)?;
            let paths = compose(&state.registry.prefixes(parent), key);
            match data.entries.get(key) {
                Some(slot) => (paths, state.materialize_slot(slot)),
                None => return Ok(WriteOutcome::Unchanged),
            }
        };

        let mut chain = Chain::new();
        for p in &paths {
            chain.merge(Chain::build(Some(&previous), &Change::Removed, p));
        }

        if let Some(interceptor) = &self.inner.interceptor {
            let target = self.node_handle(parent);
            let request = DeleteRequest {
                target: &target,
                key,
                previous: &previous,
                paths: &paths,
            };
            if !interceptor.delete(&request) {
                self.report("delete", &paths, WriteOutcome::Vetoed);
                return Ok(WriteOutcome::Vetoed);
            }
        }

        {
            let mut state = self.inner.state.borrow_mut();
            let removed = state
                .arena
                .get_mut(parent)
                .ok_or(TreeError::Detached)?
                .entries
                .remove(key);
            match removed {
                Some(Slot::Node(id)) => state.detach(id, &paths),
                Some(Slot::Leaf(_)) => {}
                // the interceptor removed it already
                None => return Ok(WriteOutcome::Unchanged),
            }
        }

        self.report("delete", &paths, WriteOutcome::Applied);
        self.deliver(chain, &HashMap::new());
        Ok(WriteOutcome::Applied)
    }

    /// Hand each chain entry to its channel, deepest path first.
    ///
    /// Paths nobody observes are skipped without creating a channel.
    fn deliver(&self, chain: Chain, created: &HashMap<String, NodeId>) {
        for (p, change) in chain.into_delivery_order() {
            let Some(channel) = self.inner.hub.channel(&p) else {
                continue;
            };
            let signal = match change {
                Change::Removed => Signal::Removed,
                Change::Value(v) => match created.get(&p) {
                    Some(&id) if v.is_object() => Signal::Node(self.node_handle(id)),
                    _ => Signal::Value(v),
                },
            };
            tracing::trace!(path = %p, removed = signal.is_removed(), "notify");
            channel.emit(&signal);
        }
    }

    fn report(&self, op: &str, paths: &[String], outcome: WriteOutcome) {
        let joined = paths.join(", ");
        tracing::debug!(op, paths = %joined, ?outcome, "mutation");
        if self.inner.config.trace_mutations {
            self.inner
                .logger
                .log(Level::DEBUG, &format!("{} {} -> {:?}", op, joined, outcome));
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
