//! Replay scripts: one mutation or snapshot per line.
//!
//! ```text
//! # comment
//! set a.b {"c": 1}
//! delete a.b.c
//! link z.alias a.b
//! snapshot a
//! snapshot
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use treewatch_core::{Observed, Signal, Subscription, WriteOutcome};


#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Set { path: String, value: Value },
    Delete { path: String },
    Link { path: String, from: String },
    Snapshot { path: Option<String> },
}


/// Parse a whole script. Errors carry the 1-based line number.
pub fn parse_script(text: &str) -> Result<Vec<Op>, String> {
    let mut ops = Vec::new();
    for (i, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some(op)) => ops.push(op),
            Ok(None) => {}
            Err(e) => return Err(format!("line {}: {}", i + 1, e)),
        }
    }
    Ok(ops)
}

/// Parse one line. Blank lines and `#` comments give `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Op>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = split_word(line);
    match word {
        "set" => parse_set(rest).map(Some),
        "delete" => parse_delete(rest).map(Some),
        "link" => parse_link(rest).map(Some),
        "snapshot" => Ok(Some(parse_snapshot(rest))),
        _ => Err(format!("Unknown operation: '{}'", word)),
    }
}


// ---------------------------------------------------------------------------
// Sub-parsers
// ---------------------------------------------------------------------------

/// `set <path> <json>`
fn parse_set(rest: &str) -> Result<Op, String> {
    let (path, json) = split_word(rest);
    if path.is_empty() || json.is_empty() {
        return Err("Usage: set <path> <json>".into());
    }
    let value = serde_json::from_str(json)
        .map_err(|e| format!("invalid JSON for '{}': {}", path, e))?;
    Ok(Op::Set {
        path: path.into(),
        value,
    })
}

/// `delete <path>`
fn parse_delete(rest: &str) -> Result<Op, String> {
    let (path, extra) = split_word(rest);
    if path.is_empty() || !extra.is_empty() {
        return Err("Usage: delete <path>".into());
    }
    Ok(Op::Delete { path: path.into() })
}

/// `link <path> <from-path>`
fn parse_link(rest: &str) -> Result<Op, String> {
    let (path, tail) = split_word(rest);
    let (from, extra) = split_word(tail);
    if path.is_empty() || from.is_empty() || !extra.is_empty() {
        return Err("Usage: link <path> <from-path>".into());
    }
    Ok(Op::Link {
        path: path.into(),
        from: from.into(),
    })
}

/// `snapshot [path]`
fn parse_snapshot(rest: &str) -> Op {
    let path = rest.trim();
    Op::Snapshot {
        path: if path.is_empty() { None } else { Some(path.into()) },
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}


// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Runs ops against a tree and collects printable output, including every
/// signal delivered to the watched paths.
pub struct Replay {
    tree: Observed,
    output: Rc<RefCell<Vec<String>>>,
    subscriptions: Vec<Subscription>,
}

impl Replay {
    pub fn new(tree: Observed, watches: &[String]) -> Self {
        let output = Rc::new(RefCell::new(Vec::new()));
        let subscriptions = watches
            .iter()
            .map(|path| {
                let sink = Rc::clone(&output);
                let name = path.clone();
                tree.observe(path).subscribe(move |signal: &Signal| {
                    sink.borrow_mut().push(format!("{} <- {}", name, render(signal)));
                })
            })
            .collect();
        Replay {
            tree,
            output,
            subscriptions,
        }
    }

    pub fn apply(&self, op: &Op) -> Result<(), String> {
        let line = match op {
            Op::Set { path, value } => {
                let outcome = self.tree.set(path, value.clone()).map_err(|e| e.to_string())?;
                format!("set {}: {}", path, label(outcome))
            }
            Op::Delete { path } => {
                let outcome = self.tree.delete(path).map_err(|e| e.to_string())?;
                format!("delete {}: {}", path, label(outcome))
            }
            Op::Link { path, from } => {
                let node = self
                    .tree
                    .node(from)
                    .ok_or_else(|| format!("nothing to link at '{}'", from))?;
                let outcome = self.tree.link(path, &node).map_err(|e| e.to_string())?;
                format!("link {} -> {}: {}", path, from, label(outcome))
            }
            Op::Snapshot { path: None } => {
                format!("snapshot: {}", self.tree.snapshot().to_value())
            }
            Op::Snapshot { path: Some(path) } => match self.tree.snapshot_at(path) {
                Some(snap) => format!("snapshot {}: {}", path, snap.to_value()),
                None => format!("snapshot {}: undefined", path),
            },
        };
        self.output.borrow_mut().push(line);
        Ok(())
    }

    /// Output produced since the last call.
    pub fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    /// Drop the watches and hand the tree back.
    pub fn finish(self) -> Observed {
        let cancelled = self.tree.unsubscribe_all(self.subscriptions);
        tracing::debug!(cancelled, "replay finished");
        self.tree
    }
}

fn render(signal: &Signal) -> String {
    match signal.to_value() {
        Some(v) => v.to_string(),
        None => "removed".into(),
    }
}

fn label(outcome: WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Applied => "applied",
        WriteOutcome::Unchanged => "unchanged",
        WriteOutcome::Vetoed => "vetoed",
    }
}
