//! Dotted path parsing and path algebra.
//!
//! Paths like `settings.theme.accent` address a node or leaf by the
//! sequence of object keys leading to it from the root. Array indices never
//! appear in a path; arrays are leaves.

use std::fmt;

use crate::errors::TreeError;


/// A parsed dotted path: one or more non-empty keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// Parse a dotted string like `a.b.c`.
    ///
    /// Empty input and empty segments (`a..b`, `.a`, `a.`) are rejected.
    pub fn parse(input: &str) -> Result<Self, TreeError> {
        if input.is_empty() {
            return Err(TreeError::InvalidPath(input.to_string()));
        }
        let segments: Vec<String> = input.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TreeError::InvalidPath(input.to_string()));
        }
        Ok(TreePath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of keys in the path.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Split into the keys leading to the parent and the final key.
    pub fn split_last(&self) -> (&[String], &str) {
        match self.segments.split_last() {
            Some((last, parent)) => (parent, last.as_str()),
            // parse() never yields an empty path
            None => (&[], ""),
        }
    }

    /// Format back to a dotted string.
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}


/// Compose a child path from a reachable prefix and a key.
///
/// An empty prefix means the key sits directly on the root.
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        let mut out = String::with_capacity(prefix.len() + 1 + key.len());
        out.push_str(prefix);
        out.push('.');
        out.push_str(key);
        out
    }
}

/// Number of keys in a dotted path string.
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('.').count()
    }
}

/// True if `path` equals `ancestor` or lies underneath it.
///
/// `a.bc` is not within `a.b`; the match is on whole segments.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// Check that a key can be addressed by a dotted path.
pub fn validate_key(key: &str) -> Result<(), TreeError> {
    if key.is_empty() || key.contains('.') {
        return Err(TreeError::InvalidKey(key.to_string()));
    }
    Ok(())
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
