use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Tree errors
// ---------------------------------------------------------------------------

/// Structural misuse of an observed tree.
///
/// A write refused by an interceptor hook is not an error; it comes back as
/// [`WriteOutcome::Vetoed`](crate::WriteOutcome::Vetoed).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The path string was empty or had an empty segment (`"a..b"`).
    #[error("invalid path '{0}'")]
    InvalidPath(String),

    /// A key that cannot appear in a dotted path.
    #[error("invalid key '{0}': keys must be non-empty and contain no '.'")]
    InvalidKey(String),

    /// A segment on the way to the target does not exist.
    #[error("cannot resolve '{path}': segment '{segment}' not found")]
    Unresolved { path: String, segment: String },

    /// A segment on the way to the target holds a leaf, not a composite.
    #[error("cannot resolve '{path}': segment '{segment}' is not a composite")]
    NotComposite { path: String, segment: String },

    /// The node handle refers to a node that has been detached and released.
    #[error("node handle is detached from the tree")]
    Detached,

    /// The node handle belongs to a different tree.
    #[error("node handle belongs to another tree")]
    ForeignNode,

    /// Linking would place a node beneath itself.
    #[error("linking at '{path}' would create a cycle")]
    Cycle { path: String },

    /// Nesting exceeds the configured depth limit.
    #[error("value at '{path}' nests deeper than {limit} levels")]
    TooDeep { path: String, limit: usize },

    /// The initial value handed to the tree is not a JSON object.
    #[error("root value must be a JSON object, got {0}")]
    RootNotComposite(&'static str),
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_names_segment() {
        let err = TreeError::Unresolved {
            path: "a.b.c".into(),
            segment: "b".into(),
        };
        assert_eq!(err.to_string(), "cannot resolve 'a.b.c': segment 'b' not found");
    }

    #[test]
    fn io_error_names_file() {
        let err = ConfigError::Io {
            path: PathBuf::from("/nope/tree.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/tree.yaml"));
    }
}
