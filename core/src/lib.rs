//! Treewatch core — an observable JSON state tree.
//!
//! Wraps a JSON object so every write, link, or delete at any depth is
//! delivered to subscribers of the affected dotted paths (`"a.b.c"`),
//! synchronously and deepest path first. Arrays are leaves.
//!
//! ```text
//! let tree = Observed::new(json!({"a": {"b": 1}}))?;
//! tree.observe("a.c").subscribe(|s| println!("{:?}", s.to_value()));
//! tree.set("a", json!({"b": 2, "c": 3}))?;   // a.b, a.c, then a
//! ```

pub mod config;
pub mod diag;
pub mod errors;
pub mod hooks;
pub mod notify;
pub mod path;
pub mod tree;

pub use config::TreeConfig;
pub use diag::{Logger, MemoryLogger, TracingLogger};
pub use errors::{ConfigError, TreeError};
pub use hooks::{DeleteRequest, Hooks, Interceptor, Options, SetRequest};
pub use notify::{Chain, Change, Channel, Signal, Subscription};
pub use path::TreePath;
pub use tree::arena::NodeId;
pub use tree::{Item, Node, Observed, Snapshot, WriteOutcome};
