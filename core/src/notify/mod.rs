//! Change notification — chain computation and per-path delivery.
//!
//! ```text
//! mutation at path P
//!     → chain.rs (every affected path under P, plus P itself)
//!     → hub.rs   (channel lookup per path, deepest first)
//!     → subscriber callbacks, synchronously, before the write returns
//! ```

pub mod chain;
pub mod hub;

use serde_json::Value;

use crate::tree::Node;

pub use chain::{Change, Chain};
pub use hub::{Channel, Hub, Subscription};


/// What a subscriber receives for one path.
#[derive(Debug, Clone)]
pub enum Signal {
    /// A leaf value (null, bool, number, string, array).
    Value(Value),
    /// A newly wrapped composite, live in the tree.
    Node(Node),
    /// The path no longer exists.
    Removed,
}

impl Signal {
    pub fn is_removed(&self) -> bool {
        matches!(self, Signal::Removed)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Signal::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Materialize as JSON. `None` for [`Signal::Removed`] and for a node
    /// that has since been detached.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Signal::Value(v) => Some(v.clone()),
            Signal::Node(n) => n.to_value().ok(),
            Signal::Removed => None,
        }
    }
}
