//! Caller-supplied write/delete interception and tree construction options.
//!
//! An [`Interceptor`] sees every write and delete before it is applied and
//! may veto it by returning `false`. It cannot change what gets stored; a
//! veto simply leaves the tree untouched and sends no notifications.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::config::TreeConfig;
use crate::diag::{Logger, TracingLogger};
use crate::tree::Node;


/// A pending write of `value` to `target[key]`.
pub struct SetRequest<'a> {
    /// The node receiving the write.
    pub target: &'a Node,
    pub key: &'a str,
    /// The incoming value, materialized as JSON.
    pub value: &'a Value,
    /// What `target[key]` held before, if anything.
    pub previous: Option<&'a Value>,
    /// Every full path the write lands on.
    pub paths: &'a [String],
}

/// A pending removal of `target[key]`.
pub struct DeleteRequest<'a> {
    pub target: &'a Node,
    pub key: &'a str,
    pub previous: &'a Value,
    pub paths: &'a [String],
}


/// Veto-only hooks consulted before a write or delete is applied.
///
/// Both methods default to allowing the operation. Hooks run with no
/// internal borrow held, so they may read the tree through `target`.
pub trait Interceptor {
    fn set(&self, request: &SetRequest<'_>) -> bool {
        let _ = request;
        true
    }

    fn delete(&self, request: &DeleteRequest<'_>) -> bool {
        let _ = request;
        true
    }
}


type SetFn = Box<dyn Fn(&SetRequest<'_>) -> bool>;
type DeleteFn = Box<dyn Fn(&DeleteRequest<'_>) -> bool>;

/// An [`Interceptor`] assembled from closures.
#[derive(Default)]
pub struct Hooks {
    on_set: Option<SetFn>,
    on_delete: Option<DeleteFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_set<F>(mut self, f: F) -> Self
    where
        F: Fn(&SetRequest<'_>) -> bool + 'static,
    {
        self.on_set = Some(Box::new(f));
        self
    }

    pub fn on_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&DeleteRequest<'_>) -> bool + 'static,
    {
        self.on_delete = Some(Box::new(f));
        self
    }
}

impl Interceptor for Hooks {
    fn set(&self, request: &SetRequest<'_>) -> bool {
        self.on_set.as_ref().map_or(true, |f| f(request))
    }

    fn delete(&self, request: &DeleteRequest<'_>) -> bool {
        self.on_delete.as_ref().map_or(true, |f| f(request))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_set", &self.on_set.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}


/// Construction options for [`Observed`](crate::Observed).
pub struct Options {
    pub(crate) interceptor: Option<Box<dyn Interceptor>>,
    pub(crate) logger: Rc<dyn Logger>,
    pub(crate) config: TreeConfig,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            interceptor: None,
            logger: Rc::new(TracingLogger),
            config: TreeConfig::default(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: Interceptor + 'static,
    {
        self.interceptor = Some(Box::new(interceptor));
        self
    }

    pub fn with_logger(mut self, logger: Rc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("interceptor", &self.interceptor.is_some())
            .field("config", &self.config)
            .finish()
    }
}
