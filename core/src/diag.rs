//! Injectable diagnostics sink.
//!
//! The tree reports conditions a caller may want to see (a snapshot path
//! that failed to resolve, per-mutation summaries when enabled) through a
//! [`Logger`] handed in with [`Options`](crate::Options). The default,
//! [`TracingLogger`], forwards to `tracing`; which subscriber receives the
//! events is up to the embedding program.

use std::cell::RefCell;

use tracing::Level;


pub trait Logger {
    fn log(&self, level: Level, message: &str);
}


/// Forwards every message to the `tracing` macros under the `treewatch` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "treewatch", "{}", message),
            Level::WARN => tracing::warn!(target: "treewatch", "{}", message),
            Level::INFO => tracing::info!(target: "treewatch", "{}", message),
            Level::DEBUG => tracing::debug!(target: "treewatch", "{}", message),
            Level::TRACE => tracing::trace!(target: "treewatch", "{}", message),
        }
    }
}


/// Keeps every message in memory. Handy for tests and for surfacing
/// diagnostics in a UI.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: RefCell<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.borrow().clone()
    }

    /// Messages only, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.records.borrow().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        self.records.borrow_mut().push((level, message.to_string()));
    }
}
