//! Per-path multicast channels.
//!
//! One channel per observed path, created on first `observe`. A channel
//! outlives every subscription made on it; cancelling subscriptions never
//! tears the channel down, so later observers and later mutations still
//! meet the same channel.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Signal;


type Callback = Rc<dyn Fn(&Signal)>;

struct ChannelInner {
    path: String,
    subscribers: RefCell<Vec<(u64, Callback)>>,
    next_id: Cell<u64>,
}


/// A shared multicast stream of [`Signal`]s for one path.
///
/// Cloning yields another handle on the same channel.
#[derive(Clone)]
pub struct Channel {
    inner: Rc<ChannelInner>,
}

impl Channel {
    fn new(path: &str) -> Self {
        Channel {
            inner: Rc::new(ChannelInner {
                path: path.to_string(),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// The dotted path this channel carries changes for.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Register a callback for every future signal on this path.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Signal) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        Subscription {
            channel: self.clone(),
            id,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// True if both handles point at the same underlying channel.
    pub fn same_channel(&self, other: &Channel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Hand `signal` to every current subscriber, in subscription order.
    ///
    /// The subscriber list is copied first, so callbacks are free to
    /// subscribe, unsubscribe, or mutate the tree while being called.
    pub(crate) fn emit(&self, signal: &Signal) {
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(signal);
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut subs = self.inner.subscribers.borrow_mut();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.inner.subscribers.borrow().iter().any(|(sid, _)| *sid == id)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("path", &self.inner.path)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}


/// Handle for one callback registered on a [`Channel`].
///
/// Dropping the handle does not cancel the subscription; call
/// [`Subscription::unsubscribe`] or [`Hub::unsubscribe_all`].
#[derive(Debug)]
pub struct Subscription {
    channel: Channel,
    id: u64,
}

impl Subscription {
    /// Cancel this subscription. Returns false if it was already cancelled.
    pub fn unsubscribe(&self) -> bool {
        self.channel.remove(self.id)
    }

    pub fn is_active(&self) -> bool {
        self.channel.contains(self.id)
    }

    pub fn path(&self) -> &str {
        self.channel.path()
    }
}


/// Table of channels keyed by dotted path.
#[derive(Default)]
pub struct Hub {
    channels: RefCell<HashMap<String, Channel>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel for `path`, created on first use.
    pub fn observe(&self, path: &str) -> Channel {
        self.channels
            .borrow_mut()
            .entry(path.to_string())
            .or_insert_with(|| {
                tracing::trace!(path, "channel created");
                Channel::new(path)
            })
            .clone()
    }

    /// The channel for `path` if anyone has observed it. Never creates one.
    pub fn channel(&self, path: &str) -> Option<Channel> {
        self.channels.borrow().get(path).cloned()
    }

    /// Deliver to the channel for `path`, if one exists.
    ///
    /// Returns true if a channel was found.
    pub fn deliver(&self, path: &str, signal: &Signal) -> bool {
        match self.channel(path) {
            Some(channel) => {
                tracing::trace!(path, subscribers = channel.subscriber_count(), "delivering");
                channel.emit(signal);
                true
            }
            None => false,
        }
    }

    /// Cancel a batch of subscriptions. Channels stay registered.
    ///
    /// Returns how many were still active.
    pub fn unsubscribe_all<I>(&self, handles: I) -> usize
    where
        I: IntoIterator<Item = Subscription>,
    {
        handles.into_iter().filter(|h| h.unsubscribe()).count()
    }

    /// Number of channels created so far.
    pub fn len(&self) -> usize {
        self.channels.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.borrow().is_empty()
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub").field("channels", &self.len()).finish()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Rc<RefCell<Vec<Signal>>>, impl Fn(&Signal) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |s: &Signal| sink.borrow_mut().push(s.clone()))
    }

    #[test]
    fn observe_creates_lazily() {
        let hub = Hub::new();
        assert!(hub.channel("a.b").is_none());
        let _ = hub.observe("a.b");
        assert!(hub.channel("a.b").is_some());
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn repeated_observe_shares_channel() {
        let hub = Hub::new();
        let first = hub.observe("x");
        let second = hub.observe("x");
        assert!(first.same_channel(&second));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn every_subscriber_receives_every_signal() {
        let hub = Hub::new();
        let (seen_a, cb_a) = recorder();
        let (seen_b, cb_b) = recorder();
        hub.observe("x").subscribe(cb_a);
        hub.observe("x").subscribe(cb_b);

        hub.deliver("x", &Signal::Value(json!(1)));
        hub.deliver("x", &Signal::Removed);

        assert_eq!(seen_a.borrow().len(), 2);
        assert_eq!(seen_b.borrow().len(), 2);
        assert!(seen_b.borrow()[1].is_removed());
    }

    #[test]
    fn deliver_without_channel_is_noop() {
        let hub = Hub::new();
        assert!(!hub.deliver("nobody", &Signal::Removed));
        assert!(hub.is_empty());
    }

    #[test]
    fn unsubscribe_all_keeps_channel() {
        let hub = Hub::new();
        let (seen, cb) = recorder();
        let h1 = hub.observe("x").subscribe(cb);
        let h2 = hub.observe("x").subscribe(|_| {});

        assert_eq!(hub.unsubscribe_all(vec![h1, h2]), 2);
        hub.deliver("x", &Signal::Value(json!(1)));
        assert!(seen.borrow().is_empty());

        let (later, cb) = recorder();
        hub.observe("x").subscribe(cb);
        assert!(hub.deliver("x", &Signal::Value(json!(2))));
        assert_eq!(later.borrow().len(), 1);
    }

    #[test]
    fn unsubscribe_twice_reports_false() {
        let hub = Hub::new();
        let handle = hub.observe("x").subscribe(|_| {});
        assert!(handle.is_active());
        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        assert!(!handle.is_active());
        assert_eq!(handle.path(), "x");
    }

    #[test]
    fn callback_may_subscribe_during_delivery() {
        let hub = Rc::new(Hub::new());
        let inner_hub = Rc::clone(&hub);
        hub.observe("x").subscribe(move |_| {
            inner_hub.observe("x").subscribe(|_| {});
        });
        hub.deliver("x", &Signal::Removed);
        assert_eq!(hub.observe("x").subscriber_count(), 2);
    }
}
