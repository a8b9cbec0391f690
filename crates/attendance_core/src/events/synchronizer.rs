//! Typed observer registry with two payload-free channels.
//!
//! # Invariants
//! - Channel names are fixed; no payload is delivered.
//! - Subscribers run in subscription order.

use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Invalidation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    AttendanceChanged,
    ApologyChanged,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Self::AttendanceChanged, Self::ApologyChanged];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttendanceChanged => "attendanceChanged",
            Self::ApologyChanged => "apologyChanged",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    UnknownSubscription(SubscriptionId),
}

impl Display for SubscriptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSubscription(id) => write!(f, "subscription not found: {}", id.0),
        }
    }
}

impl Error for SubscriptionError {}

type Callback = Box<dyn FnMut()>;

struct Subscriber {
    channel: Channel,
    callback: Callback,
}

/// Dispatches "go refetch" signals to subscribed views.
#[derive(Default)]
pub struct EventSynchronizer {
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_id: u64,
    published: BTreeMap<Channel, usize>,
}

impl EventSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, channel: Channel, callback: impl FnMut() + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.insert(
            id,
            Subscriber {
                channel,
                callback: Box::new(callback),
            },
        );
        debug!(
            "event=subscribe module=events status=ok channel={} subscription_id={}",
            channel, id.0
        );
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<(), SubscriptionError> {
        self.subscribers
            .remove(&id)
            .map(|_| ())
            .ok_or(SubscriptionError::UnknownSubscription(id))
    }

    /// Notifies every subscriber of `channel`.
    pub fn publish(&mut self, channel: Channel) {
        let mut delivered = 0usize;
        for subscriber in self.subscribers.values_mut() {
            if subscriber.channel == channel {
                (subscriber.callback)();
                delivered += 1;
            }
        }
        *self.published.entry(channel).or_insert(0) += 1;
        info!(
            "event=publish module=events status=ok channel={} subscribers={}",
            channel, delivered
        );
    }

    /// Number of publishes on `channel` since creation.
    pub fn published_count(&self, channel: Channel) -> usize {
        self.published.get(&channel).copied().unwrap_or(0)
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.subscribers
            .values()
            .filter(|subscriber| subscriber.channel == channel)
            .count()
    }
}
