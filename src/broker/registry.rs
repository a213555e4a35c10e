//! Subscription registry
//!
//! Keeps the topic ↔ connection relation as two mirrored indices:
//! `subscribers_of` (topic → connections) and `topics_of` (connection →
//! topics). `conn ∈ subscribers_of[t]` holds exactly when
//! `t ∈ topics_of[conn]`, and empty sets are pruned on both sides, so the
//! maps only ever hold live relations.
//!
//! Concurrency: one mutex guards both indices and every operation runs in a
//! single critical section, so no caller can observe the two sides out of
//! step. Frames are handed to per-connection channels while the lock is
//! held; those sends never block, and doing them inside the critical
//! section keeps a SUB acknowledgement ahead of any publish that sees the
//! new subscription.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::client::{Client, ConnectionId};
use crate::protocol::codec;
use crate::protocol::{MessageType, Topic};

#[derive(Debug, Default)]
struct Index {
    subscribers_of: HashMap<Topic, HashMap<ConnectionId, Client>>,
    topics_of: HashMap<ConnectionId, HashSet<Topic>>,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    index: Mutex<Index>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `client` to `topic` and acknowledge with a SUB frame.
    ///
    /// Idempotent: a repeated subscription keeps a single entry but is still
    /// acknowledged. Returns whether the relation is new.
    pub fn subscribe(&self, topic: Topic, client: &Client) -> bool {
        let created = {
            let mut index = self.lock();
            let created = index
                .subscribers_of
                .entry(topic)
                .or_default()
                .insert(client.id, client.clone())
                .is_none();
            index.topics_of.entry(client.id).or_default().insert(topic);
            acknowledge(client, MessageType::Sub, topic);
            created
        };

        debug!(client = %client.id, topic, created, "Subscribed");
        created
    }

    /// Remove `client` from `topic` if present and acknowledge with an UNSUB
    /// frame either way. Returns whether a relation was removed.
    pub fn unsubscribe(&self, topic: Topic, client: &Client) -> bool {
        let removed = {
            let mut index = self.lock();
            let removed = index.remove(topic, &client.id);
            acknowledge(client, MessageType::Unsub, topic);
            removed
        };

        debug!(client = %client.id, topic, removed, "Unsubscribed");
        removed
    }

    /// Drop every subscription held by `id`. Returns how many were removed.
    pub fn disconnect(&self, id: &ConnectionId) -> usize {
        let mut index = self.lock();
        let Some(topics) = index.topics_of.remove(id) else {
            return 0;
        };

        for topic in &topics {
            if let Some(subs) = index.subscribers_of.get_mut(topic) {
                subs.remove(id);
                if subs.is_empty() {
                    index.subscribers_of.remove(topic);
                }
            }
        }

        debug!(client = %id, topics = topics.len(), "Dropped subscriptions");
        topics.len()
    }

    /// Fan one PUB frame out to every subscriber of `topic`.
    ///
    /// Publishing to a topic nobody listens on is a silent no-op. A closed
    /// subscriber is skipped without affecting the others. Returns the
    /// number of subscribers the frame was handed to.
    pub fn publish(&self, topic: Topic, payload: &[u8]) -> usize {
        let frame = match codec::publish_frame(topic, payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(topic, error = %e, "Dropping unencodable publish");
                return 0;
            }
        };

        let index = self.lock();
        let Some(subs) = index.subscribers_of.get(&topic) else {
            trace!(topic, "No subscribers, publish dropped");
            return 0;
        };

        let mut delivered = 0;
        for client in subs.values() {
            match client.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(topic, error = %e, "Skipping subscriber"),
            }
        }
        delivered
    }

    /// Connections currently subscribed to `topic`.
    pub fn subscribers_of(&self, topic: Topic) -> Vec<ConnectionId> {
        self.lock()
            .subscribers_of
            .get(&topic)
            .map(|subs| subs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Topics `id` is subscribed to, in ascending order.
    pub fn topics_of(&self, id: &ConnectionId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .lock()
            .topics_of
            .get(id)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default();
        topics.sort_unstable();
        topics
    }

    pub fn is_subscribed(&self, topic: Topic, id: &ConnectionId) -> bool {
        self.lock()
            .topics_of
            .get(id)
            .is_some_and(|topics| topics.contains(&topic))
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.lock().subscribers_of.len()
    }

    /// Number of connections with at least one subscription.
    pub fn connection_count(&self) -> usize {
        self.lock().topics_of.len()
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Panics if the two indices disagree or hold empty sets.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let index = self.lock();
        for (topic, subs) in &index.subscribers_of {
            assert!(!subs.is_empty(), "empty subscriber set for topic {topic}");
            for id in subs.keys() {
                assert!(
                    index.topics_of.get(id).is_some_and(|t| t.contains(topic)),
                    "{id} missing topic {topic}"
                );
            }
        }
        for (id, topics) in &index.topics_of {
            assert!(!topics.is_empty(), "empty topic set for {id}");
            for topic in topics {
                assert!(
                    index
                        .subscribers_of
                        .get(topic)
                        .is_some_and(|s| s.contains_key(id)),
                    "topic {topic} missing {id}"
                );
            }
        }
    }
}

impl Index {
    fn remove(&mut self, topic: Topic, id: &ConnectionId) -> bool {
        let mut removed = false;

        if let Some(subs) = self.subscribers_of.get_mut(&topic) {
            removed = subs.remove(id).is_some();
            if subs.is_empty() {
                self.subscribers_of.remove(&topic);
            }
        }

        if let Some(topics) = self.topics_of.get_mut(id) {
            topics.remove(&topic);
            if topics.is_empty() {
                self.topics_of.remove(id);
            }
        }

        removed
    }
}

fn acknowledge(client: &Client, kind: MessageType, topic: Topic) {
    if let Err(e) = client.send(codec::ack_frame(kind, topic)) {
        debug!(%kind, topic, error = %e, "Acknowledgement not delivered");
    }
}
