use std::collections::{HashMap, HashSet};

use rumqttc::{QoS, SubscribeFilter};

/// Tracks the topics a session is subscribed to, so they can be restored
/// after the broker starts a fresh session on reconnect.
#[derive(Debug, Default)]
pub(super) struct SubscriptionManager {
    subscribed: HashMap<String, QoS>,
    /// Topics whose SUBSCRIBE was already queued for the current connection.
    queued: HashSet<String>,
}

impl SubscriptionManager {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Records the subscription and returns `true` if a SUBSCRIBE packet has
    /// to be queued for it.
    pub(super) fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        let changed = self.subscribed.insert(topic.to_owned(), qos) != Some(qos);
        let queued = !self.queued.insert(topic.to_owned());
        changed || !queued
    }

    pub(super) fn unsubscribe(&mut self, topic: &str) -> bool {
        self.queued.remove(topic);
        self.subscribed.remove(topic).is_some()
    }

    /// Forgets what was queued for the lost connection.
    pub(super) fn connection_lost(&mut self) {
        self.queued.clear();
    }

    /// Returns the filters that have to be subscribed again on a fresh
    /// broker session and marks them as queued.
    pub(super) fn restore(&mut self) -> Vec<SubscribeFilter> {
        let filters = self
            .subscribed
            .iter()
            .filter(|(topic, _)| !self.queued.contains(topic.as_str()))
            .map(|(topic, qos)| SubscribeFilter::new(topic.to_owned(), *qos))
            .collect::<Vec<_>>();

        self.queued
            .extend(filters.iter().map(|filter| filter.path.clone()));
        filters
    }

    pub(super) fn topics(&self) -> impl Iterator<Item = &str> {
        self.subscribed.keys().map(String::as_str)
    }
}
