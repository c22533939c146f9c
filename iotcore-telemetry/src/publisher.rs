use std::time::Duration;

use iotcore_mqtt::{ConnAck, DisconnectReason, Handler, Link, Publish, QoS};
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, BackoffStep};
use crate::sample::{SampleGenerator, Schema};
use crate::Error;

/// What happens to the session after a publish failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The session stays torn down; later publishes keep failing until the
    /// backoff gives up.
    #[default]
    StayDisconnected,
    /// The session is re-opened and the next pass reconnects with a fresh
    /// token.
    Reconnect,
}

#[derive(Debug, Clone)]
pub struct PublisherOptions {
    /// Topic the samples are published to.
    pub topic: String,
    /// Number of iterations, `None` runs until the backoff gives up.
    pub messages: Option<u32>,
    pub interval: Duration,
    pub schema: Schema,
    pub on_failure: FailurePolicy,
}

impl PublisherOptions {
    pub fn new(topic: impl Into<String>, schema: Schema) -> Self {
        Self {
            topic: topic.into(),
            messages: None,
            interval: schema.publish_interval(),
            schema,
            on_failure: FailurePolicy::default(),
        }
    }
}

/// Result of a single publish step.
#[derive(Debug)]
pub enum PublishOutcome {
    Published,
    /// The sample couldn't be serialized or the session couldn't take it;
    /// the session is torn down and the loop carries on.
    Retryable(Error),
    /// The session rejected the request itself. The session is torn down
    /// and the loop stops.
    Fatal(Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every requested iteration ran.
    #[default]
    Completed,
    /// The reconnect delay grew past its ceiling.
    GaveUp,
    Aborted(String),
}

/// Summary of a publisher run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub iterations: u32,
    pub published: u32,
    /// Publishes the broker acknowledged.
    pub acknowledged: u32,
    /// Configuration messages pushed by the broker.
    pub received: u32,
    pub failures: u32,
    pub outcome: RunOutcome,
}

/// Connection events of the session, feeding the backoff.
#[derive(Debug, Default)]
struct Events {
    backoff: Backoff,
    acknowledged: u32,
    received: u32,
}

impl Handler for Events {
    fn on_connect(&mut self, ack: &ConnAck) {
        info!(code = ?ack.code, session_present = ack.session_present, "connected");
        self.backoff.on_connected();
    }

    fn on_disconnect(&mut self, reason: &DisconnectReason) {
        warn!(%reason, "disconnected");
        self.backoff.on_disconnected();
    }

    fn on_publish(&mut self, pkid: u16) {
        debug!(pkid, "publish acknowledged");
        self.acknowledged += 1;
    }

    fn on_message(&mut self, message: &Publish) {
        info!(
            topic = %message.topic,
            payload = %String::from_utf8_lossy(&message.payload),
            "received configuration"
        );
        self.received += 1;
    }
}

/// Publishes telemetry over a [`Link`] on a fixed cadence, backing off while
/// the connection is lost.
#[derive(Debug)]
pub struct Publisher<R> {
    options: PublisherOptions,
    generator: SampleGenerator,
    events: Events,
    rng: R,
}

impl<R: Rng> Publisher<R> {
    pub fn new(options: PublisherOptions, rng: R) -> Self {
        Self {
            generator: SampleGenerator::new(options.schema),
            options,
            events: Events::default(),
            rng,
        }
    }

    pub const fn options(&self) -> &PublisherOptions {
        &self.options
    }

    pub const fn backoff(&self) -> &Backoff {
        &self.events.backoff
    }

    /// Runs the loop until every iteration ran, the backoff gave up or a
    /// fatal error occurred. Errors never leave the loop, they end up in
    /// the report.
    pub async fn run<L: Link>(&mut self, link: &mut L) -> RunReport {
        let mut report = RunReport::default();

        while self
            .options
            .messages
            .map_or(true, |limit| report.iterations < limit)
        {
            report.iterations += 1;

            if let Err(err) = link.service(&mut self.events).await {
                error!(error = %err, "couldn't service the session");
                report.outcome = RunOutcome::Aborted(err.to_string());
                break;
            }

            match self.events.backoff.step(&mut self.rng) {
                BackoffStep::Proceed => {}
                BackoffStep::Wait(delay) => {
                    info!("waiting for {:.3}s before reconnecting", delay.as_secs_f64());
                    sleep(delay).await;
                }
                BackoffStep::GiveUp => {
                    warn!("exceeded maximum backoff time, giving up");
                    report.outcome = RunOutcome::GaveUp;
                    break;
                }
            }

            match self.publish(link, report.iterations).await {
                PublishOutcome::Published => {
                    report.published += 1;
                    sleep(self.options.interval).await;
                }
                PublishOutcome::Retryable(err) => {
                    report.failures += 1;
                    error!(error = %err, "publish failed, tearing the session down");
                    self.tear_down(link).await;
                    if self.options.on_failure == FailurePolicy::Reconnect {
                        self.reopen(link);
                    }
                }
                PublishOutcome::Fatal(err) => {
                    report.failures += 1;
                    error!(error = %err, "publish failed, stopping");
                    self.tear_down(link).await;
                    report.outcome = RunOutcome::Aborted(err.to_string());
                    break;
                }
            }
        }

        report.acknowledged = self.events.acknowledged;
        report.received = self.events.received;
        report
    }

    /// Disconnects the link for good.
    pub async fn shutdown<L: Link>(&mut self, link: &mut L) {
        self.tear_down(link).await;
    }

    async fn publish<L: Link>(&mut self, link: &mut L, iteration: u32) -> PublishOutcome {
        let sample = self.generator.generate(&mut self.rng);
        let payload = match sample.payload(self.options.schema) {
            Ok(payload) => payload,
            Err(err) => return PublishOutcome::Retryable(err.into()),
        };

        match self.options.messages {
            Some(total) => info!(
                payload = %String::from_utf8_lossy(&payload),
                "publishing message {iteration}/{total}"
            ),
            None => info!(
                payload = %String::from_utf8_lossy(&payload),
                "publishing message {iteration}"
            ),
        }

        match link
            .publish(&self.options.topic, QoS::AtLeastOnce, payload)
            .await
        {
            Ok(()) => PublishOutcome::Published,
            Err(err) if err.is_transient() => PublishOutcome::Retryable(err.into()),
            Err(err) => PublishOutcome::Fatal(err.into()),
        }
    }

    async fn tear_down<L: Link>(&mut self, link: &mut L) {
        if let Err(err) = link.disconnect(&mut self.events).await {
            warn!(error = %err, "couldn't disconnect cleanly");
        }
    }

    fn reopen<L: Link>(&mut self, link: &mut L) {
        match link.reopen() {
            Ok(()) => debug!("session re-opened, reconnecting on the next pass"),
            Err(err) => warn!(error = %err, "couldn't re-open the session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use iotcore_mqtt::ConnectReturnCode;

    use super::*;

    #[test]
    fn events_drive_the_backoff() {
        let mut events = Events::default();
        events.on_disconnect(&DisconnectReason::Broker);
        assert!(matches!(
            events.backoff.state(),
            crate::BackoffState::BackingOff
        ));

        events.on_connect(&ConnAck::new(ConnectReturnCode::Success, false));
        assert!(matches!(
            events.backoff.state(),
            crate::BackoffState::Connected
        ));
    }

    #[test]
    fn options_follow_the_schema() {
        let options = PublisherOptions::new("/devices/device/events", Schema::V1_1);

        assert_eq!(options.interval, Duration::from_secs(3));
        assert_eq!(options.messages, None);
        assert_eq!(options.on_failure, FailurePolicy::StayDisconnected);
    }
}
