use rumqttc::{ConnAck, Event, Publish, SubAck};
use tracing::{debug, info, trace, warn};

use crate::Error;

/// Why a session lost its connection.
#[derive(Debug, Clone)]
pub enum DisconnectReason {
    /// The session was disconnected locally.
    Requested,
    /// The broker sent a DISCONNECT packet.
    Broker,
    /// The connection failed or was refused.
    Connection(Error),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "disconnect requested"),
            Self::Broker => write!(f, "disconnected by the broker"),
            Self::Connection(err) => write!(f, "connection error: {err}"),
        }
    }
}

/// Named handlers invoked while a session services its events.
///
/// Handlers run synchronously on the thread that calls
/// [`Session::service`](crate::Session::service), in the order the events
/// were received. Every handler defaults to logging the event.
pub trait Handler {
    fn on_connect(&mut self, ack: &ConnAck) {
        info!(session_present = ack.session_present, "connected");
    }

    fn on_disconnect(&mut self, reason: &DisconnectReason) {
        warn!(reason = %reason, "disconnected");
    }

    /// Called when the broker acknowledges a QoS 1 publish.
    fn on_publish(&mut self, pkid: u16) {
        debug!(pkid, "publish acknowledged");
    }

    fn on_subscribe(&mut self, ack: &SubAck) {
        debug!(pkid = ack.pkid, codes = ?ack.return_codes, "subscription acknowledged");
    }

    fn on_message(&mut self, message: &Publish) {
        info!(
            topic = %message.topic,
            qos = ?message.qos,
            payload = %String::from_utf8_lossy(&message.payload),
            "received message"
        );
    }

    /// Called for every event, before the dedicated handler.
    fn on_log(&mut self, event: &Event) {
        trace!(event = ?event, "mqtt event");
    }
}

/// A [`Handler`] that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl Handler for LogHandler {}
