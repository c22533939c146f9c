use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use iotcore_mqtt::{ConnAck, ConnectReturnCode, DisconnectReason, Error, Handler, Link, QoS};
use tokio::time::Instant;
use tracing_subscriber::fmt::MakeWriter;

/// What the broker does during one service pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Quiet,
    Connect,
    ConnectionLost,
    /// Acknowledges the last publish.
    Ack,
}

#[derive(Debug)]
pub struct Published {
    pub at: Instant,
    pub topic: String,
    pub qos: QoS,
    pub payload: Bytes,
}

/// A scripted [`Link`]. Every service pass plays the next [`Pass`] of the
/// script, quiet once the script runs out.
#[derive(Debug, Default)]
pub struct MockLink {
    pub script: VecDeque<Pass>,
    /// Errors returned by the publish attempt with the given number,
    /// counting from 1.
    pub publish_errors: HashMap<usize, Error>,
    pub published: Vec<Published>,
    pub attempts: usize,
    pub disconnects: usize,
    pub reopens: usize,
    pub closed: bool,
}

impl MockLink {
    pub fn new(script: impl IntoIterator<Item = Pass>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn fail_publish(mut self, attempt: usize, err: Error) -> Self {
        self.publish_errors.insert(attempt, err);
        self
    }
}

impl Link for MockLink {
    async fn service<H: Handler>(&mut self, handler: &mut H) -> iotcore_mqtt::Result<usize> {
        if self.closed {
            return Ok(0);
        }

        match self.script.pop_front().unwrap_or(Pass::Quiet) {
            Pass::Quiet => return Ok(0),
            Pass::Connect => {
                handler.on_connect(&ConnAck::new(ConnectReturnCode::Success, false));
            }
            Pass::ConnectionLost => {
                handler.on_disconnect(&DisconnectReason::Connection(Error::Closed));
            }
            Pass::Ack => handler.on_publish(self.attempts as u16),
        }
        Ok(1)
    }

    async fn publish(&mut self, topic: &str, qos: QoS, payload: Bytes) -> iotcore_mqtt::Result<()> {
        self.attempts += 1;
        if let Some(err) = self.publish_errors.remove(&self.attempts) {
            return Err(err);
        }
        if self.closed {
            return Err(Error::Closed);
        }

        self.published.push(Published {
            at: Instant::now(),
            topic: topic.to_owned(),
            qos,
            payload,
        });
        Ok(())
    }

    async fn disconnect<H: Handler>(&mut self, handler: &mut H) -> iotcore_mqtt::Result<()> {
        self.disconnects += 1;
        if !self.closed {
            self.closed = true;
            handler.on_disconnect(&DisconnectReason::Requested);
        }
        Ok(())
    }

    fn reopen(&mut self) -> iotcore_mqtt::Result<()> {
        self.reopens += 1;
        self.closed = false;
        Ok(())
    }
}

/// Collects formatted log lines.
#[derive(Debug, Clone, Default)]
pub struct Logs(Arc<Mutex<Vec<u8>>>);

impl Logs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Logs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
