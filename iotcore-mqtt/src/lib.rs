use std::time::Duration;

pub use credentials::{Credentials, StaticCredentials};
pub use error::{CredentialError, Error};
pub use handler::{DisconnectReason, Handler, LogHandler};
use manager::SubscriptionManager;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, Outgoing, Packet, Transport};
pub use rumqttc::{ConnAck, ConnectReturnCode, Event, Publish, QoS, SubAck};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

pub type Result<T> = core::result::Result<T, Error>;

mod credentials;
mod error;
mod handler;
mod manager;

/// The seam between a publishing loop and the session it drives.
///
/// Every call is made from the same task; nothing here is meant to run
/// concurrently with anything else on the same session.
#[allow(async_fn_in_trait)]
pub trait Link {
    /// Runs one explicit pass of event processing, dispatching the received
    /// events to `handler`. Returns the number of handled events.
    async fn service<H: Handler>(&mut self, handler: &mut H) -> Result<usize>;

    /// Queues a message for publication without waiting for the broker.
    async fn publish(&mut self, topic: &str, qos: QoS, payload: bytes::Bytes) -> Result<()>;

    /// Tears the session down. A closed link doesn't process events until
    /// it's reopened.
    async fn disconnect<H: Handler>(&mut self, handler: &mut H) -> Result<()>;

    /// Re-opens a closed link; the next service pass reconnects.
    fn reopen(&mut self) -> Result<()>;
}

pub struct SessionBuilder<'a> {
    client_id: Option<&'a str>,
    endpoint: Option<&'a str>,
    port: u16,
    certificate_authority: Option<&'a [u8]>,
    credentials: Option<Box<dyn Credentials>>,
    keep_alive: Duration,
    capacity: usize,
    service_window: Duration,
}

impl<'a> Default for SessionBuilder<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> SessionBuilder<'a> {
    pub fn new() -> Self {
        Self {
            client_id: None,
            endpoint: None,
            port: 8883,
            certificate_authority: None,
            credentials: None,
            keep_alive: Duration::from_secs(60),
            capacity: 10,
            service_window: Duration::from_millis(100),
        }
    }

    /// Sets the client identifier presented to the broker.
    pub const fn client_id(mut self, id: &'a str) -> Self {
        self.client_id = Some(id);
        self
    }

    /// Sets the MQTT endpoint to connect to.
    pub const fn endpoint(mut self, endpoint: &'a str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the MQTT port to connect to.
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the certificate authority to trust. Without it the session
    /// connects over plain TCP.
    pub const fn ca(mut self, ca: &'a [u8]) -> Self {
        self.certificate_authority = Some(ca);
        self
    }

    /// Sets the source of the session's username and password.
    pub fn credentials(mut self, credentials: impl Credentials + 'static) -> Self {
        self.credentials = Some(Box::new(credentials));
        self
    }

    pub const fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets how many requests can be queued before the broker is reached.
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets how long a service pass waits for further events once the
    /// session is connected.
    pub const fn service_window(mut self, window: Duration) -> Self {
        self.service_window = window;
        self
    }

    /// Builds a session with the configured options. Nothing is sent to
    /// the broker until the session is serviced.
    pub fn build(self) -> Result<Session> {
        let credentials = self.credentials.ok_or(Error::Credentials)?;
        let mut options = MqttOptions::new(
            self.client_id.ok_or(Error::ClientId)?,
            self.endpoint.ok_or(Error::Endpoint)?,
            self.port,
        );
        options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true)
            .set_credentials(credentials.username(), credentials.password()?);

        if let Some(ca) = self.certificate_authority {
            options.set_transport(Transport::tls(ca.to_vec(), None, None));
        }

        let (client, event_loop) = AsyncClient::new(options, self.capacity);

        Ok(Session {
            client,
            event_loop,
            credentials,
            subscriptions: SubscriptionManager::new(),
            service_window: self.service_window,
            connected: false,
            stale_credentials: false,
            closed: false,
        })
    }
}

/// An MQTT session whose event processing is driven explicitly by its
/// owner, see [`Session::service`].
pub struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
    credentials: Box<dyn Credentials>,
    subscriptions: SubscriptionManager,
    service_window: Duration,
    connected: bool,
    stale_credentials: bool,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id())
            .field("connected", &self.connected)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn client_id(&self) -> String {
        self.event_loop.mqtt_options.client_id()
    }

    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Subscribes to the topic. The subscription is restored whenever the
    /// broker starts a fresh session.
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<()> {
        if self.subscriptions.subscribe(topic, qos) {
            self.client.try_subscribe(topic, qos)?;
        }
        Ok(())
    }

    pub fn unsubscribe(&mut self, topic: &str) -> Result<()> {
        if self.subscriptions.unsubscribe(topic) {
            self.client.try_unsubscribe(topic)?;
        }
        Ok(())
    }

    /// Returns the topics the session is subscribed to.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.topics()
    }

    /// Runs one pass of event processing.
    ///
    /// While disconnected, the first poll establishes the connection and is
    /// bounded only by the transport's connection timeout. Once connected,
    /// events are handled until none arrives within the service window. A
    /// connection error ends the pass right away and is reported through
    /// [`Handler::on_disconnect`].
    pub async fn service<H: Handler>(&mut self, handler: &mut H) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }

        if self.stale_credentials {
            self.refresh_credentials()?;
        }

        let mut handled = 0;
        if !self.connected {
            handled += 1;
            match self.event_loop.poll().await {
                Ok(event) => self.dispatch(event, handler),
                Err(err) => {
                    self.connection_lost(err, handler);
                    return Ok(handled);
                }
            }
        }

        let deadline = Instant::now() + self.service_window;
        loop {
            match timeout_at(deadline, self.event_loop.poll()).await {
                Err(_elapsed) => return Ok(handled),
                Ok(Ok(event)) => {
                    handled += 1;
                    self.dispatch(event, handler);
                }
                Ok(Err(err)) => {
                    self.connection_lost(err, handler);
                    return Ok(handled + 1);
                }
            }
        }
    }

    /// Queues a message for publication.
    pub fn publish(&mut self, topic: &str, qos: QoS, payload: bytes::Bytes) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.client
            .try_publish(topic, qos, false, payload.to_vec())
            .map_err(Error::from)
    }

    /// Sends DISCONNECT, flushes it within the service window and closes
    /// the session.
    pub async fn disconnect<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if self.connected {
            self.client.try_disconnect()?;
            let deadline = Instant::now() + self.service_window;
            loop {
                match timeout_at(deadline, self.event_loop.poll()).await {
                    Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => break,
                    Ok(Ok(event)) => self.dispatch(event, handler),
                    Ok(Err(err)) => {
                        debug!(error = %err, "connection closed while disconnecting");
                        break;
                    }
                    Err(_elapsed) => {
                        warn!("disconnect wasn't flushed in time");
                        break;
                    }
                }
            }
        }

        self.event_loop.clean();
        self.connected = false;
        self.stale_credentials = true;
        self.closed = true;
        self.subscriptions.connection_lost();
        handler.on_disconnect(&DisconnectReason::Requested);
        Ok(())
    }

    /// Re-opens a closed session.
    pub fn reopen(&mut self) {
        self.closed = false;
    }

    fn refresh_credentials(&mut self) -> Result<()> {
        let password = self.credentials.password()?;
        let username = self.credentials.username().to_owned();
        self.event_loop
            .mqtt_options
            .set_credentials(username, password);
        self.stale_credentials = false;
        debug!("issued fresh credentials for the next connection");
        Ok(())
    }

    fn connection_lost<H: Handler>(&mut self, err: rumqttc::ConnectionError, handler: &mut H) {
        self.connected = false;
        self.stale_credentials = true;
        self.subscriptions.connection_lost();
        handler.on_disconnect(&DisconnectReason::Connection(err.into()));
    }

    fn dispatch<H: Handler>(&mut self, event: Event, handler: &mut H) {
        handler.on_log(&event);

        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                self.connected = true;
                if !ack.session_present {
                    let filters = self.subscriptions.restore();
                    if !filters.is_empty() {
                        if let Err(err) = self.client.try_subscribe_many(filters) {
                            warn!(error = %err, "couldn't restore subscriptions");
                        }
                    }
                }
                handler.on_connect(&ack);
            }
            Event::Incoming(Packet::PubAck(ack)) => handler.on_publish(ack.pkid),
            Event::Incoming(Packet::SubAck(ack)) => handler.on_subscribe(&ack),
            Event::Incoming(Packet::Publish(message)) => handler.on_message(&message),
            Event::Incoming(Packet::Disconnect) => {
                self.connected = false;
                self.stale_credentials = true;
                self.subscriptions.connection_lost();
                handler.on_disconnect(&DisconnectReason::Broker);
            }
            _ => {}
        }
    }
}

impl Link for Session {
    async fn service<H: Handler>(&mut self, handler: &mut H) -> Result<usize> {
        Session::service(self, handler).await
    }

    async fn publish(&mut self, topic: &str, qos: QoS, payload: bytes::Bytes) -> Result<()> {
        Session::publish(self, topic, qos, payload)
    }

    async fn disconnect<H: Handler>(&mut self, handler: &mut H) -> Result<()> {
        Session::disconnect(self, handler).await
    }

    fn reopen(&mut self) -> Result<()> {
        Session::reopen(self);
        Ok(())
    }
}
