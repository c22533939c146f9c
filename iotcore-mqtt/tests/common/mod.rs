use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use iotcore_mqtt::{
    ConnAck, CredentialError, Credentials, DisconnectReason, Handler, Publish, Session,
    SessionBuilder, SubAck,
};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, Ia5String, IsCa, KeyPair,
    KeyUsagePurpose, SanType,
};
use rumqttd::{
    Broker, Config, ConnectionSettings, RouterConfig, ServerSettings, ShutdownHandler, TlsConfig,
};
use time::OffsetDateTime;

fn validity(params: &mut CertificateParams) -> anyhow::Result<()> {
    let day = time::Duration::days(1);
    params.not_before = OffsetDateTime::now_utc()
        .checked_sub(day)
        .context("couldn't shift a day backward")?;
    params.not_after = OffsetDateTime::now_utc()
        .checked_add(day)
        .context("couldn't shift a day forward")?;
    Ok(())
}

/// A self-signed authority the test broker's certificate chains to.
pub fn ca() -> anyhow::Result<(Certificate, KeyPair)> {
    let mut params = CertificateParams::new(Vec::default())?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "IoT Core test authority");
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];
    validity(&mut params)?;

    let key = KeyPair::generate()?;
    Ok((params.self_signed(&key)?, key))
}

/// Writes the authority and a broker certificate for `127.0.0.1` into `dir`
/// and returns the matching broker TLS settings.
pub async fn server_tls(
    dir: &Path,
    ca: &Certificate,
    ca_key: &KeyPair,
) -> anyhow::Result<TlsConfig> {
    let name = "localhost";
    let mut params = CertificateParams::new(vec![name.into()])?;
    validity(&mut params)?;
    params.distinguished_name.push(DnType::CommonName, name);
    params.use_authority_key_identifier_extension = true;
    params.key_usages.push(KeyUsagePurpose::DigitalSignature);
    params.subject_alt_names = vec![
        SanType::DnsName(Ia5String::from_str(name)?),
        SanType::IpAddress(Ipv4Addr::LOCALHOST.into()),
    ];
    let key = KeyPair::generate()?;
    let cert = params.signed_by(&key, ca, ca_key)?;

    let ca_path = dir.join("ca.pem");
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    tokio::fs::write(&ca_path, ca.pem()).await?;
    tokio::fs::write(&cert_path, cert.pem()).await?;
    tokio::fs::write(&key_path, key.serialize_pem()).await?;

    Ok(TlsConfig::Rustls {
        capath: None,
        certpath: path_string(&cert_path)?,
        keypath: path_string(&key_path)?,
    })
}

fn path_string(path: &Path) -> anyhow::Result<String> {
    path.to_str()
        .map(ToOwned::to_owned)
        .context("temporary path isn't valid UTF-8")
}

/// Starts a broker on `port`, over TLS when `tls` is given.
pub fn mqtt_server(port: u16, tls: Option<TlsConfig>) -> ShutdownHandler {
    let settings = ServerSettings {
        name: "mqtt-server".to_owned(),
        listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port)),
        tls,
        next_connection_delay_ms: 1,
        connections: ConnectionSettings {
            connection_timeout_ms: 1000,
            max_payload_size: 2048,
            max_inflight_count: 15,
            auth: None,
            external_auth: None,
            dynamic_filters: false,
        },
    };

    let mut v4_map = HashMap::new();
    v4_map.insert("-".to_owned(), settings);

    let config = Config {
        router: RouterConfig {
            max_connections: 15,
            max_outgoing_packet_count: 10,
            max_segment_size: 2048,
            max_segment_count: 50,
            ..Default::default()
        },
        v4: Some(v4_map),
        ..Default::default()
    };

    let mut broker = Broker::new(config);
    let handler = broker.shutdown_handler();
    std::thread::spawn(move || {
        broker.start().unwrap();
    });

    handler
}

pub fn port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Credentials that count how many passwords were issued.
#[derive(Debug, Clone, Default)]
pub struct CountingCredentials(pub Arc<AtomicUsize>);

impl CountingCredentials {
    pub fn issued(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Credentials for CountingCredentials {
    fn username(&self) -> &str {
        "unused"
    }

    fn password(&self) -> Result<String, CredentialError> {
        let issued = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{issued}"))
    }
}

pub fn session(port: u16, client_id: &str, credentials: CountingCredentials) -> Session {
    SessionBuilder::new()
        .client_id(client_id)
        .endpoint("127.0.0.1")
        .port(port)
        .credentials(credentials)
        .service_window(Duration::from_millis(50))
        .build()
        .unwrap()
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub connects: usize,
    pub disconnects: Vec<DisconnectReason>,
    pub acknowledged: Vec<u16>,
    pub subscribed: usize,
    pub messages: Vec<(String, Bytes)>,
}

impl Handler for Recorder {
    fn on_connect(&mut self, _ack: &ConnAck) {
        self.connects += 1;
    }

    fn on_disconnect(&mut self, reason: &DisconnectReason) {
        self.disconnects.push(reason.clone());
    }

    fn on_publish(&mut self, pkid: u16) {
        self.acknowledged.push(pkid);
    }

    fn on_subscribe(&mut self, _ack: &SubAck) {
        self.subscribed += 1;
    }

    fn on_message(&mut self, message: &Publish) {
        self.messages
            .push((message.topic.clone(), message.payload.clone()));
    }
}

/// Services the session until `done` holds for the recorded events.
pub async fn drive(
    session: &mut Session,
    recorder: &mut Recorder,
    done: impl Fn(&Recorder) -> bool,
) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(recorder) {
            session.service(recorder).await?;
        }
        anyhow::Ok(())
    })
    .await
    .context("the session didn't reach the expected state in time")?
}
