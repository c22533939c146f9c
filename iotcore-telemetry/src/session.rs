use std::path::Path;

use iotcore_auth::JwtIssuer;
use iotcore_mqtt::{QoS, Session, SessionBuilder};
use tracing::info;

use crate::{DeviceConfig, Error, Result};

/// Prepares the device session: signs the first token, trusts the CA bundle
/// and subscribes to the configuration topic.
///
/// Nothing is sent to the broker yet, the connection is established by the
/// first service pass. Unreadable key material fails here, before any
/// connection attempt.
pub async fn connect(config: &DeviceConfig) -> Result<Session> {
    let identity = config.identity();

    let private_key = read(&config.private_key_file).await?;
    info!(
        "creating JWT using {} from private key file {}",
        config.algorithm,
        config.private_key_file.display()
    );
    let issuer = JwtIssuer::new(&identity.project_id, &private_key, config.algorithm)?;

    let ca = read(&config.ca_certs).await?;
    let client_id = identity.client_id();
    let mut session = SessionBuilder::new()
        .client_id(&client_id)
        .endpoint(&config.mqtt_bridge_hostname)
        .port(config.mqtt_bridge_port)
        .ca(&ca)
        .credentials(issuer)
        .build()?;

    session.subscribe(&identity.config_topic(), QoS::AtLeastOnce)?;
    Ok(session)
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|source| Error::Read {
        path: path.to_owned(),
        source,
    })
}
