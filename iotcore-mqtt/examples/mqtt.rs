use core::time::Duration;

use iotcore_mqtt::{LogHandler, QoS, SessionBuilder, StaticCredentials};
use tracing::Level;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let mut session = SessionBuilder::new()
        .client_id(&tokio::fs::read_to_string("client-id.in").await?)
        .endpoint(&tokio::fs::read_to_string("endpoint.in").await?)
        .ca(&tokio::fs::read("roots.pem").await?)
        .credentials(StaticCredentials::new(
            "unused",
            tokio::fs::read_to_string("token.in").await?,
        ))
        .build()?;

    session.subscribe("message", QoS::AtLeastOnce)?;

    let mut handler = LogHandler;
    loop {
        session.service(&mut handler).await?;
        session.publish(
            "message",
            QoS::AtLeastOnce,
            bytes::Bytes::from_static(b"Hello World"),
        )?;

        tokio::time::sleep(Duration::from_secs(20)).await;
    }
}
