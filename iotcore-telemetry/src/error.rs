use std::path::PathBuf;

/// The main error type of the telemetry crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration file, private key or CA bundle couldn't be read.
    #[error("couldn't read \"{}\" cause of \"{source}\"", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An error occurred during JSON serialization or deserialization.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// The TOML configuration couldn't be parsed.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    /// An error occurred while preparing or issuing credentials.
    #[error(transparent)]
    Auth(#[from] iotcore_auth::Error),
    /// An error occurred within the MQTT session.
    #[error(transparent)]
    Mqtt(#[from] iotcore_mqtt::Error),
    /// The input ended before a number of messages was entered.
    #[error("the input ended before a number of messages was entered")]
    NoMessageCount,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
