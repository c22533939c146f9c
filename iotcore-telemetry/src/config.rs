use std::path::{Path, PathBuf};

use iotcore_auth::Algorithm;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Connection settings of a single device.
///
/// The defaults are the inline constants the device ships with; a
/// credentials file can replace all of them, see [`DeviceConfig::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub project_id: String,
    pub registry_id: String,
    pub device_id: String,
    #[serde(alias = "region")]
    pub cloud_region: String,
    pub algorithm: Algorithm,
    #[serde(alias = "ca")]
    pub ca_certs: PathBuf,
    #[serde(alias = "private_key")]
    pub private_key_file: PathBuf,
    #[serde(alias = "hostname")]
    pub mqtt_bridge_hostname: String,
    #[serde(alias = "port")]
    pub mqtt_bridge_port: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            project_id: "raspberry-197017".to_owned(),
            registry_id: "raspi".to_owned(),
            device_id: "raspberrypi".to_owned(),
            cloud_region: "us-central1".to_owned(),
            algorithm: Algorithm::Rs256,
            ca_certs: PathBuf::from("roots.pem"),
            private_key_file: PathBuf::from("rsa_private.pem"),
            mqtt_bridge_hostname: "mqtt.googleapis.com".to_owned(),
            mqtt_bridge_port: 8883,
        }
    }
}

impl DeviceConfig {
    /// Loads the configuration from a credentials file. Files with the
    /// `toml` extension are read as TOML, everything else as JSON.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Read {
                path: path.to_owned(),
                source,
            })?;

        if path.extension().is_some_and(|ext| ext == "toml") {
            Ok(toml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            project_id: self.project_id.clone(),
            registry_id: self.registry_id.clone(),
            device_id: self.device_id.clone(),
            region: self.cloud_region.clone(),
        }
    }
}

/// Identifies the device for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub project_id: String,
    pub registry_id: String,
    pub device_id: String,
    pub region: String,
}

impl DeviceIdentity {
    pub fn client_id(&self) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}/devices/{}",
            self.project_id, self.region, self.registry_id, self.device_id
        )
    }

    /// Topic the telemetry is published to.
    pub fn events_topic(&self) -> String {
        format!("/devices/{}/events", self.device_id)
    }

    /// Topic the broker pushes configuration updates to.
    pub fn config_topic(&self) -> String {
        format!("/devices/{}/config", self.device_id)
    }
}
