use std::ops::RangeInclusive;
use std::time::Duration;

use bytes::Bytes;
use chrono::{Local, NaiveDateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Format of the timestamp carried by every payload.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const GATEWAY_ID: u32 = 2;
const NODE_IDS: RangeInclusive<u32> = 1..=10;
const TEMPERATURE: RangeInclusive<f64> = 17.0..=18.0;
const LOCATION: (f64, f64) = (-19.883971, -44.415545);

/// Version of the payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Schema {
    #[value(name = "v1.1", alias = "1.1")]
    V1_1,
    #[value(name = "v1.2", alias = "1.2")]
    V1_2,
}

impl Schema {
    pub const fn quality_range(self) -> RangeInclusive<f64> {
        match self {
            Self::V1_1 => 0.6..=0.7,
            Self::V1_2 => 0.6..=0.78,
        }
    }

    /// Default pause between two publishes.
    pub const fn publish_interval(self) -> Duration {
        match self {
            Self::V1_1 => Duration::from_secs(3),
            Self::V1_2 => Duration::from_secs(2),
        }
    }
}

/// One synthetic reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub gateway: u32,
    pub node: u32,
    pub state: bool,
    pub taken_at: NaiveDateTime,
    pub quality: f64,
    pub temperature: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl TelemetrySample {
    /// Serializes the sample into the compact JSON layout of `schema`.
    pub fn payload(&self, schema: Schema) -> serde_json::Result<Bytes> {
        let timestamp = self.taken_at.format(TIMESTAMP_FORMAT).to_string();
        let state = self.state.to_string();
        let json = match schema {
            Schema::V1_1 => serde_json::to_vec(&PayloadV11 {
                gateway: self.gateway,
                node: self.node,
                state,
                timestamp,
                quality: self.quality,
                temperature: self.temperature,
                latitude: self.latitude,
                longitude: self.longitude,
            })?,
            Schema::V1_2 => serde_json::to_vec(&PayloadV12 {
                gateway_id: self.gateway,
                node_id: self.node,
                state,
                datetime: timestamp,
                quality: self.quality,
                temperature: self.temperature,
                location: format!("{},{}", self.latitude, self.longitude),
            })?,
        };
        Ok(Bytes::from(json))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV11 {
    pub gateway: u32,
    pub node: u32,
    pub state: String,
    pub timestamp: String,
    #[serde(rename = "QY")]
    pub quality: f64,
    pub temperature: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV12 {
    pub gateway_id: u32,
    pub node_id: u32,
    pub state: String,
    pub datetime: String,
    #[serde(rename = "QY")]
    pub quality: f64,
    pub temperature: f64,
    /// `"lat,lon"`
    pub location: String,
}

/// Produces readings within the ranges of a schema.
#[derive(Debug, Clone, Copy)]
pub struct SampleGenerator {
    schema: Schema,
}

impl SampleGenerator {
    pub const fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub const fn schema(&self) -> Schema {
        self.schema
    }

    /// Generates a reading taken now, on the local wall clock.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> TelemetrySample {
        self.generate_at(rng, Local::now().naive_local())
    }

    pub fn generate_at<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        taken_at: NaiveDateTime,
    ) -> TelemetrySample {
        TelemetrySample {
            gateway: GATEWAY_ID,
            node: rng.gen_range(NODE_IDS),
            state: true,
            taken_at,
            quality: round(rng.gen_range(self.schema.quality_range()), 4),
            temperature: round(rng.gen_range(TEMPERATURE), 1),
            latitude: LOCATION.0,
            longitude: LOCATION.1,
        }
    }
}

fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
