pub use backoff::{Backoff, BackoffState, BackoffStep, INITIAL_BACKOFF, MAXIMUM_BACKOFF};
pub use config::{DeviceConfig, DeviceIdentity};
pub use error::Error;
pub use publisher::{
    FailurePolicy, PublishOutcome, Publisher, PublisherOptions, RunOutcome, RunReport,
};
pub use sample::{
    PayloadV11, PayloadV12, SampleGenerator, Schema, TelemetrySample, TIMESTAMP_FORMAT,
};
pub use session::connect;

mod backoff;
mod config;
mod error;
pub mod prompt;
mod publisher;
mod sample;
mod session;

pub type Result<T> = core::result::Result<T, Error>;
