use std::sync::Arc;

pub use rumqttc::{ClientError, ConnectionError};

/// Boxed error produced by a [`Credentials`](crate::Credentials) source.
pub type CredentialError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("missing endpoint")]
    Endpoint,
    #[error("missing client id")]
    ClientId,
    #[error("missing credentials")]
    Credentials,
    #[error("couldn't issue session credentials cause of \"{0}\"")]
    CredentialIssue(Arc<dyn std::error::Error + Send + Sync>),
    #[error("the session is closed")]
    Closed,
    #[error(transparent)]
    ConnectionError(Arc<ConnectionError>),
    #[error(transparent)]
    Mqtt(Arc<ClientError>),
}

impl Error {
    /// Returns `true` if retrying the same request later can succeed, i.e. the
    /// failure comes from the session state and not from the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::ConnectionError(_) | Self::Mqtt(_)
        )
    }
}

impl From<ClientError> for Error {
    fn from(value: ClientError) -> Self {
        Self::Mqtt(Arc::new(value))
    }
}

impl From<ConnectionError> for Error {
    fn from(value: ConnectionError) -> Self {
        Self::ConnectionError(Arc::new(value))
    }
}

impl From<CredentialError> for Error {
    fn from(value: CredentialError) -> Self {
        Self::CredentialIssue(Arc::from(value))
    }
}
