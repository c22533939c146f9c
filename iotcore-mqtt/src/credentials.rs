use crate::error::CredentialError;

/// Source of the username/password pair presented in the MQTT CONNECT
/// packet.
///
/// The session asks for a password once when it is built and again before
/// every reconnect, so short-lived tokens are re-issued for each new
/// connection instead of being refreshed mid-session.
pub trait Credentials: Send {
    /// Returns the username to present to the broker.
    fn username(&self) -> &str;

    /// Issues the password for a new connection.
    fn password(&self) -> Result<String, CredentialError>;
}

/// A fixed username/password pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Credentials for StaticCredentials {
    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> Result<String, CredentialError> {
        Ok(self.password.clone())
    }
}

impl<C: Credentials + Sync> Credentials for std::sync::Arc<C> {
    fn username(&self) -> &str {
        self.as_ref().username()
    }

    fn password(&self) -> Result<String, CredentialError> {
        self.as_ref().password()
    }
}
