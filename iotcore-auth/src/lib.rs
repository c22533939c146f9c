use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
pub use error::Error;
use iotcore_mqtt::{CredentialError, Credentials};
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod error;

pub type Result<T> = core::result::Result<T, Error>;

/// The broker ignores the username, only the token is checked.
pub const USERNAME: &str = "unused";

/// How long an issued token stays valid.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Asymmetric algorithms accepted for signing session tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    Rs256,
    Es256,
}

impl Algorithm {
    const fn jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::Rs256 => jsonwebtoken::Algorithm::RS256,
            Self::Es256 => jsonwebtoken::Algorithm::ES256,
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            _ => Err(Error::UnsupportedAlgorithm(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rs256 => f.write_str("RS256"),
            Self::Es256 => f.write_str("ES256"),
        }
    }
}

/// Registered claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Expiration, seconds since the epoch.
    pub exp: i64,
    /// The project the device belongs to.
    pub aud: String,
}

impl Claims {
    pub fn new(project_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME.as_secs() as i64,
            aud: project_id.to_owned(),
        }
    }
}

/// Issues signed tokens used as the MQTT password of a session.
///
/// The private key is parsed once; every call to [`JwtIssuer::issue`] signs
/// a new set of claims, so each fresh connection gets its own token.
#[derive(Clone)]
pub struct JwtIssuer {
    project_id: String,
    algorithm: Algorithm,
    key: EncodingKey,
}

impl fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("project_id", &self.project_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JwtIssuer {
    /// Creates an issuer for the project from a PEM encoded private key.
    ///
    /// # Errors
    /// [`Error::PrivateKey`] if the key doesn't match the algorithm or isn't a
    /// valid PEM key.
    pub fn new(project_id: &str, private_key: &[u8], algorithm: Algorithm) -> Result<Self> {
        let key = match algorithm {
            Algorithm::Rs256 => EncodingKey::from_rsa_pem(private_key),
            Algorithm::Es256 => EncodingKey::from_ec_pem(private_key),
        }
        .map_err(Error::PrivateKey)?;

        Ok(Self {
            project_id: project_id.to_owned(),
            algorithm,
            key,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Signs claims issued now.
    pub fn issue(&self) -> Result<String> {
        self.issue_at(Utc::now())
    }

    /// Signs claims issued at `now`.
    pub fn issue_at(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims::new(&self.project_id, now);
        let token = jsonwebtoken::encode(&Header::new(self.algorithm.jwt()), &claims, &self.key)?;
        debug!(aud = %claims.aud, iat = claims.iat, exp = claims.exp, "issued token");
        Ok(token)
    }
}

impl Credentials for JwtIssuer {
    fn username(&self) -> &str {
        USERNAME
    }

    fn password(&self) -> core::result::Result<String, CredentialError> {
        Ok(self.issue()?)
    }
}
