/// Errors produced while preparing or issuing session tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured signing algorithm isn't supported by the broker.
    #[error("unsupported signing algorithm \"{0}\", expected RS256 or ES256")]
    UnsupportedAlgorithm(String),
    /// The private key couldn't be parsed for the configured algorithm.
    #[error("couldn't parse the private key cause of \"{0}\"")]
    PrivateKey(#[source] jsonwebtoken::errors::Error),
    /// Signing the claims failed.
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}
