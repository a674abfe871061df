use thiserror::Error;

/// Errors surfaced while building tracker credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Linear credential is empty; set LINEAR_API_KEY")]
    EmptyCredential,
    #[error("invalid token type '{0}'")]
    InvalidTokenType(String),
}
