use std::str::FromStr;

use super::AuthError;

/// Type of credential presented to the Linear API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Bearer,
    ApiKey,
}

impl FromStr for TokenType {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bearer" | "oauth" => Ok(TokenType::Bearer),
            "api_key" | "api-key" | "apikey" => Ok(TokenType::ApiKey),
            other => Err(AuthError::InvalidTokenType(other.to_string())),
        }
    }
}

/// Process-scoped credential shared read-only by every request.
#[derive(Clone)]
pub struct AuthSession {
    access_token: String,
    pub token_type: TokenType,
}

impl AuthSession {
    pub fn new(access_token: String, token_type: TokenType) -> Result<Self, AuthError> {
        let access_token = access_token.trim().to_string();
        if access_token.is_empty() {
            return Err(AuthError::EmptyCredential);
        }
        Ok(Self {
            access_token,
            token_type,
        })
    }

    pub fn new_api_key(key: String) -> Result<Self, AuthError> {
        Self::new(key, TokenType::ApiKey)
    }

    pub fn new_access_token(token: String) -> Result<Self, AuthError> {
        Self::new(token, TokenType::Bearer)
    }

    /// Value for the `Authorization` header. Personal API keys are sent as-is.
    pub fn authorization_header(&self) -> String {
        match self.token_type {
            TokenType::Bearer => format!("Bearer {}", self.access_token),
            TokenType::ApiKey => self.access_token.clone(),
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}
