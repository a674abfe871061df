mod error;
mod session;

pub use error::AuthError;
pub use session::{AuthSession, TokenType};
