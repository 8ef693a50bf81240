//! Collaborators the sign-in flow depends on: password hashing and session issuing

pub mod password;
pub mod session;

pub use password::Argon2PasswordHasher;
pub use session::{Claims, JwtSessionIssuer};

use async_trait::async_trait;

use crate::{
    models::{SessionToken, UserId},
    Result,
};

/// Hashes secrets for storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, secret: &str) -> Result<String>;
}

/// Issues the session credential for a signed-in user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn issue(&self, user_id: &UserId) -> Result<SessionToken>;
}
