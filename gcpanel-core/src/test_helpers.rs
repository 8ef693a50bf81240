//! Test helpers and fixtures for gcpanel-core tests

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{SignupMethod, UserAccount, UserId, UserStatus};
use crate::service::auth::PasswordHasher;
use crate::Result;

/// Generate a random user ID for testing
pub fn random_user_id() -> UserId {
    UserId::new()
}

/// Test fixture builder for `UserAccount`
pub struct UserFixture {
    id: UserId,
    username: String,
    email: String,
    status: UserStatus,
    signup_method: SignupMethod,
}

impl UserFixture {
    pub fn new() -> Self {
        Self {
            id: random_user_id(),
            username: "test_user".to_string(),
            email: "test@example.com".to_string(),
            status: UserStatus::Active,
            signup_method: SignupMethod::Password,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> UserAccount {
        UserAccount {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            status: self.status,
            signup_method: self.signup_method,
            created_at: Utc::now(),
        }
    }
}

impl Default for UserFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Hasher that skips Argon2 so tests stay fast
pub struct FastHasher;

#[async_trait]
impl PasswordHasher for FastHasher {
    async fn hash(&self, secret: &str) -> Result<String> {
        Ok(format!("fast${}", secret.len()))
    }
}
