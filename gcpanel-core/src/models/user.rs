use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::UserId;

/// User account status
///
/// Only `Active` accounts may be issued a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Normal active state
    Active,

    /// Disabled by an administrator
    Disabled,

    /// Awaiting administrator approval
    Pending,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Pending => "pending",
        }
    }

    /// Check if user can sign in with this status
    #[must_use]
    pub const fn can_login(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            "pending" => Ok(Self::Pending),
            _ => Err(format!("Unknown user status: {s}")),
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the account was first created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupMethod {
    Password,
    /// Created by an `OAuth2` sign-in; the stored password hash is unusable
    OAuth2,
}

impl SignupMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::OAuth2 => "oauth2",
        }
    }

    /// Parse signup method from string name (defaults to password for unknown values)
    #[must_use]
    pub fn from_str_name(s: &str) -> Self {
        match s {
            "oauth2" => Self::OAuth2,
            _ => Self::Password,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    /// Unique, stored lowercase
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: UserStatus,
    pub signup_method: SignupMethod,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// Build a fresh account for a first-time `OAuth2` sign-in
    #[must_use]
    pub fn new_oauth2(
        username: String,
        email: String,
        password_hash: String,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            username,
            email,
            password_hash,
            first_name,
            last_name,
            status: UserStatus::Active,
            signup_method: SignupMethod::OAuth2,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn can_login(&self) -> bool {
        self.status.can_login()
    }

    /// Password reset must be refused for accounts that never had a password
    #[must_use]
    pub const fn is_oauth_only(&self) -> bool {
        matches!(self.signup_method, SignupMethod::OAuth2)
    }
}
