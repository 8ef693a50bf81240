use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Session credential handed to the browser after a successful sign-in
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub user_id: UserId,
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

impl SessionToken {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_redacts_access_token() {
        let now = Utc::now();
        let token = SessionToken {
            user_id: UserId::from_string("u1".to_string()),
            access_token: "very-secret".to_string(),
            issued_at: now,
            expiry: now + Duration::hours(1),
        };

        let rendered = format!("{token:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(!token.is_expired_at(now));
        assert!(token.is_expired_at(now + Duration::hours(2)));
    }
}
