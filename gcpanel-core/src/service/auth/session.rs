use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::SessionIssuer;
use crate::{
    models::{SessionToken, UserId},
    Error, Result,
};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Token type, always "access"
    pub typ: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_string(self.sub.clone())
    }
}

/// Issues HS256-signed access tokens
#[derive(Clone)]
pub struct JwtSessionIssuer {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    duration: Duration,
}

impl std::fmt::Debug for JwtSessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionIssuer")
            .field("algorithm", &Algorithm::HS256)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl JwtSessionIssuer {
    /// Create an issuer signing with `secret`
    pub fn new(secret: &[u8], duration_hours: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::InvalidInput("JWT secret must not be empty".to_string()));
        }
        let duration = i64::try_from(duration_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                Error::InvalidInput(format!("Token lifetime too large: {duration_hours}h"))
            })?;

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            duration,
        })
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| Error::InvalidInput(format!("Invalid session token: {e}")))?;
        if data.claims.typ != "access" {
            return Err(Error::InvalidInput("Not an access token".to_string()));
        }
        Ok(data.claims)
    }
}

#[async_trait]
impl SessionIssuer for JwtSessionIssuer {
    async fn issue(&self, user_id: &UserId) -> Result<SessionToken> {
        let issued_at = Utc::now();
        let expiry = issued_at
            .checked_add_signed(self.duration)
            .ok_or_else(|| Error::Internal("Session expiry is out of range".to_string()))?;

        let claims = Claims {
            sub: user_id.as_str().to_string(),
            typ: "access".to_string(),
            iat: issued_at.timestamp(),
            exp: expiry.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign session token: {e}")))?;

        Ok(SessionToken {
            user_id: user_id.clone(),
            access_token,
            issued_at,
            expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[tokio::test]
    async fn test_issue_and_verify() {
        let issuer = JwtSessionIssuer::new(SECRET, 8).unwrap();
        let user_id = UserId::new();

        let session = issuer.issue(&user_id).await.unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!((session.expiry - session.issued_at).num_hours(), 8);

        let claims = issuer.verify(&session.access_token).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
    }

    #[tokio::test]
    async fn test_foreign_secret_is_rejected() {
        let issuer = JwtSessionIssuer::new(SECRET, 1).unwrap();
        let other = JwtSessionIssuer::new(b"another-secret-another-secret-000", 1).unwrap();

        let session = other.issue(&UserId::new()).await.unwrap();
        assert!(issuer.verify(&session.access_token).is_err());
        assert!(issuer.verify("invalid.token").is_err());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(JwtSessionIssuer::new(b"", 1).is_err());
    }

    #[test]
    fn test_oversized_lifetime_is_rejected() {
        assert!(matches!(
            JwtSessionIssuer::new(SECRET, u64::MAX),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            JwtSessionIssuer::new(SECRET, i64::MAX as u64),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_expiry_past_calendar_range_is_an_error() {
        // Representable as a duration, but now + lifetime overflows the calendar.
        let issuer = JwtSessionIssuer::new(SECRET, 2_500_000_000).unwrap();
        assert!(matches!(
            issuer.issue(&UserId::new()).await,
            Err(Error::Internal(_))
        ));
    }
}
