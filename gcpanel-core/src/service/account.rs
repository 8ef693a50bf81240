use nanoid::nanoid;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::auth::{PasswordHasher, SessionIssuer};
use crate::{
    models::{SessionToken, UserAccount},
    oauth2::{NormalizedIdentity, OAuth2Error},
    repository::UserRepository,
};

/// Length of the throwaway password of accounts created by sign-in
const UNUSABLE_SECRET_LEN: usize = 64;

/// Links a provider identity to exactly one local account
///
/// Email is the only join key, so the same address reported by two
/// providers lands on the same account.
pub struct AccountResolver {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    sessions: Arc<dyn SessionIssuer>,
}

impl AccountResolver {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        Self {
            users,
            hasher,
            sessions,
        }
    }

    /// Resolve the account and issue its session
    pub async fn resolve_or_create(
        &self,
        identity: &NormalizedIdentity,
    ) -> Result<(UserAccount, SessionToken), OAuth2Error> {
        let user = self.resolve(identity).await?;
        let session = self.issue_session(&user).await?;
        Ok((user, session))
    }

    /// Find the account for `identity.email`, creating it on first sign-in
    ///
    /// Fails with `AccountDisabled` for any account that may not log in,
    /// including one a concurrent sign-in created a moment earlier.
    pub async fn resolve(&self, identity: &NormalizedIdentity) -> Result<UserAccount, OAuth2Error> {
        let existing = self
            .users
            .get_by_email(&identity.email)
            .await
            .map_err(|e| OAuth2Error::AccountCreationFailed(format!("user lookup failed: {e}")))?;

        let user = match existing {
            Some(user) => user,
            None => self.create(identity).await?,
        };

        if !user.can_login() {
            warn!(user_id = %user.id, status = %user.status, "Sign-in refused for inactive account");
            return Err(OAuth2Error::AccountDisabled(user.status));
        }

        Ok(user)
    }

    /// Issue a session for an account that passed [`Self::resolve`]
    pub async fn issue_session(&self, user: &UserAccount) -> Result<SessionToken, OAuth2Error> {
        if !user.can_login() {
            return Err(OAuth2Error::AccountDisabled(user.status));
        }

        self.sessions
            .issue(&user.id)
            .await
            .map_err(|e| OAuth2Error::AccountCreationFailed(format!("session issuance failed: {e}")))
    }

    async fn create(&self, identity: &NormalizedIdentity) -> Result<UserAccount, OAuth2Error> {
        // Never shown to anyone; the account signs in through its provider only
        let password_hash = self
            .hasher
            .hash(&nanoid!(UNUSABLE_SECRET_LEN))
            .await
            .map_err(|e| OAuth2Error::AccountCreationFailed(format!("password hashing failed: {e}")))?;

        let candidate = UserAccount::new_oauth2(
            identity.username().to_string(),
            identity.email.clone(),
            password_hash,
            identity.first_name.clone(),
            identity.last_name.clone(),
        );

        let (user, created) = self
            .users
            .create_if_absent(candidate)
            .await
            .map_err(|e| OAuth2Error::AccountCreationFailed(e.to_string()))?;

        if created {
            info!(user_id = %user.id, provider = %identity.provider, "Created account on first sign-in");
        } else {
            debug!(user_id = %user.id, "Account was created by a concurrent sign-in");
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{OAuth2Provider, SignupMethod, UserStatus},
        repository::{MemoryUserRepository, MockUserRepository},
        service::auth::{JwtSessionIssuer, MockPasswordHasher, MockSessionIssuer},
        test_helpers::{FastHasher, UserFixture},
        Error,
    };

    fn sessions() -> Arc<JwtSessionIssuer> {
        Arc::new(JwtSessionIssuer::new(b"0123456789abcdef0123456789abcdef", 8).unwrap())
    }

    fn identity(provider: OAuth2Provider, email: &str) -> NormalizedIdentity {
        NormalizedIdentity::new(
            provider,
            Some(email.to_string()),
            Some("A".to_string()),
            Some("B".to_string()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_active_oauth_account() {
        let users = Arc::new(MemoryUserRepository::new());
        let resolver = AccountResolver::new(users.clone(), Arc::new(FastHasher), sessions());

        let (user, session) = resolver
            .resolve_or_create(&identity(OAuth2Provider::Google, "a@x.com"))
            .await
            .unwrap();

        assert_eq!(user.username, "a");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.first_name.as_deref(), Some("A"));
        assert_eq!(user.last_name.as_deref(), Some("B"));
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.signup_method, SignupMethod::OAuth2);
        assert!(user.password_hash.starts_with("fast$"));
        assert_eq!(session.user_id, user.id);
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_same_email_from_other_provider_links_existing_account() {
        let users = Arc::new(MemoryUserRepository::new());
        let existing = UserFixture::new().with_email("a@x.com").build();
        let existing_id = existing.id.clone();
        users.insert(existing);

        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().never();
        let resolver = AccountResolver::new(users.clone(), Arc::new(hasher), sessions());

        let (user, session) = resolver
            .resolve_or_create(&identity(OAuth2Provider::Procore, "A@X.com"))
            .await
            .unwrap();

        assert_eq!(user.id, existing_id);
        assert_eq!(session.user_id, existing_id);
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_account_gets_no_session() {
        for status in [UserStatus::Disabled, UserStatus::Pending] {
            let users = Arc::new(MemoryUserRepository::new());
            users.insert(UserFixture::new().with_email("a@x.com").with_status(status).build());

            let mut sessions = MockSessionIssuer::new();
            sessions.expect_issue().never();
            let resolver = AccountResolver::new(users, Arc::new(FastHasher), Arc::new(sessions));

            let err = resolver
                .resolve_or_create(&identity(OAuth2Provider::Google, "a@x.com"))
                .await
                .unwrap_err();

            assert!(matches!(err, OAuth2Error::AccountDisabled(s) if s == status));
        }
    }

    #[tokio::test]
    async fn test_account_disabled_by_concurrent_creator_is_refused() {
        let mut users = MockUserRepository::new();
        users.expect_get_by_email().returning(|_| Ok(None));
        users.expect_create_if_absent().returning(|_| {
            let winner = UserFixture::new()
                .with_email("a@x.com")
                .with_status(UserStatus::Disabled)
                .build();
            Ok((winner, false))
        });

        let mut sessions = MockSessionIssuer::new();
        sessions.expect_issue().never();
        let resolver = AccountResolver::new(Arc::new(users), Arc::new(FastHasher), Arc::new(sessions));

        let err = resolver
            .resolve_or_create(&identity(OAuth2Provider::Google, "a@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, OAuth2Error::AccountDisabled(UserStatus::Disabled)));
    }

    #[tokio::test]
    async fn test_store_failure_is_account_creation_failed() {
        let mut users = MockUserRepository::new();
        users.expect_get_by_email().returning(|_| Ok(None));
        users
            .expect_create_if_absent()
            .times(1)
            .returning(|_| Err(Error::Internal("connection reset".to_string())));

        let resolver = AccountResolver::new(Arc::new(users), Arc::new(FastHasher), sessions());

        let err = resolver
            .resolve_or_create(&identity(OAuth2Provider::Microsoft, "new@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, OAuth2Error::AccountCreationFailed(_)));
        assert!(!err.user_message().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_hash_failure_creates_nothing() {
        let mut users = MockUserRepository::new();
        users.expect_get_by_email().returning(|_| Ok(None));
        users.expect_create_if_absent().never();

        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|_| Err(Error::Internal("argon2 unavailable".to_string())));

        let resolver = AccountResolver::new(Arc::new(users), Arc::new(hasher), sessions());

        let err = resolver
            .resolve_or_create(&identity(OAuth2Provider::Google, "a@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, OAuth2Error::AccountCreationFailed(_)));
    }

    #[tokio::test]
    async fn test_concurrent_first_sign_ins_share_one_account() {
        let users = Arc::new(MemoryUserRepository::new());
        let resolver = Arc::new(AccountResolver::new(
            users.clone(),
            Arc::new(FastHasher),
            sessions(),
        ));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    resolver
                        .resolve_or_create(&identity(OAuth2Provider::Google, "race@x.com"))
                        .await
                        .map(|(user, _)| user.id)
                })
            })
            .collect();

        let ids: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(users.len(), 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }
}
