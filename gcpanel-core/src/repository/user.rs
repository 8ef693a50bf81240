use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;

use crate::{
    models::{SignupMethod, UserAccount, UserId, UserStatus},
    Error, Result,
};

/// User store as seen by the sign-in flow
///
/// Emails are compared case-insensitively. The sign-in flow only reads and
/// creates accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<UserAccount>>;

    /// Insert `user` unless an account with the same email exists
    ///
    /// Returns the stored account and whether it was created by this call.
    /// Must be atomic: concurrent calls for one email yield one account.
    async fn create_if_absent(&self, user: UserAccount) -> Result<(UserAccount, bool)>;

    /// Get user by ID
    async fn get_by_id(&self, user_id: &UserId) -> Result<Option<UserAccount>>;
}

/// In-memory user store keyed by lowercase email
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    by_email: DashMap<String, UserAccount>,
    email_by_id: DashMap<UserId, String>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an account unconditionally (seeding, administration)
    pub fn insert(&self, user: UserAccount) {
        let email = user.email.to_lowercase();
        self.email_by_id.insert(user.id.clone(), email.clone());
        self.by_email.insert(email, user);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        Ok(self
            .by_email
            .get(&email.to_lowercase())
            .map(|user| user.value().clone()))
    }

    async fn create_if_absent(&self, user: UserAccount) -> Result<(UserAccount, bool)> {
        // The entry guard holds the shard lock for this email until dropped.
        match self.by_email.entry(user.email.to_lowercase()) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                self.email_by_id.insert(user.id.clone(), slot.key().clone());
                let stored = slot.insert(user);
                Ok((stored.value().clone(), true))
            }
        }
    }

    async fn get_by_id(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        let Some(email) = self.email_by_id.get(user_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        self.get_by_email(&email).await
    }
}

/// Postgres user store
///
/// Relies on the unique index `users_email_lower_key` on `lower(email)`.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgUserRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgUserRepository").finish_non_exhaustive()
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, status, signup_method, created_at";

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<UserAccount> {
        let status: String = row.try_get("status")?;
        let signup_method: String = row.try_get("signup_method")?;
        let id: String = row.try_get("id")?;

        Ok(UserAccount {
            id: UserId::from_string(id),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            status: UserStatus::from_str(&status).map_err(Error::Internal)?,
            signup_method: SignupMethod::from_str_name(&signup_method),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn create_if_absent(&self, user: UserAccount) -> Result<(UserAccount, bool)> {
        let inserted = sqlx::query(&format!(
            r"
            INSERT INTO users ({USER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ((lower(email))) DO NOTHING
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.first_name.as_ref())
        .bind(user.last_name.as_ref())
        .bind(user.status.as_str())
        .bind(user.signup_method.as_str())
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((Self::row_to_user(&row)?, true));
        }

        // Lost the race (or the account already existed): read the winner.
        let existing = self.get_by_email(&user.email).await?.ok_or_else(|| {
            Error::Internal("User insert conflicted but no matching row was found".to_string())
        })?;
        Ok((existing, false))
    }

    async fn get_by_id(&self, user_id: &UserId) -> Result<Option<UserAccount>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::UserFixture;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_by_email_is_case_insensitive() {
        let repo = MemoryUserRepository::new();
        let user = UserFixture::new().with_email("pm@builder.com").build();
        repo.insert(user.clone());

        let found = repo.get_by_email("PM@Builder.COM").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.get_by_email("other@builder.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_if_absent_keeps_first_account() {
        let repo = MemoryUserRepository::new();
        let first = UserFixture::new().with_email("a@x.com").build();
        let second = UserFixture::new().with_email("A@X.com").build();

        let (stored, created) = repo.create_if_absent(first.clone()).await.unwrap();
        assert!(created);
        assert_eq!(stored.id, first.id);

        let (stored, created) = repo.create_if_absent(second).await.unwrap();
        assert!(!created);
        assert_eq!(stored.id, first.id);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let repo = MemoryUserRepository::new();
        let user = UserFixture::new().build();
        repo.create_if_absent(user.clone()).await.unwrap();

        assert!(repo.get_by_id(&user.id).await.unwrap().is_some());
        assert!(repo.get_by_id(&UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_if_absent() {
        let repo = Arc::new(MemoryUserRepository::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let user = UserFixture::new().with_email("race@x.com").build();
                repo.create_if_absent(user).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        let mut created = 0;
        for handle in handles {
            let (user, was_created) = handle.await.unwrap();
            if was_created {
                created += 1;
            }
            ids.push(user.id);
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len(), 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
