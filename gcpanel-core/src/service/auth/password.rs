use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher as _, SaltString},
    Argon2, ParamsBuilder, Version,
};
use async_trait::async_trait;
use tokio::task;

use super::PasswordHasher;
use crate::{Error, Result};

/// Argon2id hasher
///
/// Uses PHC 2023 winner Argon2id with parameters:
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4
/// - Output length: 32 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordHasher;

#[async_trait]
impl PasswordHasher for Argon2PasswordHasher {
    /// CPU-intensive, so it runs on a blocking thread
    async fn hash(&self, secret: &str) -> Result<String> {
        let secret = secret.to_string();

        task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);

            let params = ParamsBuilder::new()
                .m_cost(65536) // 64 MB
                .t_cost(3)
                .p_cost(4)
                .output_len(32)
                .build()
                .map_err(|e| Error::Internal(format!("Failed to build Argon2 params: {e}")))?;

            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

            let password_hash = argon2
                .hash_password(secret.as_bytes(), &salt)
                .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?
                .to_string();

            Ok(password_hash)
        })
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
    }
}
