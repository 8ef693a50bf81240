pub mod user;

pub use user::{MemoryUserRepository, PgUserRepository, UserRepository};

#[cfg(test)]
pub use user::MockUserRepository;
