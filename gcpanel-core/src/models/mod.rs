pub mod id;
pub mod oauth2_provider;
pub mod session;
pub mod user;

pub use id::{generate_id, UserId};
pub use oauth2_provider::OAuth2Provider;
pub use session::SessionToken;
pub use user::{SignupMethod, UserAccount, UserStatus};
