//! Sign-in flow services
//!
//! [`OAuth2Service`] wires the pieces together; each piece is usable on its
//! own for tests and alternative front ends.

pub mod account;
pub mod auth;
pub mod authorization;
pub mod callback;
pub mod token_exchange;
pub mod userinfo;

pub use account::AccountResolver;
pub use authorization::{AuthorizationRequest, AuthorizationRequestBuilder};
pub use callback::{CallbackFailure, CallbackOrchestrator, CallbackStage, LoginOutcome};
pub use token_exchange::TokenExchangeClient;
pub use userinfo::UserInfoClient;

use std::{sync::Arc, time::Duration};

use crate::{
    config::OAuth2Config,
    models::OAuth2Provider,
    oauth2::{OAuth2Error, ProviderRegistry, ProviderSummary, StateStore},
    repository::UserRepository,
    Error, Result,
};
use auth::{PasswordHasher, SessionIssuer};

/// HTTP client for provider calls
///
/// Redirects are not followed, so a token endpoint cannot bounce the
/// authorization code elsewhere.
pub fn provider_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("gcpanel/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Entry point of the sign-in flow used by the web layer
#[derive(Clone)]
pub struct OAuth2Service {
    registry: Arc<ProviderRegistry>,
    authorization: Arc<AuthorizationRequestBuilder>,
    callback: Arc<CallbackOrchestrator>,
}

impl std::fmt::Debug for OAuth2Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Service")
            .field("providers", &self.registry.providers())
            .finish_non_exhaustive()
    }
}

impl OAuth2Service {
    pub fn new(
        config: &OAuth2Config,
        registry: Arc<ProviderRegistry>,
        state_store: Arc<dyn StateStore>,
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Result<Self> {
        let http = provider_http_client(config.http_timeout())?;

        let authorization = AuthorizationRequestBuilder::new(
            registry.clone(),
            state_store.clone(),
            config.state_ttl(),
        );
        let callback = CallbackOrchestrator::new(
            registry.clone(),
            state_store,
            TokenExchangeClient::new(registry.clone(), http.clone()),
            UserInfoClient::new(registry.clone(), http),
            AccountResolver::new(users, hasher, sessions),
        );

        Ok(Self {
            registry,
            authorization: Arc::new(authorization),
            callback: Arc::new(callback),
        })
    }

    /// Resolve a provider from its path segment
    pub fn provider(&self, name: &str) -> std::result::Result<OAuth2Provider, OAuth2Error> {
        self.registry.config_by_name(name).map(|config| config.provider)
    }

    /// Whether the sign-in cookie for `provider` should carry `Secure`
    #[must_use]
    pub fn secure_cookies(&self, provider: OAuth2Provider) -> bool {
        self.registry
            .config(provider)
            .is_ok_and(|config| config.redirect_is_https())
    }

    #[must_use]
    pub fn providers(&self) -> Vec<ProviderSummary> {
        self.registry.providers()
    }

    pub async fn begin_login(
        &self,
        provider: OAuth2Provider,
        session_id: &str,
    ) -> std::result::Result<AuthorizationRequest, OAuth2Error> {
        self.authorization.begin_login(provider, session_id).await
    }

    pub async fn handle_callback(
        &self,
        provider: OAuth2Provider,
        code: &str,
        state: &str,
        session_id: &str,
    ) -> std::result::Result<LoginOutcome, CallbackFailure> {
        self.callback.handle(provider, code, state, session_id).await
    }

    /// Report a failure the provider signalled on the callback URL itself
    #[must_use]
    pub fn provider_denied(&self, provider: OAuth2Provider, error: &str) -> CallbackFailure {
        self.callback.provider_denied(provider, error)
    }
}
