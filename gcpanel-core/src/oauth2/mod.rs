//! `OAuth2` sign-in: provider adapters, registry and state tracking
//!
//! # Architecture
//!
//! 1. **Adapters**: one [`ProviderAdapter`] per identity provider knows its
//!    endpoints, how to build the authorization URL and how to read its
//!    userinfo payload.
//! 2. **Registry**: [`ProviderRegistry`] pairs each adapter with the
//!    credentials loaded at startup.
//! 3. **State**: [`StateStore`] holds outstanding CSRF state tokens until the
//!    callback consumes them.
//!
//! Orchestration lives in `crate::service` and never branches on a provider.

pub mod error;
pub mod providers;
pub mod registry;
pub mod state;

pub use error::{ErrorCategory, ErrorCode, OAuth2Error};
pub use registry::{ProviderConfig, ProviderRegistry, ProviderSummary};
pub use state::{MemoryStateStore, RedisStateStore, StateStore};

use oauth2::{basic::BasicClient, AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use serde::Serialize;
use url::Url;

use crate::models::OAuth2Provider;

/// Built-in endpoints of a provider, overridable per deployment
#[derive(Debug, Clone, Copy)]
pub struct ProviderEndpoints {
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub userinfo_url: &'static str,
    /// Space separated, may be empty
    pub scope: &'static str,
}

/// `OAuth2` provider adapter
///
/// Adding a provider means adding one implementation of this trait and
/// registering it in [`providers::adapter_for`].
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> OAuth2Provider;

    fn endpoints(&self) -> ProviderEndpoints;

    /// Extra query parameters appended to the authorization URL
    fn extra_auth_params(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Build the authorization URL carrying `client_id`, `redirect_uri`,
    /// `response_type=code`, `scope` and `state`
    fn build_auth_url(&self, config: &ProviderConfig, state: &str) -> Result<Url, OAuth2Error> {
        let auth_url = AuthUrl::new(config.authorize_url.clone()).map_err(|e| {
            tracing::warn!(provider = %self.provider(), "Invalid authorize URL: {e}");
            OAuth2Error::NotConfigured(self.provider())
        })?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone()).map_err(|e| {
            tracing::warn!(provider = %self.provider(), "Invalid redirect URI: {e}");
            OAuth2Error::NotConfigured(self.provider())
        })?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let mut request = client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(config.scopes().map(|s| Scope::new(s.to_string())));
        for (name, value) in self.extra_auth_params() {
            request = request.add_extra_param(*name, *value);
        }

        let (url, _csrf_token) = request.url();
        Ok(url)
    }

    /// Map the provider's userinfo payload into the common identity shape
    fn parse_identity(&self, payload: &serde_json::Value) -> Result<NormalizedIdentity, OAuth2Error>;
}

/// Provider-agnostic identity produced from a userinfo payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedIdentity {
    pub provider: OAuth2Provider,
    /// Trimmed and lowercased
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NormalizedIdentity {
    /// Fails with `MissingEmail` when `email` is absent or not an address
    pub fn new(
        provider: OAuth2Provider,
        email: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<Self, OAuth2Error> {
        let email = email
            .as_deref()
            .and_then(normalize_email)
            .ok_or(OAuth2Error::MissingEmail(provider))?;

        Ok(Self {
            provider,
            email,
            first_name: first_name.and_then(|s| non_empty(&s)),
            last_name: last_name.and_then(|s| non_empty(&s)),
        })
    }

    /// Local part of the email, used as the username of new accounts
    #[must_use]
    pub fn username(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Trim and lowercase an email, rejecting values that are not `local@domain`
#[must_use]
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

/// Read a string field, treating null, non-strings and blank strings as absent
pub(crate) fn string_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key).and_then(serde_json::Value::as_str).and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
