use oauth2::AccessToken;
use reqwest::header::ACCEPT;
use std::sync::Arc;
use tracing::debug;

use super::token_exchange::error_chain;
use crate::{
    models::OAuth2Provider,
    oauth2::{NormalizedIdentity, OAuth2Error, ProviderRegistry},
};

/// Reads the signed-in identity from the provider's userinfo endpoint
#[derive(Clone)]
pub struct UserInfoClient {
    registry: Arc<ProviderRegistry>,
    http: reqwest::Client,
}

impl UserInfoClient {
    #[must_use]
    pub const fn new(registry: Arc<ProviderRegistry>, http: reqwest::Client) -> Self {
        Self { registry, http }
    }

    /// One bearer-authenticated GET, mapped through the provider's adapter
    pub async fn fetch(
        &self,
        provider: OAuth2Provider,
        token: &AccessToken,
    ) -> Result<NormalizedIdentity, OAuth2Error> {
        let (config, adapter) = self.registry.usable(provider)?;
        let failed = |e: reqwest::Error| OAuth2Error::UserInfoFailed {
            provider,
            detail: error_chain(&e),
        };

        let payload: serde_json::Value = self
            .http
            .get(&config.userinfo_url)
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json()
            .await
            .map_err(failed)?;

        let identity = adapter.parse_identity(&payload)?;
        debug!(%provider, "Fetched user info");
        Ok(identity)
    }
}
