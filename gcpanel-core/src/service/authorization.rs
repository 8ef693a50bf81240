use nanoid::nanoid;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, info_span, Instrument};

use crate::{
    models::OAuth2Provider,
    oauth2::{OAuth2Error, ProviderRegistry, StateStore},
};

/// Length of generated state tokens; 32 symbols of a 64 letter alphabet is
/// 192 bits
const STATE_TOKEN_LEN: usize = 32;

/// Where to send the browser, and the state bound to this attempt
#[derive(Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

impl std::fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("url", &"<contains state>")
            .finish_non_exhaustive()
    }
}

/// Starts sign-in: issues a state token and builds the provider URL
pub struct AuthorizationRequestBuilder {
    registry: Arc<ProviderRegistry>,
    state_store: Arc<dyn StateStore>,
    state_ttl: Duration,
}

impl AuthorizationRequestBuilder {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        state_store: Arc<dyn StateStore>,
        state_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            state_store,
            state_ttl,
        }
    }

    /// Begin a sign-in attempt for `session_id`
    ///
    /// Every call yields a fresh state; earlier ones stay valid until
    /// consumed or expired.
    pub async fn begin_login(
        &self,
        provider: OAuth2Provider,
        session_id: &str,
    ) -> Result<AuthorizationRequest, OAuth2Error> {
        let span = info_span!("oauth2_login", %provider);
        self.issue(provider, session_id).instrument(span).await
    }

    async fn issue(
        &self,
        provider: OAuth2Provider,
        session_id: &str,
    ) -> Result<AuthorizationRequest, OAuth2Error> {
        let (config, adapter) = self.registry.usable(provider)?;

        let state = nanoid!(STATE_TOKEN_LEN);
        let url = adapter.build_auth_url(config, &state)?;

        self.state_store
            .put(session_id, provider, &state, self.state_ttl)
            .await
            .map_err(|e| {
                error!("Failed to store OAuth2 state: {e}");
                OAuth2Error::InvalidState
            })?;

        info!(ttl_secs = self.state_ttl.as_secs(), "Issued OAuth2 authorization request");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }
}
