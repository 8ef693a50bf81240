use oauth2::{
    basic::BasicClient, AccessToken, AuthType, AuthorizationCode, ClientId, ClientSecret,
    RedirectUrl, TokenResponse, TokenUrl,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    models::OAuth2Provider,
    oauth2::{OAuth2Error, ProviderRegistry},
};

/// Redeems authorization codes at the provider's token endpoint
///
/// One POST per call and no retries: a code is single use, so a retry after
/// a rejection fails again and a retry after a lost response resends a
/// redeemed code.
#[derive(Clone)]
pub struct TokenExchangeClient {
    registry: Arc<ProviderRegistry>,
    http: reqwest::Client,
}

impl TokenExchangeClient {
    #[must_use]
    pub const fn new(registry: Arc<ProviderRegistry>, http: reqwest::Client) -> Self {
        Self { registry, http }
    }

    pub async fn exchange(
        &self,
        provider: OAuth2Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, OAuth2Error> {
        let (config, _) = self.registry.usable(provider)?;

        let token_url = TokenUrl::new(config.token_url.clone()).map_err(|e| {
            warn!(%provider, "Invalid token URL: {e}");
            OAuth2Error::NotConfigured(provider)
        })?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| {
            warn!(%provider, "Invalid redirect URI: {e}");
            OAuth2Error::NotConfigured(provider)
        })?;

        // client_id and client_secret travel in the form body
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url)
            .set_auth_type(AuthType::RequestBody);

        let response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| OAuth2Error::TokenExchangeFailed {
                provider,
                detail: error_chain(&e),
            })?;

        debug!(%provider, "Exchanged authorization code");
        Ok(response.access_token().clone())
    }
}

/// Render an error with its sources
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::ProviderConfig;
    use std::time::Duration;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer, timeout: Duration) -> TokenExchangeClient {
        let adapter = crate::oauth2::providers::adapter_for(OAuth2Provider::Procore);
        let mut config = ProviderConfig::with_defaults(
            adapter.as_ref(),
            "cid".to_string(),
            "csecret".to_string(),
            "https://panel.example.com/auth/callback/procore".to_string(),
        );
        config.token_url = format!("{}/oauth/token", server.uri());

        let mut registry = ProviderRegistry::new();
        registry.register(config);
        TokenExchangeClient::new(
            Arc::new(registry),
            crate::service::provider_http_client(timeout).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_exchange_posts_code_and_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_id=cid"))
            .and(body_string_contains("client_secret=csecret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server, Duration::from_secs(5))
            .exchange(
                OAuth2Provider::Procore,
                "the-code",
                "https://panel.example.com/auth/callback/procore",
            )
            .await
            .unwrap();

        assert_eq!(token.secret(), "at-123");
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_secs(5))
            .exchange(OAuth2Provider::Procore, "used-code", "https://panel.example.com/cb")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OAuth2Error::TokenExchangeFailed { provider: OAuth2Provider::Procore, .. }
        ));
        assert!(!err.user_message().contains("used-code"));
    }

    #[tokio::test]
    async fn test_timeout_fails_the_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "late", "token_type": "Bearer"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_millis(200))
            .exchange(OAuth2Provider::Procore, "code", "https://panel.example.com/cb")
            .await
            .unwrap_err();

        assert!(matches!(err, OAuth2Error::TokenExchangeFailed { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_the_exchange() {
        let server = MockServer::start().await;
        let client = client_for(&server, Duration::from_secs(1));
        drop(server);

        let err = client
            .exchange(OAuth2Provider::Procore, "code", "https://panel.example.com/cb")
            .await
            .unwrap_err();

        assert!(matches!(err, OAuth2Error::TokenExchangeFailed { .. }));
    }
}
