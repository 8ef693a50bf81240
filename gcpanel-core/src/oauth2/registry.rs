//! Per-provider configuration loaded once at startup

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{providers, OAuth2Error, ProviderAdapter};
use crate::config::OAuth2Config;
use crate::models::OAuth2Provider;

/// Immutable configuration of one identity provider
#[derive(Clone)]
pub struct ProviderConfig {
    pub provider: OAuth2Provider,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Space separated scope list
    pub scope: String,
    pub redirect_uri: String,
}

impl ProviderConfig {
    /// Configuration using the adapter's built-in endpoints
    #[must_use]
    pub fn with_defaults(
        adapter: &dyn ProviderAdapter,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        let endpoints = adapter.endpoints();
        Self {
            provider: adapter.provider(),
            client_id,
            client_secret,
            authorize_url: endpoints.authorize_url.to_string(),
            token_url: endpoints.token_url.to_string(),
            userinfo_url: endpoints.userinfo_url.to_string(),
            scope: endpoints.scope.to_string(),
            redirect_uri,
        }
    }

    /// Client id and secret are both present
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    /// The callback is served over TLS
    #[must_use]
    pub fn redirect_is_https(&self) -> bool {
        url::Url::parse(&self.redirect_uri).is_ok_and(|url| url.scheme() == "https")
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("scope", &self.scope)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Provider entry for login pages
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    pub provider: OAuth2Provider,
    pub name: &'static str,
    pub configured: bool,
}

struct RegisteredProvider {
    config: ProviderConfig,
    adapter: Arc<dyn ProviderAdapter>,
}

/// Provider registry
///
/// Maps provider identifiers to their adapter and credentials. Built once
/// and shared read-only, so lookups take no lock.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: HashMap<OAuth2Provider, RegisteredProvider>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a provider
    pub fn register(&mut self, config: ProviderConfig) {
        let adapter = providers::adapter_for(config.provider);
        info!(
            provider = %config.provider,
            configured = config.has_credentials(),
            "Registered OAuth2 provider"
        );
        self.entries
            .insert(config.provider, RegisteredProvider { config, adapter });
    }

    /// Load every known provider from process environment variables
    #[must_use]
    pub fn from_env(oauth2: &OAuth2Config) -> Self {
        Self::from_lookup(oauth2, |key| std::env::var(key).ok())
    }

    /// Load every known provider through `lookup`
    ///
    /// Reads `{PROVIDER}_CLIENT_ID`, `{PROVIDER}_CLIENT_SECRET`, optional
    /// `{PROVIDER}_AUTHORIZE_URL` / `_TOKEN_URL` / `_USERINFO_URL` / `_SCOPE`
    /// overrides, and `OAUTH_REDIRECT_URI` as the callback base. Providers
    /// without credentials are still registered so they can be listed as
    /// unavailable.
    pub fn from_lookup<F>(oauth2: &OAuth2Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let redirect_base = lookup("OAUTH_REDIRECT_URI")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| oauth2.redirect_uri_base.clone());
        let redirect_base = redirect_base.trim_end_matches('/');

        let mut registry = Self::new();
        for provider in OAuth2Provider::ALL {
            let prefix = provider.env_prefix();
            let var = |suffix: &str| lookup(&format!("{prefix}_{suffix}"));

            let adapter = providers::adapter_for(provider);
            let mut config = ProviderConfig::with_defaults(
                adapter.as_ref(),
                var("CLIENT_ID").unwrap_or_default(),
                var("CLIENT_SECRET").unwrap_or_default(),
                format!("{redirect_base}/{provider}"),
            );
            if let Some(url) = var("AUTHORIZE_URL") {
                config.authorize_url = url;
            }
            if let Some(url) = var("TOKEN_URL") {
                config.token_url = url;
            }
            if let Some(url) = var("USERINFO_URL") {
                config.userinfo_url = url;
            }
            if let Some(scope) = var("SCOPE") {
                config.scope = scope;
            }

            if !config.has_credentials() {
                warn!(
                    "OAuth2 provider {provider} has no credentials; set {prefix}_CLIENT_ID and {prefix}_CLIENT_SECRET to enable it"
                );
            }
            registry.register(config);
        }
        registry
    }

    /// Configuration of `provider`
    pub fn config(&self, provider: OAuth2Provider) -> Result<&ProviderConfig, OAuth2Error> {
        self.entries
            .get(&provider)
            .map(|entry| &entry.config)
            .ok_or_else(|| OAuth2Error::UnknownProvider(provider.to_string()))
    }

    /// Configuration by provider name as it appears in URLs
    pub fn config_by_name(&self, name: &str) -> Result<&ProviderConfig, OAuth2Error> {
        let provider = name
            .parse::<OAuth2Provider>()
            .map_err(|_| OAuth2Error::UnknownProvider(name.to_string()))?;
        self.config(provider)
    }

    /// True iff the provider is registered with a client id and secret
    #[must_use]
    pub fn is_configured(&self, provider: OAuth2Provider) -> bool {
        self.entries
            .get(&provider)
            .is_some_and(|entry| entry.config.has_credentials())
    }

    /// Configuration and adapter of a provider that is ready for use
    pub fn usable(
        &self,
        provider: OAuth2Provider,
    ) -> Result<(&ProviderConfig, &dyn ProviderAdapter), OAuth2Error> {
        match self.entries.get(&provider) {
            Some(entry) if entry.config.has_credentials() => {
                Ok((&entry.config, entry.adapter.as_ref()))
            }
            _ => Err(OAuth2Error::NotConfigured(provider)),
        }
    }

    /// Every registered provider in display order
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderSummary> {
        OAuth2Provider::ALL
            .into_iter()
            .filter(|p| self.entries.contains_key(p))
            .map(|provider| ProviderSummary {
                provider,
                name: provider.display_name(),
                configured: self.is_configured(provider),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_reads_credentials() {
        let registry = ProviderRegistry::from_lookup(
            &OAuth2Config::default(),
            lookup_from(&[
                ("GOOGLE_CLIENT_ID", "gid"),
                ("GOOGLE_CLIENT_SECRET", "gsecret"),
                ("MICROSOFT_CLIENT_ID", "mid"),
                ("OAUTH_REDIRECT_URI", "https://panel.example.com/auth/callback/"),
            ]),
        );

        assert!(registry.is_configured(OAuth2Provider::Google));
        // secret missing
        assert!(!registry.is_configured(OAuth2Provider::Microsoft));
        assert!(!registry.is_configured(OAuth2Provider::Procore));

        let google = registry.config(OAuth2Provider::Google).unwrap();
        assert_eq!(google.client_id, "gid");
        assert_eq!(google.redirect_uri, "https://panel.example.com/auth/callback/google");
        assert_eq!(google.token_url, "https://oauth2.googleapis.com/token");
        assert!(google.redirect_is_https());
    }

    #[test]
    fn test_endpoint_overrides() {
        let registry = ProviderRegistry::from_lookup(
            &OAuth2Config::default(),
            lookup_from(&[
                ("PROCORE_CLIENT_ID", "pid"),
                ("PROCORE_CLIENT_SECRET", "psecret"),
                ("PROCORE_TOKEN_URL", "https://sandbox.procore.com/oauth/token"),
            ]),
        );

        let procore = registry.config(OAuth2Provider::Procore).unwrap();
        assert_eq!(procore.token_url, "https://sandbox.procore.com/oauth/token");
        assert_eq!(
            procore.redirect_uri,
            "http://localhost:8080/auth/callback/procore"
        );
        assert!(!procore.redirect_is_https());
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.config(OAuth2Provider::Google),
            Err(OAuth2Error::UnknownProvider(_))
        ));
        assert!(matches!(
            registry.config_by_name("github"),
            Err(OAuth2Error::UnknownProvider(name)) if name == "github"
        ));
    }

    #[test]
    fn test_usable_requires_credentials() {
        let registry = ProviderRegistry::from_lookup(&OAuth2Config::default(), lookup_from(&[]));
        assert!(matches!(
            registry.usable(OAuth2Provider::Google),
            Err(OAuth2Error::NotConfigured(OAuth2Provider::Google))
        ));
    }

    #[test]
    fn test_whitespace_credentials_are_not_configured() {
        let registry = ProviderRegistry::from_lookup(
            &OAuth2Config::default(),
            lookup_from(&[("GOOGLE_CLIENT_ID", " "), ("GOOGLE_CLIENT_SECRET", "s")]),
        );
        assert!(!registry.is_configured(OAuth2Provider::Google));
    }

    #[test]
    fn test_providers_listing() {
        let registry = ProviderRegistry::from_lookup(
            &OAuth2Config::default(),
            lookup_from(&[("PROCORE_CLIENT_ID", "p"), ("PROCORE_CLIENT_SECRET", "s")]),
        );
        let listing = registry.providers();
        assert_eq!(listing.len(), 3);
        assert_eq!(listing[0].provider, OAuth2Provider::Google);
        assert!(!listing[0].configured);
        assert_eq!(listing[2].name, "Procore");
        assert!(listing[2].configured);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let registry = ProviderRegistry::from_lookup(
            &OAuth2Config::default(),
            lookup_from(&[("GOOGLE_CLIENT_ID", "gid"), ("GOOGLE_CLIENT_SECRET", "top-secret")]),
        );
        let rendered = format!("{:?}", registry.config(OAuth2Provider::Google).unwrap());
        assert!(!rendered.contains("top-secret"));
    }
}
