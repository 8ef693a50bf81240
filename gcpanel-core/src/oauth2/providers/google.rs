//! Google `OAuth2` provider

use crate::models::OAuth2Provider;
use crate::oauth2::{string_field, NormalizedIdentity, OAuth2Error, ProviderAdapter, ProviderEndpoints};

/// Google `OAuth2` provider
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleAdapter;

impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> OAuth2Provider {
        OAuth2Provider::Google
    }

    fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo",
            scope: "openid email profile",
        }
    }

    fn parse_identity(&self, payload: &serde_json::Value) -> Result<NormalizedIdentity, OAuth2Error> {
        NormalizedIdentity::new(
            OAuth2Provider::Google,
            string_field(payload, "email"),
            string_field(payload, "given_name"),
            string_field(payload, "family_name"),
        )
    }
}
