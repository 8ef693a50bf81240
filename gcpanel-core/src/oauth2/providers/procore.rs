//! Procore `OAuth2` provider

use crate::models::OAuth2Provider;
use crate::oauth2::{string_field, NormalizedIdentity, OAuth2Error, ProviderAdapter, ProviderEndpoints};

/// Procore `OAuth2` provider
///
/// Procore exposes a single `name`; the first word becomes the first name
/// and the remainder the last name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcoreAdapter;

impl ProviderAdapter for ProcoreAdapter {
    fn provider(&self) -> OAuth2Provider {
        OAuth2Provider::Procore
    }

    fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "https://login.procore.com/oauth/authorize",
            token_url: "https://login.procore.com/oauth/token",
            userinfo_url: "https://api.procore.com/rest/v1.0/me",
            scope: "",
        }
    }

    fn parse_identity(&self, payload: &serde_json::Value) -> Result<NormalizedIdentity, OAuth2Error> {
        let (first_name, last_name) = match string_field(payload, "name") {
            Some(name) => split_name(&name),
            None => (None, None),
        };

        NormalizedIdentity::new(
            OAuth2Provider::Procore,
            string_field(payload, "email"),
            first_name,
            last_name,
        )
    }
}

fn split_name(name: &str) -> (Option<String>, Option<String>) {
    match name.split_once(' ') {
        Some((first, rest)) => (Some(first.to_string()), Some(rest.to_string())),
        None => (Some(name.to_string()), None),
    }
}
