//! Microsoft (Entra ID / Office 365) `OAuth2` provider

use crate::models::OAuth2Provider;
use crate::oauth2::{string_field, NormalizedIdentity, OAuth2Error, ProviderAdapter, ProviderEndpoints};

/// Microsoft `OAuth2` provider using the multi-tenant `common` endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrosoftAdapter;

impl ProviderAdapter for MicrosoftAdapter {
    fn provider(&self) -> OAuth2Provider {
        OAuth2Provider::Microsoft
    }

    fn endpoints(&self) -> ProviderEndpoints {
        ProviderEndpoints {
            authorize_url: "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            token_url: "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            userinfo_url: "https://graph.microsoft.com/v1.0/me",
            scope: "openid email profile User.Read",
        }
    }

    fn extra_auth_params(&self) -> &'static [(&'static str, &'static str)] {
        &[("response_mode", "query"), ("prompt", "select_account")]
    }

    // Graph leaves `mail` null for accounts without an Exchange mailbox
    fn parse_identity(&self, payload: &serde_json::Value) -> Result<NormalizedIdentity, OAuth2Error> {
        let email = string_field(payload, "mail")
            .or_else(|| string_field(payload, "userPrincipalName"));

        NormalizedIdentity::new(
            OAuth2Provider::Microsoft,
            email,
            string_field(payload, "givenName"),
            string_field(payload, "surname"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::ProviderConfig;
    use serde_json::json;

    #[test]
    fn test_parse_identity_prefers_mail() {
        let identity = MicrosoftAdapter
            .parse_identity(&json!({
                "mail": "Jane@Contoso.com",
                "userPrincipalName": "jane_contoso.com#EXT#@tenant.onmicrosoft.com",
                "givenName": "Jane",
                "surname": "Doe"
            }))
            .unwrap();

        assert_eq!(identity.email, "jane@contoso.com");
        assert_eq!(identity.first_name.as_deref(), Some("Jane"));
        assert_eq!(identity.last_name.as_deref(), Some("Doe"));
    }

    #[test]
    fn test_falls_back_to_user_principal_name() {
        let identity = MicrosoftAdapter
            .parse_identity(&json!({ "userPrincipalName": "u@x.com" }))
            .unwrap();
        assert_eq!(identity.email, "u@x.com");

        let identity = MicrosoftAdapter
            .parse_identity(&json!({ "mail": null, "userPrincipalName": "u@x.com" }))
            .unwrap();
        assert_eq!(identity.email, "u@x.com");
    }

    #[test]
    fn test_missing_email() {
        let err = MicrosoftAdapter
            .parse_identity(&json!({ "mail": null, "givenName": "Jane" }))
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::MissingEmail(OAuth2Provider::Microsoft)));
    }

    #[test]
    fn test_auth_url_has_extra_params() {
        let config = ProviderConfig::with_defaults(
            &MicrosoftAdapter,
            "client-1".to_string(),
            "secret-1".to_string(),
            "https://panel.example.com/auth/callback/microsoft".to_string(),
        );
        let url = MicrosoftAdapter.build_auth_url(&config, "s1").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["response_mode"], "query");
        assert_eq!(pairs["prompt"], "select_account");
        assert_eq!(pairs["scope"], "openid email profile User.Read");
    }
}
