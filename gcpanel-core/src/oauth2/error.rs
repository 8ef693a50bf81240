//! Failure taxonomy of the sign-in flow
//!
//! Every failure is terminal: the user restarts from the login button.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{OAuth2Provider, UserStatus};

/// Machine readable reason returned to the web layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    UnknownProvider,
    InvalidState,
    ProviderNotConfigured,
    TokenExchangeFailed,
    UserInfoFailed,
    MissingEmail,
    AccountDisabled,
    AccountCreationFailed,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownProvider => "UnknownProvider",
            Self::InvalidState => "InvalidState",
            Self::ProviderNotConfigured => "ProviderNotConfigured",
            Self::TokenExchangeFailed => "TokenExchangeFailed",
            Self::UserInfoFailed => "UserInfoFailed",
            Self::MissingEmail => "MissingEmail",
            Self::AccountDisabled => "AccountDisabled",
            Self::AccountCreationFailed => "AccountCreationFailed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used for HTTP status selection and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Provider unknown or lacking credentials
    Configuration,
    /// State missing, mismatched, expired or replayed
    State,
    /// Network failure or non-2xx from the provider
    ProviderCommunication,
    /// No usable email in the provider's answer
    Identity,
    /// Account disabled/pending, or creation failed
    Account,
}

#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Unknown OAuth2 provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth2 provider {0} is not configured")]
    NotConfigured(OAuth2Provider),

    #[error("Invalid or expired OAuth2 state")]
    InvalidState,

    #[error("Token exchange with {provider} failed: {detail}")]
    TokenExchangeFailed {
        provider: OAuth2Provider,
        detail: String,
    },

    #[error("Fetching user info from {provider} failed: {detail}")]
    UserInfoFailed {
        provider: OAuth2Provider,
        detail: String,
    },

    #[error("{0} returned no usable email address")]
    MissingEmail(OAuth2Provider),

    #[error("Account is {0}")]
    AccountDisabled(UserStatus),

    #[error("Account creation failed: {0}")]
    AccountCreationFailed(String),
}

impl OAuth2Error {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownProvider(_) => ErrorCode::UnknownProvider,
            Self::NotConfigured(_) => ErrorCode::ProviderNotConfigured,
            Self::InvalidState => ErrorCode::InvalidState,
            Self::TokenExchangeFailed { .. } => ErrorCode::TokenExchangeFailed,
            Self::UserInfoFailed { .. } => ErrorCode::UserInfoFailed,
            Self::MissingEmail(_) => ErrorCode::MissingEmail,
            Self::AccountDisabled(_) => ErrorCode::AccountDisabled,
            Self::AccountCreationFailed(_) => ErrorCode::AccountCreationFailed,
        }
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownProvider(_) | Self::NotConfigured(_) => ErrorCategory::Configuration,
            Self::InvalidState => ErrorCategory::State,
            Self::TokenExchangeFailed { .. } | Self::UserInfoFailed { .. } => {
                ErrorCategory::ProviderCommunication
            }
            Self::MissingEmail(_) => ErrorCategory::Identity,
            Self::AccountDisabled(_) | Self::AccountCreationFailed(_) => ErrorCategory::Account,
        }
    }

    /// Message safe to show to the person signing in
    ///
    /// Never includes provider error bodies, tokens or codes.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownProvider(name) => format!("Sign-in with \"{name}\" is not supported."),
            Self::NotConfigured(provider) => format!(
                "{} sign-in is currently unavailable. Contact your administrator.",
                provider.display_name()
            ),
            Self::InvalidState => {
                "Your sign-in session expired or was already used. Please start again.".to_string()
            }
            Self::TokenExchangeFailed { provider, .. } => format!(
                "Could not complete sign-in with {}. Please try again.",
                provider.display_name()
            ),
            Self::UserInfoFailed { provider, .. } => format!(
                "Could not read your profile from {}. Please try again.",
                provider.display_name()
            ),
            Self::MissingEmail(provider) => format!(
                "Your {} account did not share an email address, which is required to sign in.",
                provider.display_name()
            ),
            Self::AccountDisabled(UserStatus::Pending) => {
                "Your account is pending approval. Contact your administrator.".to_string()
            }
            Self::AccountDisabled(_) => {
                "Your account is disabled. Contact your administrator.".to_string()
            }
            Self::AccountCreationFailed(_) => {
                "Your account could not be created. Please try again later.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_categories() {
        let err = OAuth2Error::TokenExchangeFailed {
            provider: OAuth2Provider::Google,
            detail: "HTTP 400".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::TokenExchangeFailed);
        assert_eq!(err.category(), ErrorCategory::ProviderCommunication);

        assert_eq!(OAuth2Error::InvalidState.category(), ErrorCategory::State);
        assert_eq!(
            OAuth2Error::NotConfigured(OAuth2Provider::Procore).code(),
            ErrorCode::ProviderNotConfigured
        );
        assert_eq!(
            OAuth2Error::MissingEmail(OAuth2Provider::Microsoft).category(),
            ErrorCategory::Identity
        );
    }

    #[test]
    fn test_user_message_hides_detail() {
        let err = OAuth2Error::UserInfoFailed {
            provider: OAuth2Provider::Microsoft,
            detail: "error sending request for url (https://graph.microsoft.com/v1.0/me)".to_string(),
        };
        let message = err.user_message();
        assert!(message.contains("Microsoft Office 365"));
        assert!(!message.contains("graph.microsoft.com"));
    }

    #[test]
    fn test_disabled_message_is_actionable() {
        let message = OAuth2Error::AccountDisabled(UserStatus::Disabled).user_message();
        assert!(message.contains("disabled"));
        assert!(message.contains("administrator"));
    }

    #[test]
    fn test_error_code_serializes_pascal_case() {
        let json = serde_json::to_string(&ErrorCode::ProviderNotConfigured).unwrap();
        assert_eq!(json, "\"ProviderNotConfigured\"");
    }
}
