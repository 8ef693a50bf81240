//! Callback handling as a forward-only state machine
//!
//! `Start -> StateVerified -> TokenExchanged -> IdentityFetched ->
//! AccountResolved -> SessionEstablished`, or a terminal failure at
//! whichever stage raised it. Nothing after a failed stage runs.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{AccountResolver, TokenExchangeClient, UserInfoClient};
use crate::{
    logging::generate_trace_id,
    models::{OAuth2Provider, SessionToken, UserAccount},
    oauth2::{ErrorCategory, ErrorCode, OAuth2Error, ProviderRegistry, StateStore},
};

/// Progress of one callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CallbackStage {
    Start,
    StateVerified,
    TokenExchanged,
    IdentityFetched,
    AccountResolved,
    SessionEstablished,
}

/// Successful sign-in
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: UserAccount,
    pub session: SessionToken,
}

/// Terminal failure of a sign-in attempt, safe to return to the browser
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackFailure {
    pub error_code: ErrorCode,
    pub message: String,
    pub correlation_id: String,
    #[serde(skip)]
    pub category: ErrorCategory,
    #[serde(skip)]
    pub stage: CallbackStage,
}

impl CallbackFailure {
    fn new(err: &OAuth2Error, stage: CallbackStage, correlation_id: String) -> Self {
        Self {
            error_code: err.code(),
            message: err.user_message(),
            correlation_id,
            category: err.category(),
            stage,
        }
    }
}

impl std::fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

impl std::error::Error for CallbackFailure {}

/// Tracks the current stage so a failure is reported where it happened
struct Progress {
    stage: CallbackStage,
}

impl Progress {
    const fn new() -> Self {
        Self {
            stage: CallbackStage::Start,
        }
    }

    fn advance(&mut self, next: CallbackStage) {
        debug_assert!(next > self.stage, "callback stages only move forward");
        debug!(from = ?self.stage, to = ?next, "Callback stage reached");
        self.stage = next;
    }

    fn fail(&self, err: OAuth2Error) -> (CallbackStage, OAuth2Error) {
        (self.stage, err)
    }
}

/// Runs a provider callback from state check to session
pub struct CallbackOrchestrator {
    registry: Arc<ProviderRegistry>,
    state_store: Arc<dyn StateStore>,
    tokens: TokenExchangeClient,
    userinfo: UserInfoClient,
    accounts: AccountResolver,
}

impl CallbackOrchestrator {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        state_store: Arc<dyn StateStore>,
        tokens: TokenExchangeClient,
        userinfo: UserInfoClient,
        accounts: AccountResolver,
    ) -> Self {
        Self {
            registry,
            state_store,
            tokens,
            userinfo,
            accounts,
        }
    }

    /// Complete a sign-in from the provider's `code` and `state`
    ///
    /// Each attempt gets its own correlation id, carried by every log line
    /// and by the failure body.
    pub async fn handle(
        &self,
        provider: OAuth2Provider,
        code: &str,
        state: &str,
        session_id: &str,
    ) -> Result<LoginOutcome, CallbackFailure> {
        let correlation_id = generate_trace_id();
        let span = info_span!("oauth2_callback", %provider, correlation_id = %correlation_id);

        async move {
            match self.run(provider, code, state, session_id).await {
                Ok(outcome) => {
                    info!(user_id = %outcome.user.id, "OAuth2 sign-in completed");
                    Ok(outcome)
                }
                Err((stage, err)) => {
                    log_failure(stage, &err);
                    Err(CallbackFailure::new(&err, stage, correlation_id))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Failure for a callback that carries the provider's `error` parameter
    /// instead of a code
    #[must_use]
    pub fn provider_denied(&self, provider: OAuth2Provider, error: &str) -> CallbackFailure {
        let correlation_id = generate_trace_id();
        warn!(
            %provider,
            %correlation_id,
            provider_error = known_error_code(error),
            "Provider reported an authorization error"
        );
        CallbackFailure::new(&OAuth2Error::InvalidState, CallbackStage::Start, correlation_id)
    }

    async fn run(
        &self,
        provider: OAuth2Provider,
        code: &str,
        state: &str,
        session_id: &str,
    ) -> Result<LoginOutcome, (CallbackStage, OAuth2Error)> {
        let mut progress = Progress::new();

        let (config, _) = self.registry.usable(provider).map_err(|e| progress.fail(e))?;

        if state.is_empty() || code.is_empty() {
            return Err(progress.fail(OAuth2Error::InvalidState));
        }
        let verified = self
            .state_store
            .verify_and_consume(session_id, provider, state)
            .await
            .unwrap_or_else(|e| {
                error!("State store unavailable, rejecting callback: {e}");
                false
            });
        if !verified {
            return Err(progress.fail(OAuth2Error::InvalidState));
        }
        progress.advance(CallbackStage::StateVerified);

        let token = self
            .tokens
            .exchange(provider, code, &config.redirect_uri)
            .await
            .map_err(|e| progress.fail(e))?;
        progress.advance(CallbackStage::TokenExchanged);

        let identity = self
            .userinfo
            .fetch(provider, &token)
            .await
            .map_err(|e| progress.fail(e))?;
        progress.advance(CallbackStage::IdentityFetched);

        let user = self
            .accounts
            .resolve(&identity)
            .await
            .map_err(|e| progress.fail(e))?;
        progress.advance(CallbackStage::AccountResolved);

        let session = self
            .accounts
            .issue_session(&user)
            .await
            .map_err(|e| progress.fail(e))?;
        progress.advance(CallbackStage::SessionEstablished);

        Ok(LoginOutcome { user, session })
    }
}

fn log_failure(stage: CallbackStage, err: &OAuth2Error) {
    let code = err.code();
    match err.category() {
        ErrorCategory::ProviderCommunication | ErrorCategory::Configuration => {
            error!(?stage, %code, "OAuth2 sign-in failed: {err}");
        }
        ErrorCategory::Account if code == ErrorCode::AccountCreationFailed => {
            error!(?stage, %code, "OAuth2 sign-in failed: {err}");
        }
        _ => warn!(?stage, %code, "OAuth2 sign-in failed: {err}"),
    }
}

/// Authorization error codes from RFC 6749 section 4.1.2.1
const AUTHORIZATION_ERROR_CODES: [&str; 7] = [
    "invalid_request",
    "unauthorized_client",
    "access_denied",
    "unsupported_response_type",
    "invalid_scope",
    "server_error",
    "temporarily_unavailable",
];

/// The `error` parameter comes from the query string; only standard codes
/// are logged verbatim.
fn known_error_code(error: &str) -> &'static str {
    AUTHORIZATION_ERROR_CODES
        .iter()
        .find(|code| **code == error)
        .copied()
        .unwrap_or("unrecognized")
}
