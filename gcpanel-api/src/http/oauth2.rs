//! `OAuth2` HTTP handlers
//!
//! The browser is tied to its outstanding state tokens through the
//! `gcpanel_sid` cookie; the core never sees the request itself.

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use nanoid::nanoid;
use serde::Deserialize;
use tracing::debug;

use gcpanel_core::oauth2::ProviderSummary;

use super::{error::CallbackRejection, AppError, AppResult, AppState};

/// Name of the cookie identifying the browser session
pub const SESSION_COOKIE: &str = "gcpanel_sid";

const SESSION_ID_MAX_LEN: usize = 64;

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the user declined or the provider failed
    pub error: Option<String>,
}

/// List providers with their availability
///
/// GET /auth/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderSummary>> {
    Json(state.oauth2_service.providers())
}

/// Start sign-in and redirect to the provider
///
/// GET /auth/login/{provider}
pub async fn login(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let provider = state.oauth2_service.provider(&provider)?;

    let (session_id, fresh) = match session_id(&headers) {
        Some(id) => (id, false),
        None => (nanoid!(32), true),
    };

    let request = state
        .oauth2_service
        .begin_login(provider, &session_id)
        .await?;

    let location = HeaderValue::from_str(&request.url)
        .map_err(|_| AppError::internal_server_error("Invalid authorization URL"))?;

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(LOCATION, location);
    if fresh {
        let secure = state.oauth2_service.secure_cookies(provider);
        let cookie = HeaderValue::from_str(&session_cookie(&session_id, secure))
            .map_err(|_| AppError::internal_server_error("Invalid session cookie"))?;
        response.headers_mut().insert(SET_COOKIE, cookie);
        debug!(%provider, "Assigned new sign-in session");
    }

    Ok(response)
}

/// Finish sign-in
///
/// GET /auth/callback/{provider}?code=xxx&state=xxx
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    let service = &state.oauth2_service;

    let provider = match service.provider(&provider) {
        Ok(provider) => provider,
        Err(e) => return AppError::from(e).into_response(),
    };

    if let Some(error) = params.error.as_deref() {
        return CallbackRejection(service.provider_denied(provider, error)).into_response();
    }

    // Without the cookie no stored state can match
    let session_id = session_id(&headers).unwrap_or_default();

    match service
        .handle_callback(
            provider,
            params.code.as_deref().unwrap_or_default(),
            params.state.as_deref().unwrap_or_default(),
            &session_id,
        )
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(failure) => CallbackRejection(failure).into_response(),
    }
}

/// Session id from the request cookies, if present and well formed
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| is_valid_session_id(value))
        .map(str::to_string)
}

fn is_valid_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= SESSION_ID_MAX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn session_cookie(session_id: &str, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={session_id}; Path=/auth; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
