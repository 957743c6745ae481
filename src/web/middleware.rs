use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::AppState;
use super::ratelimit::retry_after;
use crate::constants::X_ACCESS_TOKEN;
use crate::error::PipelineError;

/// Rejects requests whose `x-access-token` doesn't match the configured secret.
pub(crate) async fn require_access_token(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(X_ACCESS_TOKEN)
        .and_then(|value| value.to_str().ok());

    match token {
        Some(token) if token == state.config.api_secret_key.expose() => next.run(request).await,
        _ => PipelineError::Unauthorized.into_response(),
    }
}

/// Spends one token from the caller's bucket, or answers 429.
pub(crate) async fn rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&request);
    if state.limiter.try_acquire(&client).await {
        return next.run(request).await;
    }

    debug!("Rate limit hit for {}", client);
    let per_minute = state.limiter.per_minute();
    let mut response = PipelineError::RateLimited { per_minute }.into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after(per_minute).as_secs().to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}

/// The peer IP, or `unknown` when the listener didn't record one.
fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
