//! Data Connector webhook endpoint — the single inbound entry point.
//!
//! Each delivery runs the same short pipeline with early exits:
//! authenticate the raw request, parse it, derive the label mutation, then
//! forward it to the platform under the invocation's time budget. The
//! sender only ever sees an HTTP status; failure detail stays in the logs.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use sl_domain::error::Error;
use sl_domain::event::VerifiedPayload;
use sl_domain::transform::{transform, OutboundMutation};

use super::signature;
use crate::state::AppState;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// `POST /v1/connector`
///
/// Status contract for the sender: 200 processed, 400 malformed or
/// unsupported (acknowledged, do not redeliver), 401 signature failure,
/// 500 permanent platform error, 502 platform auth failure, 503 platform
/// unavailable or budget exhausted.
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // 1. Authenticate the delivery before touching anything else.
    let provided = headers
        .get(state.config.connector.signature_header.as_str())
        .and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(
        &body,
        provided,
        &state.signature_secret,
        state.config.connector.replay_leeway_secs,
    ) {
        tracing::warn!(error = %e, "rejected unauthenticated delivery");
        return api_error(StatusCode::UNAUTHORIZED, "signature verification failed");
    }

    // 2. Parse the now-trusted body.
    let payload = match VerifiedPayload::parse(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "malformed event payload");
            return api_error(StatusCode::BAD_REQUEST, "malformed event payload");
        }
    };

    // 3. Derive the outbound mutation.
    let mutation = match transform(&payload) {
        Ok(m) => m,
        Err(Error::UnsupportedEvent(kind)) => {
            // Expected for event types outside scope — acknowledged so the
            // sender does not keep redelivering.
            tracing::info!(kind = %kind, device = %payload.device_id, "ignoring unsupported event type");
            return api_error(StatusCode::BAD_REQUEST, "unsupported event type");
        }
        Err(e) => {
            tracing::warn!(error = %e, "event could not be transformed");
            return api_error(StatusCode::BAD_REQUEST, "unsupported event payload");
        }
    };

    // 4. Authenticate to the platform and forward, inside the budget.
    let budget = Duration::from_millis(state.config.connector.budget_ms);
    match tokio::time::timeout(budget, forward(&state, &mutation)).await {
        Ok(Ok(())) => {
            tracing::info!(
                device = %mutation.device_id,
                label = %mutation.label_key,
                "event forwarded"
            );
            (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
        }
        Ok(Err(e)) => failure_response(e),
        Err(_) => {
            tracing::error!(
                budget_ms = state.config.connector.budget_ms,
                device = %mutation.device_id,
                "invocation budget exhausted mid-forward"
            );
            api_error(StatusCode::SERVICE_UNAVAILABLE, "upstream forward timed out")
        }
    }
}

/// Token acquisition plus the outbound call, with the single forced-refresh
/// retry when the platform rejects a cached token that has not actually
/// reached its expiry.
async fn forward(state: &AppState, mutation: &OutboundMutation) -> sl_domain::error::Result<()> {
    let token = state.tokens.get().await?;

    match state.devices.set_label(mutation, &token).await {
        Ok(_) => Ok(()),
        Err(Error::Auth(msg)) => {
            tracing::warn!(error = %msg, "platform rejected cached token, forcing refresh");
            let fresh = state.tokens.refresh_if_same(&token).await?;
            state.devices.set_label(mutation, &fresh).await.map(|_| ())
        }
        Err(e) => Err(e),
    }
}

/// Map a downstream failure to the response the sender sees.
fn failure_response(err: Error) -> Response {
    match err {
        Error::Auth(e) => {
            tracing::error!(error = %e, "platform auth failed after forced refresh");
            api_error(StatusCode::BAD_GATEWAY, "platform authentication failed")
        }
        Error::Transient(e) | Error::Timeout(e) => {
            tracing::error!(error = %e, "platform unavailable after retries");
            api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "platform temporarily unavailable",
            )
        }
        Error::Permanent(e) => {
            tracing::error!(error = %e, "permanent platform error");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "platform rejected the update",
            )
        }
        other => {
            tracing::error!(error = %other, "unexpected forward failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
