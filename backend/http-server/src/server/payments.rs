//! HTTP surface for the payment lifecycle.
//!
//! Session creation and the status lookups speak JSON; the return callback
//! is a browser-facing redirect target and always answers with a 302 to
//! the frontend status page, except on unrecoverable internal errors.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use domain_types::{errors::PaymentError, payment::normalize_reference};
use gateway_integration::fonepay::types::ReturnCallbackParams;
use http::{header, StatusCode};
use serde_json::json;

use crate::{
    app::AppState,
    callback::ReturnHandler,
    session::{CreateSessionRequest, PaymentSessionManager},
};

/// `POST /api/payments`
pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Response {
    let manager = PaymentSessionManager::new(
        state.config.clone(),
        state.payments.clone(),
        state.contestants.clone(),
    );
    match manager.create_session(request).await {
        Ok(created) => (StatusCode::OK, Json(created)).into_response(),
        Err(report) => {
            let (status, message) = match report.current_context() {
                PaymentError::ValidationError(message) => {
                    (StatusCode::BAD_REQUEST, message.clone())
                }
                PaymentError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, format!("{what} not found"))
                }
                _ => {
                    tracing::error!(?report, "session creation failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal error".to_string(),
                    )
                }
            };
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}

/// `GET /api/payments/return` — the gateway redirects the browser here.
pub async fn payment_return_query(
    State(state): State<AppState>,
    Query(params): Query<ReturnCallbackParams>,
) -> Response {
    handle_return(state, params).await
}

/// `POST /api/payments/return` — same callback by form body.
pub async fn payment_return_form(
    State(state): State<AppState>,
    Form(params): Form<ReturnCallbackParams>,
) -> Response {
    handle_return(state, params).await
}

async fn handle_return(state: AppState, params: ReturnCallbackParams) -> Response {
    let handler = ReturnHandler::new(
        state.config.clone(),
        state.payments.clone(),
        state.contestants.clone(),
    );
    match handler.process(params).await {
        Ok(redirect) => {
            let location = redirect.location(&state.config.gateway.status_page_url);
            found_redirect(&location)
        }
        Err(report) => {
            tracing::error!(?report, "unrecoverable return callback failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal" })),
            )
                .into_response()
        }
    }
}

/// The gateway protocol expects a plain 302 Found, not a 303 or 307.
fn found_redirect(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// `GET /api/payments/status/{prn}` — status can change between polls, so
/// responses are uncacheable.
pub async fn payment_by_reference(
    State(state): State<AppState>,
    Path(prn): Path<String>,
) -> Response {
    let reference = normalize_reference(&prn);
    match state.payments.find_by_reference(&reference).await {
        Ok(Some(session)) => (
            [(header::CACHE_CONTROL, "no-store")],
            Json(session),
        )
            .into_response(),
        Ok(None) => not_found(),
        Err(report) => internal(report),
    }
}

/// `GET /api/payments/id/{id}`
pub async fn payment_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.payments.find_by_id(&id).await {
        Ok(Some(session)) => (
            [(header::CACHE_CONTROL, "no-store")],
            Json(session),
        )
            .into_response(),
        Ok(None) => not_found(),
        Err(report) => internal(report),
    }
}

/// `GET /api/payments`
pub async fn list_payments(State(state): State<AppState>) -> Response {
    match state.payments.list_all().await {
        Ok(sessions) => Json(sessions).into_response(),
        Err(report) => internal(report),
    }
}

/// `GET /api/payments/stats`
pub async fn payment_stats(State(state): State<AppState>) -> Response {
    match state.payments.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(report) => internal(report),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "payment not found" })),
    )
        .into_response()
}

fn internal(report: error_stack::Report<domain_types::errors::StorageError>) -> Response {
    tracing::error!(?report, "payment store failure");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal" })),
    )
        .into_response()
}
