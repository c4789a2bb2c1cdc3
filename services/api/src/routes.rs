//! API service routes

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use common::{
    database,
    models::{Purpose, VerificationRequest},
    verification::{CodeTarget, VerificationStore},
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub mod auth;
pub mod booking;
pub mod flights;


/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/auth/request-code", post(auth::request_code))
        .route("/auth/confirm", post(auth::confirm))
        .route("/requests/:request_id", get(auth::request_status))
        .route("/flights", get(flights::search_flights))
        .route("/flights/:flight_id/seats", get(flights::seat_map))
        .route("/booking/request", post(booking::request_booking))
        .route("/booking/confirm", post(booking::confirm_booking))
        .route("/my/flights", get(booking::my_flights))
        .route("/my/tickets/:ticket_id/cancel", post(booking::cancel_ticket));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service",
        "database": database::health_check(&state.db_pool).await,
    }))
}

/// Consume a code on the caller's transaction, applying the per-subject
/// limit on failed attempts
pub(crate) async fn confirm_code(
    state: &AppState,
    conn: &mut SqliteConnection,
    subject: &str,
    purpose: Purpose,
    target: CodeTarget<'_>,
    code: &str,
) -> ApiResult<VerificationRequest> {
    if !state.rate_limiter.is_allowed(subject).await {
        return Err(ApiError::TooManyRequests);
    }

    match VerificationStore::confirm(conn, subject, purpose, target, code, state.settings.code_ttl)
        .await
    {
        Ok(request) => {
            state.rate_limiter.reset(subject).await;
            Ok(request)
        }
        Err(err) => {
            let err = ApiError::from(err);
            if err.is_code_rejection() {
                state.rate_limiter.record_failure(subject).await;
            }
            Err(err)
        }
    }
}

/// Serialize a notification or request payload
pub(crate) fn to_payload<T: Serialize>(value: &T) -> ApiResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| {
        error!("Failed to serialize payload: {}", e);
        ApiError::InternalServerError
    })
}
