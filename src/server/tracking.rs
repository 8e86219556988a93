//! Tracking endpoint
//!
//! - `GET` returns every session record and the name directory
//! - `POST` applies one start/beat/end/name event

use crate::pipeline::now_millis;
use crate::server::body::read_limited;
use crate::server::response::{ApiError, JsonResponse};
use crate::server::{preflight, AppState};
use crate::tracking::{NameDirectory, SessionRecord};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct StateBody<'a> {
    ok: bool,
    sessions: &'a [SessionRecord],
    names: &'a NameDirectory,
    ts: i64,
}

#[derive(Serialize)]
struct AckBody {
    ok: bool,
}

/// Dispatch on method for the tracking endpoint
pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let result = match method {
        Method::OPTIONS => return preflight(),
        Method::GET => get_state(&state).await,
        Method::POST => post_event(&state, &headers, body).await,
        _ => Err(ApiError::MethodNotAllowed),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

async fn get_state(state: &AppState) -> Result<Response, ApiError> {
    let tracking = state
        .service
        .tracking_state()
        .await
        .map_err(ApiError::detailed)?;

    Ok(JsonResponse(
        StatusCode::OK,
        StateBody {
            ok: true,
            sessions: &tracking.sessions,
            names: &tracking.names,
            ts: now_millis(),
        },
    )
    .into_response())
}

async fn post_event(state: &AppState, headers: &HeaderMap, body: Body) -> Result<Response, ApiError> {
    let bytes = read_limited(headers, body, state.max_body_bytes)
        .await
        .map_err(ApiError::detailed)?;
    state
        .service
        .track(&bytes)
        .await
        .map_err(ApiError::detailed)?;

    Ok(JsonResponse(StatusCode::OK, AckBody { ok: true }).into_response())
}
