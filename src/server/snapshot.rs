//! Snapshot endpoint
//!
//! - `GET ?address=` returns the stored snapshot or `null`
//! - `POST ?address=` sanitizes the body and replaces the snapshot

use crate::coerce::validate_address;
use crate::server::body::read_limited;
use crate::server::response::{ApiError, JsonResponse};
use crate::server::{preflight, AppState};
use crate::types::PersistedSnapshot;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct AddressQuery {
    pub address: Option<String>,
}

#[derive(Serialize)]
struct SnapshotBody<'a> {
    ok: bool,
    data: Option<&'a PersistedSnapshot>,
}

#[derive(Serialize)]
struct StoredBody<'a> {
    ok: bool,
    url: &'a str,
    t: i64,
}

/// Dispatch on method for the snapshot endpoint
pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    query: Option<Query<AddressQuery>>,
    body: Body,
) -> Response {
    let address = query.and_then(|Query(q)| q.address).unwrap_or_default();

    let result = match method {
        Method::OPTIONS => return preflight(),
        Method::GET => get_snapshot(&state, &address).await,
        Method::POST => post_snapshot(&state, &address, &headers, body).await,
        _ => Err(ApiError::MethodNotAllowed),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

async fn get_snapshot(state: &AppState, address: &str) -> Result<Response, ApiError> {
    let address = validate_address(address).ok_or(ApiError::InvalidAddress)?;
    let snapshot = state
        .service
        .load_snapshot(&address)
        .await
        .map_err(ApiError::generic)?;

    Ok(JsonResponse(
        StatusCode::OK,
        SnapshotBody {
            ok: true,
            data: snapshot.as_ref(),
        },
    )
    .into_response())
}

async fn post_snapshot(
    state: &AppState,
    address: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    // Reject bad addresses before reading the body
    let address = validate_address(address).ok_or(ApiError::InvalidAddress)?;
    let bytes = read_limited(headers, body, state.max_body_bytes)
        .await
        .map_err(ApiError::generic)?;

    let write = state
        .service
        .save_snapshot(&address, &bytes)
        .await
        .map_err(ApiError::generic)?;

    Ok(JsonResponse(
        StatusCode::OK,
        StoredBody {
            ok: true,
            url: &write.committed.url,
            t: write.snapshot.written_at,
        },
    )
    .into_response())
}
