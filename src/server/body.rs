//! Request body reading with a byte ceiling

use crate::error::PointsError;
use axum::body::Body;
use axum::http::{header, HeaderMap};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

/// Read a request body, aborting as soon as it exceeds `limit` bytes.
///
/// A declared `Content-Length` above the limit is rejected without reading.
pub async fn read_limited(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, PointsError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(PointsError::PayloadTooLarge { limit });
    }

    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            PointsError::InvalidPayload(format!("failed to read request body: {e}"))
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(PointsError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
