use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;

use crate::auth::AppState;
use crate::error::{MutationError, Result};

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// GET /media/{key}?expires=..&signature=..: serves an object to anyone
/// holding a valid, unexpired signed URL.
pub async fn serve_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse> {
    if !state.signer.verify(&key, query.expires, &query.signature) {
        warn!("Rejected media request for {} (bad or expired signature)", key);
        return Err(MutationError::unauthorized("Invalid or expired media URL"));
    }

    let bytes = state.orchestrator.media().get(&key).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type(&key))],
        bytes,
    ))
}

fn content_type(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
