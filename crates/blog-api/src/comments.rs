use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use blog_types::api::{
    AddCommentRequest, Claims, MessageResponse, ToggleLikeResponse, UpdateCommentRequest,
};

use crate::auth::AppState;
use crate::error::Result;
use crate::mutations::Actor;

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse> {
    state
        .orchestrator
        .add_comment(&Actor::from(claims), post_id, req.message, req.parent_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Comment added successfully")),
    ))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse> {
    state
        .orchestrator
        .update_comment(&Actor::from(claims), post_id, comment_id, req.message)
        .await?;
    Ok(Json(MessageResponse::new("Comment updated successfully")))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    state
        .orchestrator
        .delete_comment(&Actor::from(claims), post_id, comment_id)
        .await?;
    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let add_like = state
        .orchestrator
        .toggle_comment_like(&Actor::from(claims), post_id, comment_id)
        .await?;
    Ok(Json(ToggleLikeResponse { add_like }))
}
