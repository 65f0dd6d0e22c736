use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use blog_types::api::{Claims, MessageResponse, ToggleLikeResponse};

use crate::auth::AppState;
use crate::error::Result;
use crate::forms;
use crate::mutations::Actor;

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.orchestrator.list_tags().await?))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.orchestrator.list_posts(claims.sub).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    form: Multipart,
) -> Result<impl IntoResponse> {
    let draft = forms::post_draft(form).await?;
    state
        .orchestrator
        .create_post(&Actor::from(claims), draft)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Post added successfully")),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    form: Multipart,
) -> Result<impl IntoResponse> {
    let draft = forms::post_draft(form).await?;
    state
        .orchestrator
        .update_post(&Actor::from(claims), post_id, draft)
        .await?;
    Ok(Json(MessageResponse::new("Post updated")))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    state
        .orchestrator
        .delete_post(&Actor::from(claims), post_id)
        .await?;
    Ok(Json(MessageResponse::new("Post deleted")))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let add_like = state
        .orchestrator
        .toggle_post_like(&Actor::from(claims), post_id)
        .await?;
    Ok(Json(ToggleLikeResponse { add_like }))
}
