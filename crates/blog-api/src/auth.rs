use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use blog_media::UrlSigner;
use blog_types::api::{
    AuthResponse, Claims, MessageResponse, SignInRequest, SignUpRequest, UpdatePasswordRequest,
};

use crate::error::{MutationError, Result};
use crate::forms;
use crate::mutations::accounts::Account;
use crate::mutations::{Actor, Orchestrator};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub orchestrator: Orchestrator,
    pub signer: UrlSigner,
    pub jwt_secret: String,
}

/// Bearer tokens stay valid for 30 days.
const TOKEN_TTL_DAYS: i64 = 30;

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse> {
    let account = state.orchestrator.sign_up(req).await?;
    let body = auth_response(&state.jwt_secret, account)?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse> {
    let account = state.orchestrator.sign_in(req.email, req.password).await?;
    Ok(Json(auth_response(&state.jwt_secret, account)?))
}

pub async fn user_info(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.orchestrator.user_info(user_id).await?))
}

pub async fn update_user_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    form: Multipart,
) -> Result<impl IntoResponse> {
    let draft = forms::profile_draft(form).await?;
    let info = state
        .orchestrator
        .update_profile(&Actor::from(claims), draft)
        .await?;
    Ok(Json(info))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse> {
    state
        .orchestrator
        .update_password(&Actor::from(claims), req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    state.orchestrator.delete_user(&Actor::from(claims)).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

fn auth_response(secret: &str, account: Account) -> Result<AuthResponse> {
    let token = create_token(secret, account.id, &account.first_name)
        .map_err(|e| MutationError::Internal(format!("token encoding failed: {e}")))?;
    Ok(AuthResponse {
        id: account.id,
        first_name: account.first_name,
        last_name: account.last_name,
        email: account.email,
        token,
    })
}

pub fn create_token(secret: &str, user_id: Uuid, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
