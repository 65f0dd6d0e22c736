//! Router assembly for the `blog` binary.

pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use blog_api::auth::{self, AppState, AppStateInner};
use blog_api::forms::MAX_IMAGE_SIZE;
use blog_api::middleware::require_auth;
use blog_api::{EventPublisher, Orchestrator, comments, media, posts};
use blog_db::Database;
use blog_gateway::{Registry, connection};
use blog_media::{LocalMediaStore, MediaStore, UrlSigner};

use crate::config::Config;

/// Open the datastore and bucket named by `config` and wire them to
/// `registry`.
pub async fn app_state(config: &Config, registry: Registry) -> anyhow::Result<AppState> {
    let db = Arc::new(Database::open(&config.db_path)?);
    let signer = UrlSigner::new(config.media_secret.clone(), &config.public_url);
    let media: Arc<dyn MediaStore> =
        Arc::new(LocalMediaStore::new(config.media_dir.clone(), signer.clone()).await?);
    let publisher: Arc<dyn EventPublisher> = Arc::new(registry);

    Ok(Arc::new(AppStateInner {
        orchestrator: Orchestrator::new(db, media, publisher),
        signer,
        jwt_secret: config.jwt_secret.clone(),
    }))
}

pub fn router(app_state: AppState, registry: Registry) -> Router {
    let public_routes = Router::new()
        .route("/auth/signUp", post(auth::sign_up))
        .route("/auth/signIn", post(auth::sign_in))
        .route("/media/{key}", get(media::serve_media))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/userInfo/{user_id}", get(auth::user_info))
        .route("/auth/updateUserInfo", put(auth::update_user_info))
        .route("/auth/updatePassword", put(auth::update_password))
        .route("/auth/deleteUser", delete(auth::delete_user))
        .route("/tags", get(posts::list_tags))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{post_id}", put(posts::update_post).delete(posts::delete_post))
        .route("/posts/{post_id}/toggleLike", post(posts::toggle_like))
        .route("/posts/{post_id}/comments", post(comments::add_comment))
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(
            "/posts/{post_id}/comments/{comment_id}/toggleLike",
            post(comments::toggle_like),
        )
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE + 1024 * 1024))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(registry);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(State(registry): State<Registry>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::serve(socket, registry))
}
