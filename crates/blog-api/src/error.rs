use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use blog_crypto::CredentialError;
use blog_db::TxError;
use blog_media::MediaError;
use blog_types::api::MessageResponse;

/// Every way a request-driven mutation can fail.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("stored credential is malformed")]
    MalformedCredential,

    #[error("media store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("could not resolve tag {0:?}")]
    TagResolutionFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = MutationError> = std::result::Result<T, E>;

impl MutationError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MalformedCredential
            | Self::TransactionFailed(_)
            | Self::TagResolutionFailed(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MutationError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        // Server-side detail stays in the log.
        let message = match &self {
            Self::MalformedCredential | Self::TransactionFailed(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}

impl From<TxError<MutationError>> for MutationError {
    fn from(e: TxError<MutationError>) -> Self {
        match e {
            TxError::Aborted(inner) => inner,
            TxError::Begin(e) | TxError::Commit(e) => Self::TransactionFailed(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for MutationError {
    fn from(e: anyhow::Error) -> Self {
        Self::TransactionFailed(e.to_string())
    }
}

impl From<MediaError> for MutationError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            MediaError::NotFound(key) => Self::NotFound(format!("media object {key}")),
            MediaError::InvalidKey(key) => Self::ValidationFailed(format!("invalid media key {key:?}")),
        }
    }
}

impl From<CredentialError> for MutationError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Malformed(_) => Self::MalformedCredential,
            CredentialError::Kdf(msg) => Self::Internal(msg),
        }
    }
}

impl From<tokio::task::JoinError> for MutationError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", e);
        Self::Internal(e.to_string())
    }
}
