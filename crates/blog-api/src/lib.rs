//! REST handlers and the mutation layer behind them.

pub mod auth;
pub mod comments;
pub mod error;
pub mod forms;
pub mod media;
pub mod middleware;
pub mod mutations;
pub mod posts;
pub mod publisher;
pub mod views;

pub use auth::{AppState, AppStateInner};
pub use error::MutationError;
pub use mutations::{Actor, Orchestrator, Upload};
pub use publisher::EventPublisher;
