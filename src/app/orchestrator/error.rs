use thiserror::Error;

use crate::app::relevance::RelevanceError;
use crate::app::renderer::RenderError;
use crate::error::StoreError;
use crate::models::DieselUlid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("user {0} not found")]
    UserNotFound(DieselUlid),

    #[error("payload must not be empty")]
    EmptyPayload,

    #[error("queued message {0} not found")]
    NotFound(DieselUlid),

    #[error("queued message {0} is not in 'queued' status and cannot be superseded")]
    NotQueued(DieselUlid),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Relevance(#[from] RelevanceError),

    #[error("background task panicked")]
    TaskJoin,
}
