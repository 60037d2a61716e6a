use thiserror::Error;

use crate::error::StoreError;
use crate::models::DieselUlid;

#[derive(Debug, Error)]
pub enum EventProcessorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("event {0} not found")]
    NotFound(DieselUlid),

    #[error("event {0} is already processed")]
    AlreadyProcessed(DieselUlid),
}
