use thiserror::Error;

use crate::error::StoreError;
use crate::models::DieselUlid;

#[derive(Debug, Error)]
pub enum TaskProcessorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("task {0} not found")]
    NotFound(DieselUlid),
}
