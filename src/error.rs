use thiserror::Error;

/// Wraps the two ways talking to the shared store can fail, so component
/// errors (`OrchestratorError`, `EventProcessorError`, `TaskProcessorError`)
/// can each carry one variant for "the store misbehaved" instead of three.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}
