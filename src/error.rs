use uuid::Uuid;

use crate::ValidationErrors;

/// Error type for the backing store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate key {id} in {kind}")]
    Conflict { kind: &'static str, id: Uuid },

    #[error("No {kind} row with key {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Store is closed")]
    Closed,

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for unit-of-work operations
#[derive(Debug, thiserror::Error)]
pub enum UnitOfWorkError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Entity kind `{0}` is not registered")]
    UnregisteredEntity(&'static str),

    #[error("Entity kind `{0}` is already bound to another type")]
    KindConflict(&'static str),

    #[error("Unit of work has been disposed")]
    Disposed,

    #[error("Persistence context is in use")]
    Busy,
}

/// Result type for unit-of-work operations
pub type UnitOfWorkResult<T> = Result<T, UnitOfWorkError>;
