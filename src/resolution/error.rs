use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Resolution already in progress for {entity}")]
    Busy { entity: String },
}
