use thiserror::Error;

/// Errors surfaced by [`crate::storage::Store`].
///
/// Lookups that simply find nothing are not errors; they come back as
/// `Ok(None)` or `Ok(false)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("target already exists: {url}")]
    Duplicate { url: String },
    #[error("target not found: {0}")]
    NotFound(i64),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConfigError(pub String);
