use thiserror::Error;

/// All the ways a storage or transaction operation can fail.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("malformed bytes: {0}")]
    FormatError(String),

    #[error("page has no empty slot")]
    PageFull,

    #[error("tuple is not stored on this page")]
    NotOnPage,

    #[error("no clean page available for eviction")]
    CacheFull,

    #[error("transaction aborted")]
    TransactionAborted,

    #[error("iterator is not open")]
    IteratorNotOpen,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
