use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("object not found: instance {0}")]
    NotFound(u64),
    #[error("attempted to roll back past the root session")]
    NoActiveSession,
}

pub type DbResult<T> = Result<T, DbError>;
