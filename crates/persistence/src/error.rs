//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<scylla::transport::errors::QueryError> for PersistenceError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

impl From<scylla::transport::errors::NewSessionError> for PersistenceError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

impl From<PersistenceError> for voice_engine_core::EngineError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(e) => voice_engine_core::EngineError::NotFound(e),
            other => voice_engine_core::EngineError::Fatal(other.to_string()),
        }
    }
}
