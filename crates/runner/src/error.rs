#![forbid(unsafe_code)]

use wb_core::{CoreError, ErrorKind, Id};
use wb_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("flow {0} has no manual start node")]
    NoStartNode(Id),
    #[error("flow {0} is a version snapshot and cannot be run")]
    VersionNotRunnable(Id),
    #[error("invalid runner config: {0}")]
    InvalidConfig(&'static str),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(err) => err.kind(),
            Self::Core(err) => err.kind(),
            Self::NoStartNode(_) | Self::VersionNotRunnable(_) | Self::InvalidConfig(_) => {
                ErrorKind::InvalidArgument
            }
        }
    }
}

/// Failure reported by a node handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    /// The handler observed the run's cancel token and stopped.
    #[error("canceled")]
    Canceled,
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
