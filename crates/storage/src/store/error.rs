#![forbid(unsafe_code)]

use wb_core::{CoreError, ErrorKind, Id};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("parent not found: {0}")]
    ParentNotFound(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("cross-workspace move: {from_workspace} -> {to_workspace}")]
    CrossWorkspaceMove {
        from_workspace: Id,
        to_workspace: Id,
    },
    #[error("user {user_id} is not a member of workspace {workspace_id}")]
    PermissionDenied { user_id: Id, workspace_id: Id },
    #[error("canceled")]
    Canceled,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Sql(_) => ErrorKind::Io,
            Self::Core(err) => err.kind(),
            Self::NotFound(_) | Self::ParentNotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::CrossWorkspaceMove { .. } => ErrorKind::CrossWorkspaceMove,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::Canceled => ErrorKind::Canceled,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().as_str()
    }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            code.code == rusqlite::ErrorCode::ConstraintViolation
        }
        _ => false,
    }
}
