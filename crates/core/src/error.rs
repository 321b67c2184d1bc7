#![forbid(unsafe_code)]

use crate::ids::Id;
use crate::movable::IntegrityViolation;

/// Error classes shared by every layer. Each concrete error type reports one
/// of these through `kind()`, and the RPC layer maps them with `rpc_code()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidId,
    InvalidArgument,
    InvalidState,
    Duplicate,
    IntegrityViolation,
    CrossWorkspaceMove,
    PermissionDenied,
    ConcurrentTailAdvance,
    UnsupportedEncoding,
    Canceled,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::InvalidId => "invalid-id",
            Self::InvalidArgument => "invalid-argument",
            Self::InvalidState => "invalid-state",
            Self::Duplicate => "duplicate",
            Self::IntegrityViolation => "integrity-violation",
            Self::CrossWorkspaceMove => "cross-workspace-move",
            Self::PermissionDenied => "permission-denied",
            Self::ConcurrentTailAdvance => "concurrent-tail-advance",
            Self::UnsupportedEncoding => "unsupported-encoding",
            Self::Canceled => "canceled",
            Self::Io => "io",
        }
    }

    pub fn rpc_code(self) -> RpcCode {
        match self {
            Self::NotFound => RpcCode::NotFound,
            Self::InvalidId | Self::InvalidArgument | Self::InvalidState => {
                RpcCode::InvalidArgument
            }
            Self::IntegrityViolation | Self::Duplicate => RpcCode::FailedPrecondition,
            Self::CrossWorkspaceMove | Self::PermissionDenied => RpcCode::PermissionDenied,
            Self::ConcurrentTailAdvance | Self::UnsupportedEncoding | Self::Canceled | Self::Io => {
                RpcCode::Internal
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RpcCode {
    NotFound,
    InvalidArgument,
    FailedPrecondition,
    PermissionDenied,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid id: {0}")]
    InvalidId(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid state: {field}={value} is outside 0..={max}")]
    InvalidState {
        field: &'static str,
        value: i64,
        max: i64,
    },
    #[error("duplicate id {0}")]
    Duplicate(Id),
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),
    #[error("concurrent tail advance: tail {tail} already has a successor")]
    ConcurrentTailAdvance { tail: Id },
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("codec: {0}")]
    Codec(#[from] std::io::Error),
    #[error("canceled")]
    Canceled,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidId(_) => ErrorKind::InvalidId,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::Integrity(_) => ErrorKind::IntegrityViolation,
            Self::ConcurrentTailAdvance { .. } => ErrorKind::ConcurrentTailAdvance,
            Self::UnsupportedEncoding(_) => ErrorKind::UnsupportedEncoding,
            Self::Codec(_) => ErrorKind::Io,
            Self::Canceled => ErrorKind::Canceled,
        }
    }
}
