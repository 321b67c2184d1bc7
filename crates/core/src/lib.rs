#![forbid(unsafe_code)]

//! Core types for the workbench backend: identifiers, the payload codec, the
//! ordered-list planners shared by every movable store, and the flow graph
//! model. Nothing in this crate touches the database.

pub mod cancel;
pub mod codec;
mod error;
pub mod flow;
pub mod ids;
pub mod movable;
#[cfg(feature = "sqlite")]
mod sql;
pub mod time;

pub use cancel::CancelToken;
pub use codec::Codec;
pub use error::{CoreError, ErrorKind, RpcCode};
pub use ids::Id;
