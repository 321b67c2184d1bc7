#![forbid(unsafe_code)]

//! Reference executor for workbench flows. A run snapshots the live flow into
//! a version, walks it from the manual-start node, hands each node to the
//! handler registered for its kind, and records one execution row per node
//! attempt.

mod config;
mod error;
mod handler;
mod record;
mod run;
mod snapshot;

pub use config::RunnerConfig;
pub use error::{HandlerError, RunError};
pub use handler::{HandlerRegistry, Iteration, NodeContext, NodeHandler, NodeOutput};
pub use run::{FlowRunner, RunReport};
pub use snapshot::VersionSnapshot;
