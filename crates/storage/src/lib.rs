#![forbid(unsafe_code)]

//! SQLite persistence for the workbench: ordered collections and items,
//! flows, node executions and streaming reads.

mod store;

pub use store::*;
