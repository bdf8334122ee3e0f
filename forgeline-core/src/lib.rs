//! Forgeline Core
//!
//! Core types shared by the Forgeline crates.
//!
//! This crate contains:
//! - Domain types: the workflow blueprint, the execution checkpoint and
//!   container run options
//!
//! Nothing here performs I/O. Persistence lives in the runner, HTTP in the client.

pub mod domain;

pub use domain::blueprint::Blueprint;
pub use domain::container::{BindMount, RunOptions};
pub use domain::state::{ExecutionState, STATE_SCHEMA_VERSION};
