//! Resumable pipeline execution
//!
//! - `stage`: the contract every stage implements
//! - `store`: checkpoint persistence
//! - `lock`: advisory lock on the checkpoint
//! - `runner`: the sequential, checkpointing executor

pub mod lock;
pub mod runner;
pub mod stage;
pub mod store;

pub use lock::StateLock;
pub use runner::{RunMode, RunReport, StageRunner};
pub use stage::{Stage, StageContext};
pub use store::StateStore;
