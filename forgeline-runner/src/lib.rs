//! Forgeline Runner
//!
//! The execution side of Forgeline: a resumable, checkpointed stage runner
//! and the container runtime its stages use.
//!
//! Layout:
//! - `engine`: endpoint resolution, container runtime, output sanitizer
//! - `pipeline`: stage contract, checkpoint store and the stage runner
//! - `provider`: GitLab publishing and the Terraform provisioner
//! - `stages`: the scaffold, scm and provision stages
//! - `config`: environment-driven configuration

pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod stages;

pub use config::Config;
pub use error::{PipelineError, RuntimeError, StateError};
pub use pipeline::{RunMode, RunReport, Stage, StageContext, StageRunner, StateStore};
pub use provider::ProviderFactory;
