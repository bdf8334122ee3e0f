//! Container execution
//!
//! - `sanitize`: cleans raw container output lines
//! - `endpoint`: finds a reachable container engine
//! - `runtime`: runs containers and finalizes them
//! - `docker`: the Docker Engine API backend

pub mod docker;
pub mod endpoint;
pub mod runtime;
pub mod sanitize;

#[cfg(test)]
pub(crate) mod testing;

pub use docker::{DockerConnector, DockerEngine};
pub use endpoint::{Endpoint, EndpointResolver, EngineConnector, Resolved};
pub use runtime::{CleanupOutcome, ContainerEngine, ContainerHandle, ContainerRuntime, EngineRuntime};
