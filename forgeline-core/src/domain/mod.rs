//! Core domain types
//!
//! These types are shared between the runner (which executes and persists
//! them) and the CLI (which builds and displays them).

pub mod blueprint;
pub mod container;
pub mod state;
