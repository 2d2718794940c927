//! Side-effecting collaborators: config, backend, decision service, artifacts.

pub mod backend;
pub mod config;
pub mod decision;
pub mod memory_backend;
pub mod process;
pub mod prompt;
pub mod report;
