//! Deterministic, pure logic shared by the simulation.
//!
//! Core modules must be free of I/O side effects. They operate on the
//! in-memory world model and return outputs suitable for tests. The only
//! nondeterminism is an injected `rand::Rng`.

pub mod availability;
pub mod catalog;
pub mod goals;
pub mod policy;
pub mod report;
pub mod summary;
pub mod types;
pub mod world;
