//! Multi-role marketplace agent simulation.
//!
//! Simulated job posters and service providers take turns perceiving a shared
//! world state, choosing an action and executing it against a marketplace
//! backend, until aggregate goals are met or a limit is hit.
//!
//! - **[`core`]**: Pure, deterministic logic (availability, priority policy,
//!   goal evaluation, reports). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config, backend traits and the
//!   in-memory marketplace, decision service, artifacts).
//!
//! Orchestration modules ([`decide`], [`execute`], [`simulate`]) coordinate
//! core logic with I/O to implement a run.

pub mod core;
pub mod decide;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod simulate;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
