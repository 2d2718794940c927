//! Stable exit codes for marketsim CLI commands.

/// Command succeeded; for `run`, the simulation completed.
pub const OK: i32 = 0;
/// Invalid config, arguments or I/O failure before or after the run.
pub const INVALID: i32 = 1;
/// The simulation finished in the `failed` state.
pub const RUN_FAILED: i32 = 2;
