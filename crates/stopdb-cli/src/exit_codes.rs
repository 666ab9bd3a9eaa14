//! Unified exit codes for the stopdb CLI.
//! Scripts key off these, so they are part of the public contract.

pub const SUCCESS: i32 = 0;
pub const OPERATION_FAILED: i32 = 1; // A pipeline step or standalone operation failed
pub const CONFIG_ERROR: i32 = 2; // Bad environment or arguments
