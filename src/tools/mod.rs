//! Command Execution Subsystem
//!
//! This module runs commands that the policy engine has already authorized.
//!
//! # Guarantees
//!
//! - **Single classification**: the executor only accepts an [`AllowedCommand`],
//!   which only the policy engine can issue, and never re-validates it
//! - **Verbatim pass-through**: the command string reaches `sh -c` unchanged
//! - **Exit status propagation**: the real exit code is returned, with signal
//!   deaths mapped to `128 + signal`
//! - **Cleanup**: capture spool files are removed on every path, and on
//!   timeout or interrupt the child's whole process group is killed and the
//!   shell reaped
//!
//! # Architecture
//!
//! The module is organized into:
//! - `executor.rs`: Subprocess execution and result reporting
//! - `timeout.rs`: Optional wall-clock limit
//! - `capture.rs`: Temporary-file spool for captured output
//! - `process_group.rs`: Process-group isolation and kill
//!
//! [`AllowedCommand`]: crate::policy::AllowedCommand

mod capture;
mod executor;
mod process_group;
mod timeout;

pub use capture::{CaptureSpool, CapturedOutput};
pub use executor::{
    CommandExecutor, ExecutionResult, ExecutorConfig, DEFAULT_SHELL, EXIT_INTERRUPTED,
    EXIT_TIMEOUT, MAX_OUTPUT_SIZE,
};
pub use timeout::ExecutionTimeout;
