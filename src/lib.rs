//! Shell Guard Library
//!
//! A lexical guardrail for user-supplied shell commands: the policy engine
//! classifies a command string as allowed or blocked, and the executor runs
//! allowed commands and reports their exit status.

pub mod config;
pub mod error;
pub mod policy;
pub mod tools;

pub use error::{GuardError, Result};
pub use policy::{AllowedCommand, Decision, Mode, PatternLibrary, PolicyEngine, RuleKind};
pub use tools::{CommandExecutor, ExecutionResult, ExecutorConfig};
