//! Error Types
//!
//! This module defines the error taxonomy for the guardrail and the mapping
//! from each error class to the process exit code surfaced by the CLI.

use crate::policy::RuleKind;

/// Exit code for a malformed invocation (missing/extra arguments, empty command)
pub const EXIT_USAGE: i32 = 2;

/// Exit code for a command rejected by the policy in safe mode
pub const EXIT_POLICY_BLOCK: i32 = 3;

/// Exit code when the shell itself could not be started
pub const EXIT_SPAWN_FAILURE: i32 = 127;

/// Exit code for configuration, I/O and other internal failures
pub const EXIT_INTERNAL: i32 = 1;

/// Error types for guardrail operations
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Command was empty or whitespace-only
    #[error("usage error: command must not be empty")]
    EmptyCommand,

    /// Command rejected by a policy rule
    #[error("blocked ({kind}): {reason}")]
    PolicyBlock { kind: RuleKind, reason: String },

    /// The subprocess could not be started at all
    #[error("failed to start '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while supervising the subprocess or its capture spool
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pattern in the library could not be compiled
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl GuardError {
    /// Process exit code for this error class
    pub fn exit_code(&self) -> i32 {
        match self {
            GuardError::EmptyCommand => EXIT_USAGE,
            GuardError::PolicyBlock { .. } => EXIT_POLICY_BLOCK,
            GuardError::Spawn { .. } => EXIT_SPAWN_FAILURE,
            GuardError::Io(_) | GuardError::InvalidPattern(_) | GuardError::Config(_) => {
                EXIT_INTERNAL
            }
        }
    }
}

impl From<regex::Error> for GuardError {
    fn from(err: regex::Error) -> Self {
        GuardError::InvalidPattern(err.to_string())
    }
}

/// Result alias for guardrail operations
pub type Result<T> = std::result::Result<T, GuardError>;
