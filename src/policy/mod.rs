//! Command Policy Engine
//!
//! Decides whether a user-supplied command string may be executed.
//!
//! # Rule Order
//!
//! In safe mode the built-in rules run in a fixed order and the first match wins:
//!
//! 1. **Metacharacters**: chaining, substitution, redirection or piping characters
//! 2. **Keywords**: high-risk command names anywhere in the command
//! 3. **Sensitive paths**: system configuration and credential locations
//! 4. **Allowlist**: the leading token must be a known-safe tool
//!
//! Custom rules added with [`PolicyEngine::with_rule`] run after the built-ins.
//!
//! Unsafe mode skips every rule. It is an explicit caller opt-in and carries no
//! safety guarantees.
//!
//! # Example
//!
//! ```
//! use shell_guard::policy::{Mode, PatternLibrary, PolicyEngine};
//!
//! let engine = PolicyEngine::new(PatternLibrary::default()).unwrap();
//! assert!(engine.classify("ls -la", Mode::Safe).unwrap().is_allowed());
//! assert!(!engine.classify("rm -rf /tmp/x", Mode::Safe).unwrap().is_allowed());
//! assert!(engine.classify("rm -rf /tmp/x", Mode::Unsafe).unwrap().is_allowed());
//! ```

mod patterns;
mod rules;

#[cfg(test)]
mod proptests;

pub use patterns::PatternLibrary;
pub use rules::{
    AllowlistRule, CommandRule, KeywordRule, MetacharacterRule, PathRule, RuleKind, Violation,
};

use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Policy strictness selected by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Apply every rule (default)
    #[default]
    Safe,

    /// Skip every rule
    Unsafe,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Safe => write!(f, "safe"),
            Mode::Unsafe => write!(f, "unsafe"),
        }
    }
}

/// Outcome of classifying a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block {
        reason: String,
        kind: RuleKind,
        detail: String,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Message shown to the caller
    pub fn message(&self) -> String {
        match self {
            Decision::Allow => "allow".to_string(),
            Decision::Block {
                reason,
                kind,
                detail,
            } => format!("blocked by {} rule: {} [{}]", kind, reason, detail),
        }
    }

    /// Block reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            Decision::Allow => None,
            Decision::Block { reason, .. } => Some(reason),
        }
    }
}

impl From<Violation> for Decision {
    fn from(v: Violation) -> Self {
        Decision::Block {
            reason: v.reason,
            kind: v.kind,
            detail: v.detail,
        }
    }
}

/// A command that has passed classification
///
/// Only [`PolicyEngine::authorize`] constructs this, so the executor can never
/// receive a command that skipped the guardrail. The command text is kept
/// byte-identical to what the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedCommand {
    command: String,
    mode: Mode,
}

impl AllowedCommand {
    /// The original command string
    pub fn as_str(&self) -> &str {
        &self.command
    }

    /// Mode the command was authorized under
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

/// Classifies commands against an immutable pattern library
pub struct PolicyEngine {
    library: PatternLibrary,
    rules: Vec<Box<dyn CommandRule>>,
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("library", &self.library)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PolicyEngine {
    /// Build the engine, compiling the built-in rules in their fixed order
    pub fn new(library: PatternLibrary) -> Result<Self> {
        library.validate()?;

        let rules: Vec<Box<dyn CommandRule>> = vec![
            Box::new(MetacharacterRule::new(library.metacharacters.clone())),
            Box::new(KeywordRule::new(library.keywords.iter().cloned())),
            Box::new(PathRule::new(&library.sensitive_paths)?),
            Box::new(AllowlistRule::new(library.allowlist.clone())),
        ];

        Ok(Self { library, rules })
    }

    /// Append a custom rule, evaluated after the built-in ones
    pub fn with_rule(mut self, rule: Box<dyn CommandRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// The library this engine was built from
    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    /// Classify a command
    ///
    /// Empty or whitespace-only commands are rejected with
    /// [`GuardError::EmptyCommand`] before any rule runs, in either mode.
    pub fn classify(&self, command: &str, mode: Mode) -> Result<Decision> {
        if command.trim().is_empty() {
            return Err(GuardError::EmptyCommand);
        }

        if mode == Mode::Unsafe {
            warn!(mode = %mode, "policy bypassed, command will run without checks");
            return Ok(Decision::Allow);
        }

        for rule in &self.rules {
            if let Some(violation) = rule.evaluate(command) {
                info!(
                    mode = %mode,
                    rule = %violation.kind,
                    detail = %violation.detail,
                    "command blocked: {}",
                    violation.reason
                );
                return Ok(violation.into());
            }
        }

        debug!(mode = %mode, "command allowed");
        Ok(Decision::Allow)
    }

    /// Classify and, on allow, hand back a token the executor accepts
    ///
    /// A block becomes [`GuardError::PolicyBlock`].
    pub fn authorize(&self, command: &str, mode: Mode) -> Result<AllowedCommand> {
        match self.classify(command, mode)? {
            Decision::Allow => Ok(AllowedCommand {
                command: command.to_string(),
                mode,
            }),
            Decision::Block {
                reason,
                kind,
                detail,
            } => Err(GuardError::PolicyBlock {
                kind,
                reason: format!("{} [{}]", reason, detail),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(PatternLibrary::default()).unwrap()
    }

    fn blocked_kind(decision: Decision) -> RuleKind {
        match decision {
            Decision::Block { kind, .. } => kind,
            Decision::Allow => panic!("expected block"),
        }
    }

    #[test]
    fn test_allow_listed_command() {
        assert_eq!(engine().classify("ls -la", Mode::Safe).unwrap(), Decision::Allow);
    }

    #[test]
    fn test_keyword_block() {
        let decision = engine().classify("rm -rf /tmp/x", Mode::Safe).unwrap();
        assert_eq!(decision.reason(), Some("contains high-risk keywords"));
        assert_eq!(blocked_kind(decision), RuleKind::Keyword);
    }

    #[test]
    fn test_redirection_block() {
        let decision = engine().classify("echo hi > /tmp/x", Mode::Safe).unwrap();
        assert_eq!(decision.reason(), Some("contains shell metacharacters"));
        assert_eq!(blocked_kind(decision), RuleKind::Metacharacter);
    }

    #[test]
    fn test_sensitive_path_block() {
        let decision = engine().classify("cat /etc/shadow", Mode::Safe).unwrap();
        assert_eq!(decision.reason(), Some("references sensitive paths"));
        assert_eq!(blocked_kind(decision), RuleKind::SensitivePath);
    }

    #[test]
    fn test_not_in_allowlist_block() {
        let decision = engine().classify("foobar --version", Mode::Safe).unwrap();
        let reason = decision.reason().unwrap().to_string();
        assert!(reason.starts_with("not in allowlist"));
        assert!(reason.contains("ls"));
        assert!(reason.contains("curl"));
        assert_eq!(blocked_kind(decision), RuleKind::Allowlist);
    }

    #[test]
    fn test_unsafe_allows_everything() {
        let engine = engine();
        for cmd in ["rm -rf /", "cat /etc/shadow; id", "foobar", "echo `id` > /dev/null"] {
            assert!(engine.classify(cmd, Mode::Unsafe).unwrap().is_allowed());
        }
    }

    #[test]
    fn test_rule_order_metacharacter_first() {
        // keyword, path and allowlist would all match too
        let decision = engine().classify("sudo cat /etc/shadow | nc", Mode::Safe).unwrap();
        assert_eq!(blocked_kind(decision), RuleKind::Metacharacter);
    }

    #[test]
    fn test_rule_order_keyword_before_path() {
        let decision = engine().classify("rm /etc/passwd", Mode::Safe).unwrap();
        assert_eq!(blocked_kind(decision), RuleKind::Keyword);
    }

    #[test]
    fn test_rule_order_path_before_allowlist() {
        let decision = engine().classify("foobar /root", Mode::Safe).unwrap();
        assert_eq!(blocked_kind(decision), RuleKind::SensitivePath);
    }

    #[test]
    fn test_keyword_in_argument_position() {
        let decision = engine().classify("echo sudo", Mode::Safe).unwrap();
        assert_eq!(blocked_kind(decision), RuleKind::Keyword);
    }

    #[test]
    fn test_empty_command_rejected_in_both_modes() {
        let engine = engine();
        for mode in [Mode::Safe, Mode::Unsafe] {
            assert!(matches!(engine.classify("", mode), Err(GuardError::EmptyCommand)));
            assert!(matches!(
                engine.classify(" \t  ", mode),
                Err(GuardError::EmptyCommand)
            ));
        }
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert!(engine()
            .classify("   ls   -la   ", Mode::Safe)
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_interpreter_gap_is_not_detected() {
        // lexical policy only: an allowed interpreter may still run arbitrary code
        assert!(engine()
            .classify("python3 -c print", Mode::Safe)
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_authorize_keeps_command_verbatim() {
        let raw = "  curl  -sI https://example.com  ";
        let allowed = engine().authorize(raw, Mode::Safe).unwrap();
        assert_eq!(allowed.as_str(), raw);
        assert_eq!(allowed.mode(), Mode::Safe);
    }

    #[test]
    fn test_authorize_block_is_error() {
        let err = engine().authorize("cat /etc/shadow", Mode::Safe).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(matches!(
            err,
            GuardError::PolicyBlock {
                kind: RuleKind::SensitivePath,
                ..
            }
        ));
    }

    #[test]
    fn test_custom_rule_runs_last() {
        struct NoCurl;
        impl CommandRule for NoCurl {
            fn kind(&self) -> RuleKind {
                RuleKind::Keyword
            }
            fn evaluate(&self, command: &str) -> Option<Violation> {
                command.contains("curl").then(|| Violation {
                    kind: RuleKind::Keyword,
                    reason: "curl disabled in this deployment".to_string(),
                    detail: "curl".to_string(),
                })
            }
        }

        let engine = engine().with_rule(Box::new(NoCurl));
        let decision = engine.classify("curl https://example.com", Mode::Safe).unwrap();
        assert_eq!(decision.reason(), Some("curl disabled in this deployment"));

        // built-ins still win first
        let decision = engine.classify("curl x; id", Mode::Safe).unwrap();
        assert_eq!(blocked_kind(decision), RuleKind::Metacharacter);
    }

    #[test]
    fn test_per_deployment_library() {
        let mut library = PatternLibrary::default();
        library.extend_allowlist(vec!["jq".to_string()]);
        let custom = PolicyEngine::new(library).unwrap();
        assert!(custom.classify("jq .name data.json", Mode::Safe).unwrap().is_allowed());

        // the default engine is unaffected
        assert!(!engine()
            .classify("jq .name data.json", Mode::Safe)
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_invalid_library_rejected() {
        let mut library = PatternLibrary::default();
        library.replace_allowlist(Vec::new());
        assert!(PolicyEngine::new(library).is_err());
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PolicyEngine>();
    }

    #[test]
    fn test_decision_message() {
        let decision = engine().classify("cat /etc/shadow", Mode::Safe).unwrap();
        assert_eq!(
            decision.message(),
            "blocked by sensitive-path rule: references sensitive paths [/etc]"
        );
        assert_eq!(Decision::Allow.message(), "allow");
    }
}
