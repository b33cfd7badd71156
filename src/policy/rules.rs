//! Policy Rules
//!
//! Each rule is an independent predicate over the raw command string. Rules
//! never mutate the command and never look beyond lexical patterns.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Characters that may surround a sensitive path without extending it
const PATH_CHAR_CLASS: &str = "A-Za-z0-9_.-";

/// Category of rule that produced a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Metacharacter,
    Keyword,
    SensitivePath,
    Allowlist,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Metacharacter => write!(f, "metacharacter"),
            RuleKind::Keyword => write!(f, "keyword"),
            RuleKind::SensitivePath => write!(f, "sensitive-path"),
            RuleKind::Allowlist => write!(f, "allowlist"),
        }
    }
}

/// A rule match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Rule category
    pub kind: RuleKind,

    /// Human-readable block reason
    pub reason: String,

    /// What exactly matched (character, keyword, path or leading token)
    pub detail: String,
}

/// A predicate over a command string
///
/// Implementations must be pure: the same command always yields the same
/// answer and no state is kept between calls.
pub trait CommandRule: Send + Sync {
    /// Category reported when this rule blocks
    fn kind(&self) -> RuleKind;

    /// Return a violation if the command matches this rule
    fn evaluate(&self, command: &str) -> Option<Violation>;
}

/// Blocks any occurrence of a forbidden character
#[derive(Debug, Clone)]
pub struct MetacharacterRule {
    forbidden: Vec<char>,
}

impl MetacharacterRule {
    pub fn new(forbidden: Vec<char>) -> Self {
        Self { forbidden }
    }
}

impl CommandRule for MetacharacterRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Metacharacter
    }

    fn evaluate(&self, command: &str) -> Option<Violation> {
        let found = command.chars().find(|c| self.forbidden.contains(c))?;
        Some(Violation {
            kind: self.kind(),
            reason: "contains shell metacharacters".to_string(),
            detail: found.escape_default().to_string(),
        })
    }
}

/// Blocks high-risk command names appearing as standalone tokens
#[derive(Debug, Clone)]
pub struct KeywordRule {
    keywords: HashSet<String>,
}

impl KeywordRule {
    pub fn new<I: IntoIterator<Item = String>>(keywords: I) -> Self {
        Self {
            keywords: keywords.into_iter().collect(),
        }
    }
}

impl CommandRule for KeywordRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Keyword
    }

    fn evaluate(&self, command: &str) -> Option<Violation> {
        let token = command
            .split_whitespace()
            .find(|token| self.keywords.contains(*token))?;
        Some(Violation {
            kind: self.kind(),
            reason: "contains high-risk keywords".to_string(),
            detail: token.to_string(),
        })
    }
}

/// Blocks references to sensitive path prefixes
///
/// A pattern matches when it is not glued to other path-name characters on
/// either side, so `/etc` hits `cat /etc/shadow` and `--file=/etc/hosts` but
/// not `/etcetera` or `/usr/etc`.
#[derive(Debug, Clone)]
pub struct PathRule {
    pattern: Option<Regex>,
}

impl PathRule {
    pub fn new(paths: &[String]) -> Result<Self> {
        if paths.is_empty() {
            return Ok(Self { pattern: None });
        }

        let alternation = paths
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(
            "(?:^|[^{class}])({alternation})(?:$|[^{class}])",
            class = PATH_CHAR_CLASS,
            alternation = alternation
        ))?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }
}

impl CommandRule for PathRule {
    fn kind(&self) -> RuleKind {
        RuleKind::SensitivePath
    }

    fn evaluate(&self, command: &str) -> Option<Violation> {
        let captures = self.pattern.as_ref()?.captures(command)?;
        let matched = captures.get(1)?.as_str();
        Some(Violation {
            kind: self.kind(),
            reason: "references sensitive paths".to_string(),
            detail: matched.to_string(),
        })
    }
}

/// Permits only commands whose first token is a known-safe tool
#[derive(Debug, Clone)]
pub struct AllowlistRule {
    allowed: Vec<String>,
}

impl AllowlistRule {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Allowed leading tokens, in configuration order
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

impl CommandRule for AllowlistRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Allowlist
    }

    fn evaluate(&self, command: &str) -> Option<Violation> {
        let first = command.split_whitespace().next().unwrap_or("");
        if self.allowed.iter().any(|a| a == first) {
            return None;
        }
        Some(Violation {
            kind: self.kind(),
            reason: format!("not in allowlist (allowed: {})", self.allowed.join(", ")),
            detail: first.to_string(),
        })
    }
}
