//! Property-Based Tests for the Policy Engine
//!
//! # Test Strategies
//!
//! - **Metacharacters**: any command carrying a forbidden character is blocked,
//!   whatever its first token
//! - **Allowlist**: clean commands are allowed exactly when their first token is listed
//! - **Unsafe mode**: every non-empty command is allowed
//! - **Pass-through**: an authorized command is byte-identical to the input
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib policy::proptests
//! ```

use proptest::prelude::*;

use crate::policy::{Decision, Mode, PatternLibrary, PolicyEngine, RuleKind};

fn engine() -> PolicyEngine {
    PolicyEngine::new(PatternLibrary::default()).unwrap()
}

// Helper: a metacharacter from the built-in set
fn arb_metacharacter() -> impl Strategy<Value = char> {
    prop::sample::select(PatternLibrary::default().metacharacters)
}

// Helper: a first token from the built-in allowlist
fn arb_allowed_token() -> impl Strategy<Value = String> {
    prop::sample::select(PatternLibrary::default().allowlist)
}

// Helper: arguments that carry no metacharacters, keywords or paths.
// Uppercase letters keep them clear of every lowercase keyword.
fn arb_clean_args() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("-{0,2}[A-Z0-9_]{1,8}", 0..4)
}

proptest! {
    #[test]
    fn prop_metacharacter_always_blocks(
        prefix in "[a-z ]{0,10}",
        meta in arb_metacharacter(),
        suffix in "[a-z ]{0,10}",
    ) {
        let command = format!("ls {}{}{}", prefix, meta, suffix);
        let decision = engine().classify(&command, Mode::Safe).unwrap();
        let is_meta_block = matches!(
            decision,
            Decision::Block { kind: RuleKind::Metacharacter, .. }
        );
        prop_assert!(is_meta_block);
    }

    #[test]
    fn prop_unknown_first_token_blocked(
        token in "[a-z]{3,12}x[0-9]{1,3}",
        args in arb_clean_args(),
    ) {
        let command = format!("{} {}", token, args.join(" "));
        let decision = engine().classify(&command, Mode::Safe).unwrap();
        let is_allowlist_block = matches!(
            decision,
            Decision::Block { kind: RuleKind::Allowlist, .. }
        );
        prop_assert!(is_allowlist_block);
        prop_assert!(decision.reason().unwrap().starts_with("not in allowlist"));
    }

    #[test]
    fn prop_clean_allowed_command_passes(
        token in arb_allowed_token(),
        args in arb_clean_args(),
        padding in " {0,3}",
    ) {
        let command = format!("{}{} {}{}", padding, token, args.join(" "), padding);
        prop_assert_eq!(engine().classify(&command, Mode::Safe).unwrap(), Decision::Allow);
    }

    #[test]
    fn prop_unsafe_allows_any_non_empty(command in "\\PC*[^\\s]\\PC*") {
        prop_assert_eq!(engine().classify(&command, Mode::Unsafe).unwrap(), Decision::Allow);
    }

    #[test]
    fn prop_authorized_command_is_verbatim(command in "\\PC*[^\\s]\\PC*") {
        let allowed = engine().authorize(&command, Mode::Unsafe).unwrap();
        prop_assert_eq!(allowed.as_str().as_bytes(), command.as_bytes());
    }

    #[test]
    fn prop_classification_is_deterministic(command in "\\PC{1,40}") {
        let engine = engine();
        let first = engine.classify(&command, Mode::Safe).ok();
        let second = engine.classify(&command, Mode::Safe).ok();
        prop_assert_eq!(first, second);
    }
}
