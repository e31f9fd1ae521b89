//! Trigger policy evaluation for a single build.

use std::fmt;

use regex::Regex;

use crate::extract::render_value;
use crate::models::BuildSnapshot;
use crate::watch::{RemoteJobWatch, ResultCheck};

/// Outcome of evaluating one build against a watch's trigger policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The build satisfies the policy.
    Fire,
    /// The build is complete but does not qualify.
    Veto(VetoReason),
    /// The build is still running; it must be inspected again later.
    Defer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VetoReason {
    /// Result category not in the watch's trigger results.
    ResultNotSelected(Option<String>),
    /// The build published no result document but checks are configured.
    NoPublishedResult,
    MissingKey(String),
    PatternMismatch { key: String, value: String },
    InvalidPattern { key: String, error: String },
}

impl fmt::Display for VetoReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VetoReason::ResultNotSelected(Some(result)) => {
                write!(f, "result {result} is not a trigger result")
            }
            VetoReason::ResultNotSelected(None) => write!(f, "build has no result"),
            VetoReason::NoPublishedResult => write!(f, "no published result to check"),
            VetoReason::MissingKey(key) => write!(f, "published result has no '{key}'"),
            VetoReason::PatternMismatch { key, value } => {
                write!(f, "'{key}' = '{value}' does not match")
            }
            VetoReason::InvalidPattern { key, error } => {
                write!(f, "pattern for '{key}' is invalid: {error}")
            }
        }
    }
}

/// Decide whether `snapshot` satisfies `watch`'s trigger policy.
pub fn evaluate(watch: &RemoteJobWatch, snapshot: &BuildSnapshot) -> Decision {
    if !snapshot.is_complete() {
        return Decision::Defer;
    }

    match snapshot.build_result() {
        Some(result) if watch.triggers_on(result) => {}
        _ => return Decision::Veto(VetoReason::ResultNotSelected(snapshot.result.clone())),
    }

    if watch.result_checks.is_empty() {
        return Decision::Fire;
    }

    let Some(published) = &snapshot.published_result else {
        return Decision::Veto(VetoReason::NoPublishedResult);
    };

    for check in &watch.result_checks {
        let Some(value) = published.get(&check.key) else {
            return Decision::Veto(VetoReason::MissingKey(check.key.clone()));
        };
        let value = render_value(value);
        match full_match(check, &value) {
            Ok(true) => {}
            Ok(false) => {
                return Decision::Veto(VetoReason::PatternMismatch {
                    key: check.key.clone(),
                    value,
                });
            }
            Err(error) => {
                return Decision::Veto(VetoReason::InvalidPattern {
                    key: check.key.clone(),
                    error,
                });
            }
        }
    }

    Decision::Fire
}

fn full_match(check: &ResultCheck, value: &str) -> Result<bool, String> {
    let anchored = anchored_pattern(&check.expected_value)?;
    Ok(anchored.is_match(value))
}

/// Compile `pattern` so that it only matches an entire string.
pub fn anchored_pattern(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| e.to_string())
}
