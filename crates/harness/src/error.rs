//! Error types for e2e runs

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the harness error
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Harness error types
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Transport error{}: {body}", http_status_suffix(.status))]
    Transport { status: Option<u16>, body: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Tool {tool} reported an error: {message}")]
    ToolError { tool: String, message: String },

    #[error("Command `{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Command `{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Timed out after {elapsed:?} ({polls} polls) waiting for {condition}; last observed: {last_observed}")]
    ConditionTimeout {
        condition: String,
        last_observed: String,
        polls: u32,
        elapsed: Duration,
    },

    #[error("Missing prerequisite '{key}': expected to be published by scenario '{producer}'")]
    MissingPrerequisite { key: String, producer: String },

    #[error("Value '{key}' was already published by scenario '{publisher}'")]
    DuplicatePublish { key: String, publisher: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown flag '{flag}' for command '{command}'")]
    UnknownFlag { command: String, flag: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn http_status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

/// Broad class of an error, used by the orderer to decide what a failure means for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Tool server unreachable, malformed payloads, CLI binary missing
    Transport,
    /// Rejected credentials
    Authentication,
    /// Tool or command ran and reported failure
    ToolReported,
    /// A polled condition never held
    ConditionTimeout,
    /// A scenario assertion did not hold
    Assertion,
    /// A value from an earlier scenario is absent
    Prerequisite,
    /// Misuse of the harness itself (double publish, unknown flag, bad config)
    Harness,
    /// Scenario asked to be skipped
    Skipped,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Authentication => "authentication",
            ErrorKind::ToolReported => "tool_reported",
            ErrorKind::ConditionTimeout => "condition_timeout",
            ErrorKind::Assertion => "assertion",
            ErrorKind::Prerequisite => "prerequisite",
            ErrorKind::Harness => "harness",
            ErrorKind::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Expected-error categories that error-path scenarios match on.
///
/// Exact wording belongs to the CLI and tool server; only the category is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    AlreadyExists,
    NotFound,
    Unauthorized,
    Other,
}

/// Phrases the API server and tool server use when credentials are rejected.
/// Bare "unauthorized" or "forbidden" can be part of a resource name.
const AUTH_PHRASES: &[&str] = &[
    "(unauthorized)",
    "(forbidden)",
    "401 unauthorized",
    "403 forbidden",
    "invalid bearer token",
    "authentication required",
    "must be logged in",
];

impl ErrorCategory {
    /// Classify free-form diagnostic text
    pub fn classify(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if AUTH_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
            ErrorCategory::Unauthorized
        } else if lower.contains("already exists") {
            ErrorCategory::AlreadyExists
        } else if lower.contains("not found") || lower.contains("notfound") {
            ErrorCategory::NotFound
        } else {
            ErrorCategory::Other
        }
    }
}

impl HarnessError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::Transport { .. }
            | HarnessError::ExecutableNotFound(_)
            | HarnessError::Io(_)
            | HarnessError::Http(_) => ErrorKind::Transport,
            HarnessError::Authentication(_) => ErrorKind::Authentication,
            HarnessError::ToolError { .. }
            | HarnessError::CommandFailed { .. }
            | HarnessError::CommandTimeout { .. } => ErrorKind::ToolReported,
            HarnessError::ConditionTimeout { .. } => ErrorKind::ConditionTimeout,
            HarnessError::AssertionFailed(_)
            | HarnessError::Json(_)
            | HarnessError::Yaml(_) => ErrorKind::Assertion,
            HarnessError::MissingPrerequisite { .. } => ErrorKind::Prerequisite,
            HarnessError::DuplicatePublish { .. }
            | HarnessError::UnknownCommand(_)
            | HarnessError::UnknownFlag { .. }
            | HarnessError::Config(_)
            | HarnessError::Toml(_) => ErrorKind::Harness,
            HarnessError::Skipped(_) => ErrorKind::Skipped,
        }
    }

    /// Expected-error category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            HarnessError::Authentication(_) => ErrorCategory::Unauthorized,
            HarnessError::ToolError { message, .. } => ErrorCategory::classify(message),
            HarnessError::CommandFailed { stderr, .. } => ErrorCategory::classify(stderr),
            HarnessError::AssertionFailed(message) => ErrorCategory::classify(message),
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error must abort the remainder of the run
    pub fn is_fatal_to_run(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

/// Return an [`HarnessError::AssertionFailed`] from the enclosing function unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::HarnessError::AssertionFailed(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Error: provider \"p1\" already exists" => ErrorCategory::AlreadyExists)]
    #[test_case("providers.forklift.konveyor.io \"nope\" not found" => ErrorCategory::NotFound)]
    #[test_case("Error from server (NotFound): namespaces \"x\"" => ErrorCategory::NotFound)]
    #[test_case("error: You must be logged in to the server (Unauthorized)" => ErrorCategory::Unauthorized)]
    #[test_case("Error from server (Forbidden): plans is forbidden: User \"dev\" cannot list" => ErrorCategory::Unauthorized)]
    #[test_case("providers.forklift.konveyor.io \"unauthorized-src\" not found" => ErrorCategory::NotFound)]
    #[test_case("provider \"forbidden-zone\" already exists" => ErrorCategory::AlreadyExists)]
    #[test_case("something else broke" => ErrorCategory::Other)]
    fn classifies_diagnostics(text: &str) -> ErrorCategory {
        ErrorCategory::classify(text)
    }

    #[test]
    fn transport_errors_are_fatal() {
        let err = HarnessError::Transport {
            status: Some(502),
            body: "bad gateway".to_string(),
        };
        assert!(err.is_fatal_to_run());
        assert_eq!(err.to_string(), "Transport error (HTTP 502): bad gateway");

        let err = HarnessError::ExecutableNotFound("kubectl-mtv".to_string());
        assert!(err.is_fatal_to_run());

        let err = HarnessError::Authentication("401".to_string());
        assert!(!err.is_fatal_to_run());
        assert_eq!(err.category(), ErrorCategory::Unauthorized);
    }

    #[test]
    fn ensure_macro_returns_assertion() {
        fn check(value: usize) -> HarnessResult<()> {
            ensure!(value > 2, "expected more than 2 items, got {}", value);
            Ok(())
        }
        assert!(check(3).is_ok());
        let err = check(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assertion);
        assert!(err.to_string().contains("got 1"));
    }
}
