//! Domain-specific error types for the sweeper engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ConfigError`], [`ParseError`])
//! while command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! SweepError
//! ├── Config(ConfigError)         : profile loading, action-map resolution
//! ├── Parse(ParseError)           : malformed listing output
//! ├── Launch(ProcessLaunchError)  : executable could not be spawned
//! └── SectionNotPresent           : unknown section requested
//! ```
//!
//! Non-zero exit codes of external commands are not errors; they are
//! threaded through return codes and interpreted by the engine's policy.

use thiserror::Error;

/// Top-level error type for list and sweep actions.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Profile or filter configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listing output could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// An external command could not be launched.
    #[error(transparent)]
    Launch(#[from] ProcessLaunchError),

    /// The requested section is not declared in the profile.
    #[error("Section '{section}' not present in profile")]
    SectionNotPresent {
        /// Name of the missing section.
        section: String,
    },
}

/// Errors that arise from profile loading and action-map resolution.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required INI section is absent from the profile.
    #[error("Missing required section [{0}]")]
    MissingSection(String),

    /// The same section header appears more than once.
    #[error("Duplicate section [{0}]")]
    DuplicateSection(String),

    /// A required key is absent from a section.
    #[error("Missing required key '{key}' in section [{section}]")]
    MissingKey {
        /// Section that lacks the key.
        section: String,
        /// Fully prefixed key name (e.g. `volume_list_action`).
        key: String,
    },

    /// An action-map segment has no matching `<segment>_*` keys.
    #[error("Action map of section [{section}] references '{segment}', but no '{segment}_*' keys are declared")]
    UnresolvedSegment {
        /// Section that declares the action map.
        section: String,
        /// Path segment that could not be resolved.
        segment: String,
    },

    /// A value could not be coerced to the expected type.
    #[error("Invalid value '{value}' for '{key}' in section [{section}]: expected {expected}")]
    InvalidValue {
        /// Section containing the value.
        section: String,
        /// Key containing the value.
        key: String,
        /// The raw value as written in the profile.
        value: String,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },

    /// The profile contains a syntax error.
    #[error("Invalid INI syntax at line {line}: {message}")]
    InvalidSyntax {
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// A filter pattern is not a valid regular expression.
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidFilter {
        /// The pattern as supplied.
        pattern: String,
        /// Underlying regex compilation error.
        source: regex::Error,
    },

    /// An I/O error occurred while reading the profile.
    #[error("IO error reading profile {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that arise while parsing listing output.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The output is not valid JSON.
    #[error("InvalidJSON: failed to parse JSON from listing output: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The output is valid JSON but not an array of items.
    #[error("InvalidJSON: listing output is {found}, expected an array")]
    NotAnArray {
        /// JSON type that was found instead.
        found: &'static str,
    },
}

/// An external command could not be spawned.
#[derive(Error, Debug)]
#[error("FailedToOpenProcess: execution of '{command}' returned: '{source}'")]
pub struct ProcessLaunchError {
    /// The command line that failed to launch.
    pub command: String,
    /// Underlying OS error.
    pub source: std::io::Error,
}

impl ProcessLaunchError {
    /// Build a launch error for `command` from an OS error.
    #[must_use]
    pub fn new(command: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            command: command.into(),
            source,
        }
    }
}
