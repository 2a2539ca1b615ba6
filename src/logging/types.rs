//! Core logging types: section entries, status, and the [`Log`] trait.

/// Per-section result for summary reporting.
#[derive(Debug, Clone)]
pub struct SectionEntry {
    /// Section name.
    pub name: String,
    /// Final status of the section.
    pub status: SectionStatus,
    /// Optional detail message (e.g., counts, skip reason or error description).
    pub message: Option<String>,
}

/// Status of a processed section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStatus {
    /// Section listed (and swept, if requested) without failures.
    Ok,
    /// Section was dropped by the protected-run policy.
    Skipped,
    /// Commands were printed instead of executed.
    DryRun,
    /// Section was requested but is not declared in the profile.
    NotPresent,
    /// A list or sweep action failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// The engine logs through this trait so that it does not depend on the
/// global subscriber; tests substitute a recording implementation.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a command that is printed rather than executed.
    fn dry_run(&self, msg: &str);
    /// Record a section result for the summary.
    fn record_section(&self, name: &str, status: SectionStatus, message: Option<&str>);
}
