//! Structured logger with section summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, SECTION_SPAN, STAGE_TARGET};
use super::types::{Log, SectionEntry, SectionStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger that routes messages through [`tracing`] and collects
/// per-section results for the run summary.
///
/// Every message also reaches `$XDG_CACHE_HOME/sweeper/<log name>.log` through
/// the file layer installed by [`init_subscriber`](super::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    sections: Mutex<Vec<SectionEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Only remembers the log file path for the summary; the file itself is
    /// created by the subscriber.
    #[must_use]
    pub fn new(log_name: &str) -> Self {
        Self {
            sections: Mutex::new(Vec::new()),
            log_file: log_file_path(log_name),
        }
    }

    /// Span that tags everything logged inside it with section `name` in
    /// the log file.
    #[must_use]
    pub fn section_span(&self, name: &str) -> tracing::Span {
        tracing::info_span!(SECTION_SPAN, name = name)
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded section entries.
    #[must_use]
    pub fn section_entries(&self) -> Vec<SectionEntry> {
        self.sections.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a command that is printed instead of executed.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a section result for the summary.
    pub fn record_section(&self, name: &str, status: SectionStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.sections.lock() {
            guard.push(SectionEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Return `true` if any recorded section has failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Count the number of failed sections.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.sections.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|s| s.status == SectionStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded sections.
    pub fn print_summary(&self) {
        let sections = self.section_entries();
        if sections.is_empty() {
            return;
        }

        self.stage("Summary");

        let mut ok = 0u32;
        let mut skipped = 0u32;
        let mut dry_run = 0u32;
        let mut missing = 0u32;
        let mut failed = 0u32;

        for section in &sections {
            let (icon, color) = match section.status {
                SectionStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                SectionStatus::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[33m")
                }
                SectionStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                SectionStatus::NotPresent => {
                    missing += 1;
                    ("?", "\x1b[2m")
                }
                SectionStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = section
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", section.name));
        }

        let total = ok + skipped + dry_run + missing + failed;
        self.info(&format!(
            "{total} sections: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[2m{missing} not present\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_section(&self, name: &str, status: SectionStatus, message: Option<&str>) {
        self.record_section(name, status, message);
    }
}
