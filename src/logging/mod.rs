//! Logging infrastructure for structured console and file output.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, SectionEntry, SectionStatus};
pub use utils::log_name;

/// Serializes `XDG_CACHE_HOME` manipulation across parallel test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Create a Logger backed by an isolated per-thread tracing subscriber with a
/// [`subscriber::FileLayer`], so events emitted by the logger reach a log
/// file inside a temporary directory.
///
/// Keep the returned guard alive for the duration of the test; dropping it
/// restores the previous thread-local dispatcher.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let env_lock = TEST_ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    // SAFETY: Protected by TEST_ENV_MUTEX; restored before lock is released.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var("XDG_CACHE_HOME", tmp.path());
    }
    let file_layer = subscriber::FileLayer::new("test").expect("failed to create file layer");
    let log = Logger::new("test");
    #[allow(unsafe_code)]
    unsafe {
        std::env::remove_var("XDG_CACHE_HOME");
    }
    drop(env_lock);
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}

/// In-memory [`Log`] for unit tests of code that logs through the trait.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::{Log, SectionEntry, SectionStatus};

    /// Severity (or kind) of a recorded message.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Level {
        Stage,
        Info,
        Debug,
        Warn,
        Error,
        DryRun,
    }

    /// Records every message instead of printing it.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLog {
        messages: Mutex<Vec<(Level, String)>>,
        sections: Mutex<Vec<SectionEntry>>,
    }

    impl RecordingLog {
        fn push(&self, level: Level, msg: &str) {
            self.messages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((level, msg.to_string()));
        }

        fn of(&self, level: Level) -> Vec<String> {
            self.messages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }

        /// All messages in emission order.
        pub(crate) fn entries(&self) -> Vec<(Level, String)> {
            self.messages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }

        pub(crate) fn stages(&self) -> Vec<String> {
            self.of(Level::Stage)
        }

        pub(crate) fn infos(&self) -> Vec<String> {
            self.of(Level::Info)
        }

        pub(crate) fn warnings(&self) -> Vec<String> {
            self.of(Level::Warn)
        }

        pub(crate) fn errors(&self) -> Vec<String> {
            self.of(Level::Error)
        }

        pub(crate) fn dry_runs(&self) -> Vec<String> {
            self.of(Level::DryRun)
        }

        pub(crate) fn sections(&self) -> Vec<SectionEntry> {
            self.sections
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    impl Log for RecordingLog {
        fn stage(&self, msg: &str) {
            self.push(Level::Stage, msg);
        }

        fn info(&self, msg: &str) {
            self.push(Level::Info, msg);
        }

        fn debug(&self, msg: &str) {
            self.push(Level::Debug, msg);
        }

        fn warn(&self, msg: &str) {
            self.push(Level::Warn, msg);
        }

        fn error(&self, msg: &str) {
            self.push(Level::Error, msg);
        }

        fn dry_run(&self, msg: &str) {
            self.push(Level::DryRun, msg);
        }

        fn record_section(&self, name: &str, status: SectionStatus, message: Option<&str>) {
            self.sections
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(SectionEntry {
                    name: name.to_string(),
                    status,
                    message: message.map(String::from),
                });
        }
    }
}
