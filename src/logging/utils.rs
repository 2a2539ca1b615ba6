//! Log file naming, ANSI stripping, and time formatting.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// CSI sequences (`ESC [ params final`) and two-byte `ESC x` escapes.
static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|[@-_])").ok());

/// Strip ANSI escape sequences from a string.
pub(super) fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE
        .as_ref()
        .map_or_else(|| s.to_string(), |re| re.replace_all(s, "").into_owned())
}

/// Log name for a run of `profile`: `sweeper-<file stem>`, restricted to
/// characters that are safe in a file name.
#[must_use]
pub fn log_name(profile: &Path) -> String {
    let stem: String = profile
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "sweeper".to_string()
    } else {
        format!("sweeper-{stem}")
    }
}

/// Return the `$XDG_CACHE_HOME/sweeper/` directory, creating it if needed.
pub(super) fn sweeper_cache_dir() -> Option<PathBuf> {
    let cache_dir = std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    );
    let dir = cache_dir.join("sweeper");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Return the log file path under `$XDG_CACHE_HOME/sweeper/` (or `~/.cache/sweeper/`).
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    Some(sweeper_cache_dir()?.join(format!("{command}.log")))
}

/// Format the current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}
