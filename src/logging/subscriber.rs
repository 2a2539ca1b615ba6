//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use tracing::span;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "sweeper::stage";
/// Target used for commands printed instead of executed.
pub(super) const DRY_RUN_TARGET: &str = "sweeper::dry_run";
/// Name of the span opened around each section of a run.
pub(super) const SECTION_SPAN: &str = "section";

/// Pulls one named field out of an event or span.
struct FieldExtractor {
    field: &'static str,
    value: String,
}

impl FieldExtractor {
    const fn new(field: &'static str) -> Self {
        Self {
            field,
            value: String::new(),
        }
    }
}

impl tracing::field::Visit for FieldExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == self.field {
            self.value = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == self.field {
            self.value = value.to_string();
        }
    }
}

/// Section name stored in the extensions of a [`SECTION_SPAN`].
struct SectionName(String);

/// Name of the innermost section span enclosing `event`, if any.
fn enclosing_section<S>(ctx: &Context<'_, S>, event: &tracing::Event<'_>) -> Option<String>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    ctx.event_scope(event)?
        .find_map(|span| span.extensions().get::<SectionName>().map(|s| s.0.clone()))
}

/// A [`tracing_subscriber::Layer`] that appends every event to the run log
/// file, timestamped, tagged with its section and without ANSI codes.
///
/// Always captures `DEBUG` and above, whatever the console verbosity.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `log_name`, write a run header, and open it
    /// for appending.
    ///
    /// Returns `None` if the cache directory or the file is unavailable.
    pub(super) fn new(log_name: &str) -> Option<Self> {
        Self::create(&log_file_path(log_name)?)
    }

    fn create(path: &Path) -> Option<Self> {
        let version =
            option_env!("SWEEPER_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!("# sweeper {version} started {} UTC\n", format_utc_datetime());
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }

    fn format_line(level: tracing::Level, target: &str, section: Option<&str>, msg: &str) -> String {
        let ts = format_utc_time();
        let scope = section.map_or_else(String::new, |name| format!("<{name}> "));
        match (level, target) {
            (tracing::Level::INFO, STAGE_TARGET) => format!("[{ts}] ==> {msg}"),
            (tracing::Level::INFO, DRY_RUN_TARGET) => format!("[{ts}] {scope}[bash] {msg}"),
            (tracing::Level::ERROR, _) => format!("[{ts}] {scope}[error] {msg}"),
            (tracing::Level::WARN, _) => format!("[{ts}] {scope}[warn] {msg}"),
            (tracing::Level::DEBUG | tracing::Level::TRACE, _) => {
                format!("[{ts}] {scope}[debug] {msg}")
            }
            _ => format!("[{ts}] {scope}{msg}"),
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for FileLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != SECTION_SPAN {
            return;
        }
        let mut name = FieldExtractor::new("name");
        attrs.record(&mut name);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SectionName(name.value));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut message = FieldExtractor::new("message");
        event.record(&mut message);

        let section = enclosing_section(&ctx, event);
        let line = Self::format_line(
            *metadata.level(),
            metadata.target(),
            section.as_deref(),
            &strip_ansi(&message.value),
        );

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console formatter for sweeper output.
struct SweeperFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for SweeperFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let mut message = FieldExtractor::new("message");
        event.record(&mut message);
        let msg = &message.value;

        match *metadata.level() {
            tracing::Level::ERROR => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}"),
            tracing::Level::WARN => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}"),
            tracing::Level::INFO if metadata.target() == STAGE_TARGET => {
                writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m")
            }
            // Printed bare so the output can be piped into a shell.
            tracing::Level::INFO if metadata.target() == DRY_RUN_TARGET => {
                writeln!(writer, "{msg}")
            }
            tracing::Level::INFO => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// The console layer prints warnings and errors to stderr and everything else
/// to stdout; debug output is shown only when `verbose` is set. The file layer
/// writes all events to `$XDG_CACHE_HOME/sweeper/<log_name>.log`.
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool, log_name: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(SweeperFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(log_name).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt as _;

    fn with_file_layer(f: impl FnOnce()) -> String {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.log");
        let layer = FileLayer::create(&path).expect("file layer");
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn header_names_the_run() {
        let contents = with_file_layer(|| {});
        assert!(contents.starts_with("# sweeper "));
        assert!(contents.trim_end().ends_with("UTC"));
    }

    #[test]
    fn events_inside_a_section_are_tagged() {
        let contents = with_file_layer(|| {
            tracing::info!("before");
            let span = tracing::info_span!("section", name = "volumes");
            let _entered = span.enter();
            tracing::warn!("inside");
            tracing::info!(target: DRY_RUN_TARGET, "rm vol-1");
        });
        let lines: Vec<&str> = contents.lines().skip(1).collect();
        assert!(lines[0].ends_with("] before"), "got {:?}", lines[0]);
        assert!(lines[1].ends_with("<volumes> [warn] inside"), "got {:?}", lines[1]);
        assert!(lines[2].ends_with("<volumes> [bash] rm vol-1"), "got {:?}", lines[2]);
    }

    #[test]
    fn other_spans_do_not_tag_events() {
        let contents = with_file_layer(|| {
            let span = tracing::info_span!("listing", name = "volumes");
            let _entered = span.enter();
            tracing::info!("plain");
        });
        assert!(!contents.contains('<'));
    }

    #[test]
    fn stage_lines_are_never_tagged() {
        let line = FileLayer::format_line(
            tracing::Level::INFO,
            STAGE_TARGET,
            Some("volumes"),
            "Section 'volumes'",
        );
        assert!(line.ends_with("] ==> Section 'volumes'"));
    }
}
