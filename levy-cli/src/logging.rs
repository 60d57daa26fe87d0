//! Log output for `gra-levy`: stderr always, a file when configured.
//!
//! Stdout is reserved for reports, so nothing here ever writes to it.

use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{
    self, FmtContext,
    format::{FormatEvent, FormatFields, Writer},
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// `2024-03-31 14:05:09.123 +00:00  WARN levy_core::calculations::fallback: message key=value`
struct LevyLogFormat;

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[1;31m",
        Level::WARN => "\x1b[1;33m",
        Level::INFO => "\x1b[1;32m",
        Level::DEBUG => "\x1b[1;34m",
        Level::TRACE => "\x1b[1;35m",
    }
}

impl<S, N> FormatEvent<S, N> for LevyLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z");

        if writer.has_ansi_escapes() {
            write!(
                writer,
                "\x1b[2m{stamp}\x1b[0m {}{:>5}\x1b[0m ",
                level_color(meta.level()),
                meta.level()
            )?;
        } else {
            write!(writer, "{stamp} {:>5} ", meta.level())?;
        }
        write!(writer, "{}: ", meta.target())?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `env_directive` (from `RUST_LOG`) when it parses, else `default_level`,
/// else `warn`.
fn make_filter(
    env_directive: Option<&str>,
    default_level: &str,
) -> EnvFilter {
    env_directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

/// Opens `path` for appending. The directory must already exist.
pub fn open_log_file(path: &Path) -> Result<File> {
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file '{}'", path.display()))
}

/// Installs the global subscriber. Call once at startup; later calls are
/// no-ops.
///
/// - Stderr: colored when attached to a terminal.
/// - File: plain text appended to `log_file`, when given.
/// - Level: `RUST_LOG` if set, else `default_level`.
pub fn init_logging(
    default_level: &str,
    log_file: Option<File>,
) {
    let env_directive = std::env::var("RUST_LOG").ok();

    let stderr_layer = fmt::layer()
        .event_format(LevyLogFormat)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr);

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .event_format(LevyLogFormat)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let _ = tracing_subscriber::registry()
        .with(make_filter(env_directive.as_deref(), default_level))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn rust_log_wins_over_configured_level() {
        assert_eq!(make_filter(Some("info"), "debug").to_string(), "info");
        assert_eq!(make_filter(None, "debug").to_string(), "debug");
    }

    #[test]
    fn unparsable_levels_fall_back_to_warn() {
        assert_eq!(make_filter(Some("levy=loud"), "levy=louder").to_string(), "warn");
    }

    #[test]
    fn log_file_in_missing_directory_is_an_error() {
        let err = open_log_file(Path::new("/nonexistent-dir/gra-levy.log")).unwrap_err();

        assert!(err.to_string().contains("/nonexistent-dir/gra-levy.log"));
    }

    #[test]
    fn file_lines_are_plain_and_carry_target_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gra-levy.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .event_format(LevyLogFormat)
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(&path).unwrap())),
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(version = "GRA-VAT-2023", "using fallback levy rate table");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "earlier run");
        assert!(lines[1].contains(" WARN levy_cli::logging::tests: "), "{}", lines[1]);
        assert!(lines[1].contains("using fallback levy rate table"), "{}", lines[1]);
        assert!(lines[1].contains("version=\"GRA-VAT-2023\""), "{}", lines[1]);
        assert!(!lines[1].contains('\x1b'));
    }
}
