//! Log setup and the diagnostics channel.
//!
//! Two streams leave the harness besides the result line:
//!
//! - `tracing` events (warnings, debug detail), rendered by
//!   [`ColorizedFormatter`] on stderr and optionally copied to a log file;
//! - [`Diagnostics`] lines, the per-trial progress report that every worker
//!   writes while the sweep runs.

use anyhow::{Context, Result};
use colored::*;
use parking_lot::Mutex;
use std::fmt;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Event formatter that colors each line by its level.
///
/// Only the message fields are printed, without timestamps or level
/// labels. Color is dropped when the layer runs with `with_ansi(false)`,
/// which [`init_tracing`] does whenever stderr is not a terminal.
pub struct ColorizedFormatter;

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = String::new();
        ctx.format_fields(Writer::new(&mut fields), event)?;

        if !writer.has_ansi_escapes() {
            return writeln!(writer, "{}", fields);
        }

        let line = match *event.metadata().level() {
            Level::ERROR => fields.red(),
            Level::WARN => fields.yellow(),
            Level::INFO => fields.normal(),
            Level::DEBUG => fields.blue(),
            Level::TRACE => fields.dimmed(),
        };
        writeln!(writer, "{}", line)
    }
}

/// Map `-v` occurrences to a default filter directive.
fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => crate::defaults::LOG_LEVEL,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `verbosity` when set. With a `log_file`, events are
/// also appended to that file without color; the returned guard must stay
/// alive until exit so buffered lines get flushed.
pub fn init_tracing(verbosity: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(ColorizedFormatter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let file_name = path
                .file_name()
                .with_context(|| format!("log file path {:?} has no file name", path))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// Serialized diagnostics channel shared by all workers.
///
/// Each call writes its complete text and flushes while holding the lock,
/// so lines from concurrent workers never interleave.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Diagnostics {
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write one line.
    pub fn line(&self, message: impl AsRef<str>) {
        self.block(&[message.as_ref()]);
    }

    /// Write several lines as one uninterrupted block.
    pub fn block<S: AsRef<str>>(&self, lines: &[S]) {
        let mut text = String::new();
        for line in lines {
            text.push_str(line.as_ref());
            text.push('\n');
        }

        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
            tracing::debug!("Dropped diagnostics output: {}", e);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").finish_non_exhaustive()
    }
}
