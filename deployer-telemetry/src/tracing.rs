use deployer_config::Environment;
use std::io::{Error, Write};
use std::sync::{Once, OnceLock};
use std::{
    backtrace::{Backtrace, BacktraceStatus},
    panic::PanicHookInfo,
};
use thiserror::Error;
use tracing::field::display;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, InitError},
};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber, Registry, fmt, layer::SubscriberExt};

/// JSON field name identifying the cluster in production logs.
const CLUSTER_KEY_IN_LOG: &str = "cluster";

/// Directory production log files are written to.
const LOG_DIR: &str = "logs";

/// Number of rotated log files kept on disk.
const MAX_LOG_FILES: usize = 5;

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("an io error occurred: {0}")]
    Io(#[from] Error),
}

/// Keeps buffered log lines alive until the process exits.
///
/// Production mode returns a [`WorkerGuard`] which flushes the non-blocking
/// file writer when dropped.
#[must_use]
pub enum LogFlusher {
    Flusher(WorkerGuard),
    NullFlusher,
}

static INIT_TEST_TRACING: Once = Once::new();

/// Initializes tracing for tests.
///
/// Tracing output is only enabled when `ENABLE_TRACING` is set:
/// ```bash
/// ENABLE_TRACING=1 cargo test test_name
/// ```
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            // Without an explicit environment we would default to prod and
            // log to files instead of the terminal.
            Environment::Dev.set();
            let _log_flusher =
                init_tracing("test", None).expect("Failed to initialize tracing for tests");
        }
    });
}

static CLUSTER_NAME: OnceLock<String> = OnceLock::new();

/// Sets the cluster name injected into every production log entry.
pub fn set_global_cluster_name(cluster_name: String) {
    let _ = CLUSTER_NAME.set(cluster_name);
}

/// Returns the cluster name set with [`set_global_cluster_name`].
pub fn get_global_cluster_name() -> Option<&'static str> {
    CLUSTER_NAME.get().map(|s| s.as_str())
}

/// Adds a top-level `cluster` field to a JSON log line.
///
/// Returns `None` when the line is not a JSON object or already carries the
/// field, in which case the line must be written unchanged.
fn inject_cluster_field(line: &str, cluster_name: &str) -> Option<String> {
    let Ok(serde_json::Value::Object(mut map)) = serde_json::from_str::<serde_json::Value>(line)
    else {
        return None;
    };

    if map.contains_key(CLUSTER_KEY_IN_LOG) {
        return None;
    }

    map.insert(
        CLUSTER_KEY_IN_LOG.to_string(),
        serde_json::Value::String(cluster_name.to_string()),
    );

    let injected = serde_json::to_string(&map).ok()?;
    if line.ends_with('\n') {
        Some(format!("{injected}\n"))
    } else {
        Some(injected)
    }
}

/// Writer wrapper that injects the cluster name into JSON log entries.
struct ClusterInjectingWriter<W> {
    inner: W,
}

impl<W> Write for ClusterInjectingWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(cluster_name) = get_global_cluster_name()
            && let Ok(line) = std::str::from_utf8(buf)
            && let Some(injected) = inject_cluster_field(line, cluster_name)
        {
            // Report the original length so callers don't retry the tail.
            self.inner.write_all(injected.as_bytes())?;
            return Ok(buf.len());
        }

        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Initializes tracing for the application.
///
/// Production-like environments log JSON to daily rotated files, development
/// logs pretty output to the console. When `cluster_name` is set it is added
/// to every production log entry.
pub fn init_tracing(
    app_name: &str,
    cluster_name: Option<String>,
) -> Result<LogFlusher, TracingError> {
    if let Some(cluster_name) = cluster_name {
        set_global_cluster_name(cluster_name);
    }

    // Forward records emitted through the `log` crate by dependencies.
    LogTracer::init()?;

    let is_prod = Environment::load()?.is_prod();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_flusher = if is_prod {
        configure_prod_tracing(filter, app_name)?
    } else {
        configure_dev_tracing(filter)?
    };

    set_tracing_panic_hook();

    Ok(log_flusher)
}

fn configure_prod_tracing(filter: EnvFilter, app_name: &str) -> Result<LogFlusher, TracingError> {
    let file_appender = rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix("log")
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .build(LOG_DIR)?;

    let (file_appender, guard) = tracing_appender::non_blocking(file_appender);

    let format = fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(false);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .event_format(format)
            .with_writer(move || ClusterInjectingWriter {
                inner: file_appender.make_writer(),
            })
            .json()
            .with_current_span(true)
            .with_span_list(true),
    );

    set_global_default(subscriber)?;

    Ok(LogFlusher::Flusher(guard))
}

fn configure_dev_tracing(filter: EnvFilter) -> Result<LogFlusher, TracingError> {
    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .pretty()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let subscriber = FmtSubscriber::builder()
        .event_format(format)
        .with_env_filter(filter)
        .finish();

    set_global_default(subscriber)?;

    Ok(LogFlusher::NullFlusher)
}

/// Routes panic information through `tracing` before running the previous
/// hook, so panics end up in the log files and not only on stderr.
fn set_tracing_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    tracing::error!(
        panic.payload = payload,
        payload.location = location,
        panic.backtrace = backtrace.map(display),
        panic.note = note,
        "a panic occurred",
    );
}
