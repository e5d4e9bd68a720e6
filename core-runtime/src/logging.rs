//! # Logging
//!
//! Installs the global `tracing` subscriber for the client core.
//!
//! Events from the r2box crates pass at the configured level; transport
//! crates (`hyper`, `reqwest`, ...) are held at `warn`. A custom filter
//! string replaces both. Output goes to stdout as pretty, compact or JSON
//! lines, and may additionally be mirrored to a host [`LoggerSink`] as
//! [`LogEntry`] values with credential fields redacted.
//!
//! ```ignore
//! use bridge_traits::logging::{ConsoleLogger, LogLevel};
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

const CLIENT_CRATES: &[&str] = &[
    "r2box_workspace",
    "bridge_desktop",
    "core_runtime",
    "core_api",
    "core_auth",
    "core_files",
    "core_upload",
    "core_service",
];

const TRANSPORT_CRATES: &[&str] = &["h2", "hyper", "reqwest", "rustls"];

/// Field names whose values never leave the process in clear text.
/// Matched case-insensitively as substrings.
const SENSITIVE_FIELDS: &[&str] = &[
    "token",
    "password",
    "secret",
    "access_key",
    "authorization",
    "bearer",
    "signature",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. Default in debug builds.
    Pretty,
    /// One JSON object per line. Default in release builds.
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the client crates when no `filter` is given.
    pub level: LogLevel,
    /// `EnvFilter` directives, e.g. `"core_upload=trace,core_api=debug"`.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close (pretty) or attach span context (JSON).
    pub enable_spans: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: true,
            show_threads: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("has_sink", &self.logger_sink.is_some())
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_threads(mut self, show: bool) -> Self {
        self.show_threads = show;
        self
    }

    fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str();
        CLIENT_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level))
            .chain(TRANSPORT_CRATES.iter().map(|krate| format!("{}=warn", krate)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Only the first call in a process succeeds;
/// later calls return [`Error::Logging`].
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(output_layer(&config))
        .with(SinkLayer::new(config.logger_sink.clone()))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Logging(format!("Failed to initialize logging: {}", e)))
}

fn output_layer(config: &LoggingConfig) -> BoxedLayer {
    let threads = config.show_threads;
    let base = tracing_subscriber::fmt::layer()
        .with_thread_ids(threads)
        .with_thread_names(threads)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => {
            let spans = if config.enable_spans {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            };
            base.pretty().with_span_events(spans).boxed()
        }
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Mirrors events to a [`LoggerSink`].
struct SinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl SinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let metadata = event.metadata();
        let level = sink_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields.message.unwrap_or_else(|| metadata.name().to_string());
        let mut entry = fields
            .values
            .into_iter()
            .fold(LogEntry::new(level, metadata.target(), message), |entry, (k, v)| {
                entry.with_field(k, v)
            });
        if let Some(span) = ctx.lookup_current() {
            entry = entry.with_span_id(span.name());
        }

        deliver(Arc::clone(sink), entry);
    }
}

/// Hand `entry` to the sink on the current runtime, or inline when logging
/// from outside one.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(e) = sink.log(entry).await {
                    eprintln!("log sink rejected entry: {}", e);
                }
            });
        }
        Err(_) => {
            if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("log sink rejected entry: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                let value = redact_if_sensitive(name, &value);
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

// Numeric and bool fields fall back to `record_debug`, whose output matches
// their `Display` form.
impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

fn sink_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Trace,
    }
}

/// `"[REDACTED]"` when `field_name` names a credential, `value` otherwise.
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_ascii_lowercase();
    if SENSITIVE_FIELDS.iter().any(|s| name.contains(s)) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

/// Final component of a local path, for logging file names without the
/// directories around them.
///
/// ```
/// use core_runtime::logging::strip_path;
///
/// assert_eq!(strip_path("/home/ana/backups/db.tar"), "db.tar");
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
