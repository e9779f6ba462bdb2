//! # Logging
//!
//! Installs the process-wide `tracing` subscriber for the playback core.
//!
//! Workspace crates log at [`LoggingConfig::level`]; everything else (sqlx,
//! lofty, tokio) stays at `warn` unless a directive says otherwise. When a
//! host [`LoggerSink`] is configured, every event that passes the filter is
//! also mirrored to it as a [`LogEntry`], with the names of the enclosing
//! spans joined into `span_id` (for example `session:start`).
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .format(LogFormat::Compact)
//!         .directive("core_playback::engine=trace")
//!         .sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! ```
//!
//! Track locators are user data. Log local files through [`strip_path`] and
//! stream URLs through [`redact_locator`].

use crate::error::{Error, Result};

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};
use core_async::runtime;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const WORKSPACE_TARGETS: &[&str] = &[
    "cadence",
    "core_async",
    "core_runtime",
    "core_playback",
    "core_service",
    "bridge_traits",
    "bridge_desktop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. Debug builds default to this.
    Pretty,
    /// One JSON object per event, fields flattened. Release default.
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

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(Error::Logging(format!("unknown log format '{other}'"))),
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Extra `target=level` directives applied after the defaults.
    pub directives: Vec<String>,
    pub sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close in the pretty format. Session and engine
    /// operations run inside spans, so this is noisy.
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            directives: Vec::new(),
            sink: None,
            span_events: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("directives", &self.directives)
            .field("sink", &self.sink.is_some())
            .field("span_events", &self.span_events)
            .finish()
    }
}

impl LoggingConfig {
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        let level = level_filter(self.level);
        let mut filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy("");

        let defaults = WORKSPACE_TARGETS.iter().map(|target| format!("{target}={level}"));
        for raw in defaults.chain(self.directives.iter().cloned()) {
            let directive = raw
                .parse::<Directive>()
                .map_err(|e| Error::Logging(format!("bad directive '{raw}': {e}")))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Install the global subscriber. Only the first call in a process succeeds.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.filter()?;
    let format = config.format;

    let pretty = (format == LogFormat::Pretty).then(|| {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(if config.span_events {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
    });
    let json = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
    });
    let compact = (format == LogFormat::Compact)
        .then(|| tracing_subscriber::fmt::layer().compact().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(compact)
        .with(config.sink.map(HostForwarder::new))
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

fn log_level(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

/// Mirrors filtered events into a host [`LoggerSink`].
struct HostForwarder {
    sink: Arc<dyn LoggerSink>,
}

impl HostForwarder {
    fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink }
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = Arc::clone(&self.sink);
        let outcome = match runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("log sink rejected entry: {e}");
                    }
                });
                return;
            }
            Err(_) => runtime::block_on(async move { sink.log(entry).await }),
        };
        // The subscriber cannot log its own failures.
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("log sink rejected entry: {e}"),
            Err(e) => eprintln!("log sink runtime unavailable: {e}"),
        }
    }
}

impl<S> Layer<S> for HostForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = log_level(meta.level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields.message.take().unwrap_or_else(|| meta.name().to_string());
        let mut entry = LogEntry::new(level, meta.target(), message);
        entry.fields.extend(fields.pairs);

        if let Some(scope) = ctx.event_scope(event) {
            let names: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !names.is_empty() {
                entry.span_id = Some(names.join(":"));
            }
        }

        self.deliver(entry);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    pairs: Vec<(String, String)>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.pairs.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    // Numbers and bools format identically through Debug.
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// Basename of a local file path, for either separator style.
///
/// ```ignore
/// info!(file = %strip_path("/storage/emulated/0/Music/song.mp3"), "Preparing");
/// // file=song.mp3
/// ```
pub fn strip_path(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Stream URL without query string or fragment, where signed download URLs
/// carry their access tokens.
pub fn redact_locator(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    struct Recorder {
        entries: Mutex<Vec<LogEntry>>,
        min: LogLevel,
    }

    impl Recorder {
        fn new(min: LogLevel) -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(Vec::new()),
                min,
            })
        }

        fn taken(&self) -> Vec<LogEntry> {
            std::mem::take(&mut *self.entries.lock().unwrap())
        }
    }

    #[async_trait]
    impl LoggerSink for Recorder {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.min
        }
    }

    fn forwarding_to(recorder: Arc<Recorder>) -> impl Subscriber + Send + Sync {
        let sink: Arc<dyn LoggerSink> = recorder;
        tracing_subscriber::registry().with(HostForwarder::new(sink))
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" compact ".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!(matches!("xml".parse::<LogFormat>(), Err(Error::Logging(_))));
    }

    #[test]
    fn default_filter_raises_workspace_crates_only() {
        let filter = LoggingConfig::default()
            .level(LogLevel::Debug)
            .filter()
            .unwrap()
            .to_string();
        assert!(filter.contains("core_playback=debug"));
        assert!(filter.contains("core_service=debug"));
        assert!(!filter.contains("sqlx"));
    }

    #[test]
    fn directives_are_appended() {
        let filter = LoggingConfig::default()
            .directive("core_playback::engine=trace")
            .filter()
            .unwrap()
            .to_string();
        assert!(filter.contains("core_playback::engine=trace"));
    }

    #[test]
    fn malformed_directive_is_rejected() {
        let result = LoggingConfig::default().directive("core_service=loud").filter();
        assert!(matches!(result, Err(Error::Logging(msg)) if msg.contains("core_service=loud")));
    }

    #[test]
    fn forwarded_entry_keeps_fields_and_span_path() {
        let recorder = Recorder::new(LogLevel::Trace);
        let _guard = tracing::subscriber::set_default(forwarding_to(recorder.clone()));

        let span = tracing::info_span!("session");
        let _outer = span.enter();
        let inner = tracing::info_span!("start");
        let _inner = inner.enter();
        tracing::info!(
            target: "core_playback::engine",
            track_id = "song-1",
            index = 3u64,
            "track started"
        );

        let entries = recorder.taken();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_playback::engine");
        assert_eq!(entry.message, "track started");
        assert_eq!(entry.fields.get("track_id").map(String::as_str), Some("song-1"));
        assert_eq!(entry.fields.get("index").map(String::as_str), Some("3"));
        assert_eq!(entry.span_id.as_deref(), Some("session:start"));
    }

    #[test]
    fn entries_below_sink_level_are_dropped() {
        let recorder = Recorder::new(LogLevel::Warn);
        let _guard = tracing::subscriber::set_default(forwarding_to(recorder.clone()));

        tracing::info!("position sampled");
        tracing::warn!("stream stalled");

        let entries = recorder.taken();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "stream stalled");
        assert!(entries[0].span_id.is_none());
    }

    #[test]
    fn strip_path_handles_both_separators() {
        assert_eq!(strip_path("/home/user/music/song.mp3"), "song.mp3");
        assert_eq!(strip_path("C:\\Users\\kai\\Music\\song.mp3"), "song.mp3");
        assert_eq!(strip_path("song.mp3"), "song.mp3");
        assert_eq!(strip_path("/var/log/"), "");
    }

    #[test]
    fn redact_locator_drops_query_and_fragment() {
        assert_eq!(
            redact_locator("https://cdn.example.com/a.mp3?alt=media&token=abc"),
            "https://cdn.example.com/a.mp3"
        );
        assert_eq!(redact_locator("https://cdn.example.com/a.mp3#t=10"), "https://cdn.example.com/a.mp3");
        assert_eq!(redact_locator("https://cdn.example.com/a.mp3"), "https://cdn.example.com/a.mp3");
    }
}
