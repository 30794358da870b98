//! # Logging & Tracing Infrastructure
//!
//! Every layer of the bridge logs through `tracing`: unavailable hosts and
//! rejected responses at `warn`, undecodable event payloads and panicking
//! handlers at `error`, listener attach/detach at `debug`, per-event dispatch
//! at `trace`. This module wires those events to an output.
//!
//! ## Overview
//!
//! On native targets [`init_logging`] installs a `tracing-subscriber` registry
//! with an `EnvFilter`, a formatting layer (pretty, JSON or compact) and a
//! layer mirroring events into an optional [`LoggerSink`], so a native shell
//! can route bridge logs into its own pipeline.
//!
//! On `wasm32` events go to the browser console through `tracing-wasm`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use core_bridge::logging::{init_logging, LogFormat, LoggingConfig};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//! init_logging(config)?;
//! tracing::info!(module = "Ble", "Bridge ready");
//! ```

use std::sync::Arc;

use bridge_traits::time::{LogLevel, LoggerSink};

use crate::error::{Error, Result};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// One JSON object per line
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the bridge crates when no custom filter is set
    pub level: LogLevel,
    /// Custom `EnvFilter` directives (e.g. "core_bridge::events=trace")
    pub filter: Option<String>,
    /// Optional sink mirroring every event to the host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    pub enable_spans: bool,
    pub display_target: bool,
    pub display_thread_info: bool,
}

impl std::fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"))
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .field("display_thread_info", &self.display_thread_info)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
            display_thread_info: false,
        }
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

    /// Log span enter/exit (e.g. around each `ModuleInvoker::invoke`)
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }

    /// Filter directives this configuration resolves to.
    pub fn filter_directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }

        let level = self.level.as_str();
        ["core_bridge", "core_modules", "bridge_desktop", "bridge_wasm", "webfly_workspace"]
            .iter()
            .fold(String::from("warn"), |mut directives, target| {
                directives.push_str(&format!(",{target}={level}"));
                directives
            })
    }
}

/// Initialize the logging system.
///
/// Call once during startup. A second call fails with [`Error::Config`].
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = native::build_filter(&config)?;

    tracing_subscriber::registry()
        .with(native::fmt_layer(&config))
        .with(native::LoggerSinkLayer::new(config.logger_sink.clone()))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

/// Initialize logging for the browser console.
///
/// Formatting options and the sink are not used on this target.
#[cfg(target_arch = "wasm32")]
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    use std::sync::atomic::{AtomicBool, Ordering};

    static INITIALIZED: AtomicBool = AtomicBool::new(false);

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(Error::Config("Logging is already initialized".to_string()));
    }

    let level = match config.level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };
    let wasm_config = tracing_wasm::WASMLayerConfigBuilder::new()
        .set_max_level(level)
        .set_report_logs_in_timings(config.enable_spans)
        .build();
    tracing_wasm::set_as_global_default_with_config(wasm_config);
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::LoggerSinkLayer;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::collections::HashMap;
    use std::fmt;
    use std::io;
    use std::sync::Arc;

    use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
    use futures::FutureExt;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::layer::Context;
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::{EnvFilter, Layer, Registry};

    use super::{LogFormat, LoggingConfig};
    use crate::error::{Error, Result};

    pub(super) fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
        EnvFilter::try_new(config.filter_directives())
            .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))
    }

    pub(super) fn fmt_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if config.enable_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = tracing_subscriber::fmt::layer()
            .with_target(config.display_target)
            .with_thread_ids(config.display_thread_info)
            .with_thread_names(config.display_thread_info)
            .with_span_events(span_events)
            .with_writer(io::stdout);

        match config.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Json => layer
                .json()
                .flatten_event(true)
                .with_current_span(config.enable_spans)
                .with_span_list(config.enable_spans)
                .boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }

    /// Layer that forwards events to a `LoggerSink` implementation.
    ///
    /// Installed by [`init_logging`](super::init_logging); exposed for shells
    /// composing their own subscriber.
    pub struct LoggerSinkLayer {
        sink: Option<Arc<dyn LoggerSink>>,
    }

    impl LoggerSinkLayer {
        pub fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
            Self { sink }
        }
    }

    impl<S> Layer<S> for LoggerSinkLayer
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let Some(sink) = self.sink.as_ref() else {
                return;
            };

            let metadata = event.metadata();
            let level = level_of(*metadata.level());
            if level < sink.min_level() {
                return;
            }

            let mut visitor = SinkVisitor::default();
            event.record(&mut visitor);

            let message = visitor
                .message
                .unwrap_or_else(|| metadata.name().to_string());
            let mut entry = visitor
                .fields
                .into_iter()
                .fold(LogEntry::new(level, metadata.target(), message), |entry, (key, value)| {
                    entry.with_field(key, value)
                });
            if let Some(span) = ctx.lookup_current() {
                entry = entry.with_span_id(span.name());
            }

            let sink = Arc::clone(sink);
            let mut forward = Box::pin(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {err}");
                }
            });
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(forward);
            } else if (&mut forward).now_or_never().is_none() {
                // The event may fire inside another executor, which must not
                // be entered again from here.
                std::thread::spawn(move || futures::executor::block_on(forward));
            }
        }
    }

    #[derive(Default)]
    struct SinkVisitor {
        message: Option<String>,
        fields: HashMap<String, String>,
    }

    impl SinkVisitor {
        fn record_value(&mut self, field: &Field, value: String) {
            if field.name() == "message" {
                self.message = Some(value);
            } else {
                self.fields.insert(field.name().to_string(), value);
            }
        }
    }

    impl Visit for SinkVisitor {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.record_value(field, value.to_string());
        }

        fn record_i64(&mut self, field: &Field, value: i64) {
            self.record_value(field, value.to_string());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.record_value(field, value.to_string());
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.record_value(field, value.to_string());
        }

        fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
            self.record_value(field, value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.record_value(field, format!("{value:?}"));
        }
    }

    fn level_of(level: tracing::Level) -> LogLevel {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use bridge_traits::time::LogEntry;
    use std::sync::Mutex;
    use std::task::Poll;
    use std::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    /// Sink whose `log` is pending on first poll.
    #[derive(Default)]
    struct YieldingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for YieldingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            let mut yielded = false;
            futures::future::poll_fn(|cx| {
                if yielded {
                    Poll::Ready(())
                } else {
                    yielded = true;
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            })
            .await;
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_bridge::events=trace")
            .with_spans(true)
            .with_target(false)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter.as_deref(), Some("core_bridge::events=trace"));
        assert!(config.enable_spans);
        assert!(!config.display_target);
        assert!(config.display_thread_info);
    }

    #[test]
    fn test_default_directives_cover_bridge_crates() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .filter_directives();

        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("core_bridge=debug"));
        assert!(directives.contains("core_modules=debug"));
        assert!(directives.contains("bridge_desktop=debug"));
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        let config = LoggingConfig::default().with_filter("core_bridge=loud");
        assert!(matches!(native::build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(RecordingSink::default());
        let layer = LoggerSinkLayer::new(Some(sink.clone() as Arc<dyn LoggerSink>));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::warn!(target: "core_bridge::invoker", module = "Ble", "Invalid response");
        tracing::trace!(target: "core_bridge::events", "below sink level");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].target, "core_bridge::invoker");
        assert_eq!(entries[0].message, "Invalid response");
        assert_eq!(entries[0].fields.get("module"), Some(&"Ble".to_string()));
    }

    #[test]
    fn test_logger_sink_layer_inside_executor() {
        let sink = Arc::new(YieldingSink::default());
        let layer = LoggerSinkLayer::new(Some(sink.clone() as Arc<dyn LoggerSink>));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        futures::executor::block_on(async {
            tracing::warn!(target: "core_bridge::events", "Event handler panicked");
        });

        let mut delivered = 0;
        for _ in 0..200 {
            delivered = sink.entries.lock().unwrap().len();
            if delivered > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(delivered, 1);
        assert_eq!(sink.entries.lock().unwrap()[0].message, "Event handler panicked");
    }
}
