// Local crates
use crate::helpers::load_config::{LogFileConfig, LogFormat, LoggingConfig, RotationPolicy};
use crate::instrumentation::format::StandardFormat;

// External crates
use std::io;
use std::panic;
use thiserror::Error;
use tracing::{Dispatch, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender, Rotation};
use tracing_error::{ErrorLayer, SpanTrace};
use tracing_subscriber::{
    Layer,
    filter::EnvFilter,
    fmt::{self, writer::BoxMakeWriter},
    prelude::*,
    registry::Registry,
};

/// Failures raised while building a [`LoggingContext`].
#[derive(Debug, Error)]
pub enum InstrumentationError {
    #[error("invalid log filter {directives:?}: {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("failed to open log file in {directory:?}: {source}")]
    LogFile {
        directory: std::path::PathBuf,
        #[source]
        source: rolling::InitError,
    },

    #[error("a global logging dispatcher is already installed")]
    AlreadyInstalled(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

/// Explicitly constructed logging configuration.
///
/// Holds the composed subscriber as a [`Dispatch`]; building one has no side
/// effects. [`LoggingContext::install`] makes it the process-wide dispatcher,
/// [`LoggingContext::in_scope`] applies it to the current thread only.
pub struct LoggingContext {
    dispatch: Dispatch,
    guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingContext")
            .field("file_writer", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

impl LoggingContext {
    /// Build the context writing to stderr, or to the configured log file.
    pub fn new(cfg: &LoggingConfig) -> Result<Self, InstrumentationError> {
        match &cfg.file {
            Some(file_cfg) => {
                let appender = file_appender(file_cfg)?;
                let (non_blocking_writer, guard) = tracing_appender::non_blocking(appender);
                let dispatch = build_dispatch(cfg, BoxMakeWriter::new(non_blocking_writer))?;
                Ok(Self {
                    dispatch,
                    guard: Some(guard),
                })
            }
            None => Self::with_writer(cfg, BoxMakeWriter::new(io::stderr)),
        }
    }

    /// Build the context around an arbitrary writer, ignoring `cfg.file`.
    pub fn with_writer(
        cfg: &LoggingConfig,
        writer: BoxMakeWriter,
    ) -> Result<Self, InstrumentationError> {
        Ok(Self {
            dispatch: build_dispatch(cfg, writer)?,
            guard: None,
        })
    }

    /// Install the context as the global dispatcher for every thread.
    ///
    /// Succeeds once per process. The returned guard flushes the file writer
    /// when dropped and must be held until logging is no longer needed.
    pub fn install(self) -> Result<Option<WorkerGuard>, InstrumentationError> {
        let Self { dispatch, guard } = self;
        tracing::dispatcher::set_global_default(dispatch)?;
        Ok(guard)
    }

    /// Run `f` with this context as the current thread's dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

fn file_appender(cfg: &LogFileConfig) -> Result<RollingFileAppender, InstrumentationError> {
    let rotation = match cfg.rotation {
        RotationPolicy::Never => Rotation::NEVER,
        RotationPolicy::Minutely => Rotation::MINUTELY,
        RotationPolicy::Hourly => Rotation::HOURLY,
        RotationPolicy::Daily => Rotation::DAILY,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&cfg.file_name)
        .build(&cfg.directory)
        .map_err(|source| InstrumentationError::LogFile {
            directory: cfg.directory.clone(),
            source,
        })
}

fn env_filter(cfg: &LoggingConfig) -> Result<EnvFilter, InstrumentationError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(rust_log.as_deref(), cfg)
}

/// A non-empty, parseable `RUST_LOG` wins over the configured directives.
fn filter_from(
    rust_log: Option<&str>,
    cfg: &LoggingConfig,
) -> Result<EnvFilter, InstrumentationError> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return Ok(filter),
            // Logging is not up yet, stderr is the only channel
            Err(e) => eprintln!(
                "warning: ignoring invalid {} {directives:?}: {e}",
                EnvFilter::DEFAULT_ENV
            ),
        }
    }
    EnvFilter::try_new(&cfg.level).map_err(|e| InstrumentationError::InvalidFilter {
        directives: cfg.level.clone(),
        reason: e.to_string(),
    })
}

fn build_dispatch(
    cfg: &LoggingConfig,
    writer: BoxMakeWriter,
) -> Result<Dispatch, InstrumentationError> {
    let filter = env_filter(cfg)?;

    let fmt_layer = match cfg.format {
        LogFormat::Text => fmt::layer()
            .event_format(StandardFormat::from(cfg))
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .boxed(),
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(filter)
        .with(ErrorLayer::default());

    Ok(Dispatch::new(subscriber))
}

/// Route panics through the current dispatcher with their span trace, then
/// hand them to the previously installed hook so stderr still reports them.
pub fn init_panic_handler() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let msg = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Unknown panic");

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            panic_message = %msg,
            location = %location,
            span_trace = %SpanTrace::capture(),
            "Application panicked!"
        );

        previous(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::load_config::SourceStyle;
    use regex::Regex;
    use std::io::Write;
    use tracing_subscriber::filter::LevelFilter;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn writer(&self) -> BoxMakeWriter {
            let sink = self.clone();
            BoxMakeWriter::new(move || sink.clone())
        }

        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn text_lines_carry_the_standard_prefix() {
        let captured = Captured::default();
        let ctx = LoggingContext::with_writer(&LoggingConfig::default(), captured.writer()).unwrap();

        ctx.in_scope(|| tracing::info!("hello from the executor"));

        let line = captured.contents();
        let expected = Regex::new(
            r"^\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}\.\d{6} tracing\.rs:\d+: hello from the executor\n$",
        )
        .unwrap();
        assert!(expected.is_match(&line), "unexpected line: {line:?}");
    }

    #[test]
    fn structured_fields_follow_the_message() {
        let captured = Captured::default();
        let cfg = LoggingConfig {
            source: SourceStyle::None,
            ..LoggingConfig::default()
        };
        let ctx = LoggingContext::with_writer(&cfg, captured.writer()).unwrap();

        ctx.in_scope(|| tracing::info!(attempt = 3, "retrying"));

        assert!(captured.contents().ends_with(" retrying attempt=3\n"));
    }

    #[test]
    fn events_below_configured_level_are_dropped() {
        let captured = Captured::default();
        let cfg = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        let ctx = LoggingContext::with_writer(&cfg, captured.writer()).unwrap();

        ctx.in_scope(|| {
            tracing::info!("quiet");
            tracing::warn!("loud");
        });

        let out = captured.contents();
        assert!(!out.contains("quiet"));
        assert!(out.contains("loud"));
    }

    #[test]
    fn json_format_emits_objects() {
        let captured = Captured::default();
        let cfg = LoggingConfig {
            format: LogFormat::Json,
            ..LoggingConfig::default()
        };
        let ctx = LoggingContext::with_writer(&cfg, captured.writer()).unwrap();

        ctx.in_scope(|| tracing::info!("structured"));

        let out = captured.contents();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["fields"]["message"], "structured");
        assert_eq!(value["level"], "INFO");
        assert!(value["line_number"].is_number());
    }

    #[test]
    fn context_is_not_installed_outside_its_scope() {
        let captured = Captured::default();
        let ctx = LoggingContext::with_writer(&LoggingConfig::default(), captured.writer()).unwrap();

        tracing::info!("outside");
        ctx.in_scope(|| tracing::info!("inside"));

        let out = captured.contents();
        assert!(!out.contains("outside"));
        assert!(out.contains("inside"));
    }

    #[test]
    fn file_destination_writes_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            file: Some(LogFileConfig {
                directory: dir.path().to_path_buf(),
                file_name: "llmo.log".to_string(),
                rotation: RotationPolicy::Never,
            }),
            ..LoggingConfig::default()
        };

        let ctx = LoggingContext::new(&cfg).unwrap();
        ctx.in_scope(|| tracing::info!("to disk"));
        drop(ctx);

        let written = std::fs::read_to_string(dir.path().join("llmo.log")).unwrap();
        assert!(written.contains("to disk"));
    }

    #[test]
    fn rust_log_overrides_configured_level() {
        let filter = filter_from(Some("trace"), &LoggingConfig::default()).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn empty_rust_log_counts_as_unset() {
        for blank in ["", "   "] {
            let filter = filter_from(Some(blank), &LoggingConfig::default()).unwrap();
            assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
        }
    }

    #[test]
    fn invalid_rust_log_falls_back_to_configured_level() {
        let cfg = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        let filter = filter_from(Some("llmo=loud"), &cfg).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }
}
