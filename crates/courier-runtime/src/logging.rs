//! Logging setup built on `tracing-subscriber`.
//!
//! Every crate of the toolkit logs through `tracing` with structured fields;
//! this module installs the subscriber described by [`LoggingConfig`]. Each
//! update is handled inside a `dispatch` span, so span events show one
//! update's way through the pipeline.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new().load()?;
//! logging::init_from_config(&config.logging);
//! ```

use std::path::Path;

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the subscriber for `config`. One that is already installed is
/// left in place.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// A subscriber description derived from [`LoggingConfig`].
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    thread_ids: bool,
    locations: bool,
    rotation: LogRotation,
    max_files: usize,
    file_path: Option<std::path::PathBuf>,
}

impl LoggingBuilder {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={}", level.as_str()))
            .collect();
        directives.sort();

        Self {
            level: config.level.to_tracing_level(),
            directives,
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            thread_ids: config.thread_ids,
            locations: config.file_location,
            rotation: config.rotation,
            max_files: config.max_files as usize,
            file_path: config.file_path.clone(),
        }
    }

    /// `RUST_LOG` replaces the configured level; per-target filters apply
    /// on top of either.
    fn filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
        self.directives.iter().fold(filter, |filter, directive| match directive.parse() {
            Ok(d) => filter.add_directive(d),
            Err(err) => {
                warn!(directive = %directive, error = %err, "Ignoring invalid log filter");
                filter
            }
        })
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_writer(self.writer())
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(true)
            .with_thread_ids(self.thread_ids)
            .with_file(self.locations)
            .with_line_number(self.locations);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            _ => layer.boxed(),
        }
    }

    fn writer(&self) -> BoxMakeWriter {
        match self.output {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::File => match self.file_appender() {
                Some(appender) => BoxMakeWriter::new(appender),
                None => BoxMakeWriter::new(std::io::stdout),
            },
        }
    }

    /// The rolling appender for file output, or `None` to fall back to stdout.
    fn file_appender(&self) -> Option<RollingFileAppender> {
        let Some(path) = &self.file_path else {
            warn!("File output requested but no file path configured, falling back to stdout");
            return None;
        };

        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let prefix = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("courier.log");
        let rotation = match self.rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        };

        RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(prefix)
            .max_log_files(self.max_files.max(1))
            .build(directory)
            .inspect_err(|err| warn!(error = %err, "Failed to open log file, falling back to stdout"))
            .ok()
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(self.layer())
            .with(self.filter())
            .try_init()
    }
}
