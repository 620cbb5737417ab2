//! Logging setup
//!
//! Console output uses `timestamp [LEVEL] message`. When a log directory is
//! configured, the same format is also written to a daily rolling file through
//! a non-blocking writer; the returned [`WorkerGuard`] must be kept alive for
//! the lifetime of the process.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] Connected to 192.168.1.50:4001`
pub struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set (e.g. "info", "debug,xcom=trace")
    pub level: String,
    /// Directory for daily rolling log files; console only when unset
    pub log_dir: Option<PathBuf>,
    /// File name prefix, files are named `{prefix}.YYYY-MM-DD`
    pub file_prefix: String,
    /// Colored console output
    pub ansi: bool,
    /// JSON lines in the log file instead of the bracketed format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_prefix: "xcom".to_string(),
            ansi: true,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        EnvFilter::try_new(&self.level)
            .with_context(|| format!("invalid log level '{}'", self.level))?;
        if self.file_prefix.trim().is_empty() {
            anyhow::bail!("log file prefix must not be empty");
        }
        Ok(())
    }
}

/// Filter directive in effect: `RUST_LOG` wins over the configured level
pub fn filter_directive(config: &LoggingConfig, rust_log: Option<String>) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}

/// Install the global subscriber
///
/// Returns the file writer guard when file logging is enabled.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let directive = filter_directive(config, std::env::var("RUST_LOG").ok());
    let env_filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let console_layer = fmt::layer()
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let layer = if config.json {
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!(filter = %directive, log_dir = ?config.log_dir, "Logging initialized");
    Ok(guard)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_bracketed_format() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(capture.clone())
                .with_ansi(false)
                .event_format(BracketedLevelFormat),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(code = 34, "Device returned error");
        });

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains(" [WARN] "), "{output}");
        assert!(output.contains("Device returned error"));
        assert!(output.contains("code=34"));
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_rust_log_takes_priority() {
        let config = LoggingConfig::default();
        assert_eq!(filter_directive(&config, None), "info");
        assert_eq!(
            filter_directive(&config, Some("debug,xcom=trace".into())),
            "debug,xcom=trace"
        );
        assert_eq!(filter_directive(&config, Some("  ".into())), "info");
    }

    #[test]
    fn test_validate() {
        assert!(LoggingConfig::default().validate().is_ok());
        let bad = LoggingConfig {
            level: "info,xcom=loud".into(),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!("level: debug\nlog_dir: {}\n", dir.path().display());
        let config: LoggingConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.log_dir.as_deref(), Some(dir.path()));
        assert_eq!(config.file_prefix, "xcom");
    }
}
