use crate::errors::types::{Error, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// How the controller's tracing output is rendered
///
/// The radio worker and executor log through `tracing` only; this decides
/// where those records go and which of them survive filtering.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Baseline level; `RUST_LOG` directives can raise individual targets
    pub level: Level,
    /// One JSON object per line, for collection by a log shipper
    pub json: bool,
    /// Source file and line on every record
    pub file_info: bool,
    /// Emit open/close records for spans such as the session start span
    pub log_spans: bool,
    /// Name reported in the startup line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "softap".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Log open and close of spans, which times the session bring-up
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    /// Whether records below INFO pass the baseline filter
    pub fn is_verbose(&self) -> bool {
        self.level > Level::INFO
    }
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` directives are honoured on top of the configured level.
/// Fails if a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::Logging(e.to_string()))
}

/// Level named on the command line or in `SOFTAP_LOG_LEVEL`; case-insensitive
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level.trim())
        .map_err(|_| Error::Config(format!("unknown log level '{}'", level)))
}

/// Startup record carrying the binary name and version as fields
pub fn log_welcome(config: &LoggingConfig, version: &str) {
    tracing::info!(
        app = %config.app_name,
        version,
        level = %config.level,
        json = config.json,
        "starting"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
    }

    #[test]
    fn rejects_unknown_level() {
        let err = parse_log_level("chatty").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse_log_level(" trace\n").unwrap(), Level::TRACE);
    }

    #[test]
    fn debug_and_trace_are_verbose() {
        assert!(LoggingConfig::new(Level::DEBUG, "softapd").is_verbose());
        assert!(!LoggingConfig::new(Level::WARN, "softapd").is_verbose());
    }

    #[test]
    fn builder_flags() {
        let config = LoggingConfig::new(Level::TRACE, "softapd")
            .with_json()
            .with_spans();
        assert!(config.json);
        assert!(config.log_spans);
        assert!(!config.file_info);
        assert_eq!(config.app_name, "softapd");
    }
}
