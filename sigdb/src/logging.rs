//! Log configuration and subscriber setup
//!
//! Settings are layered: `SIGDB_LOG_FORMAT`/`SIGDB_LOG_LEVEL`, then the
//! `[log]` table of the config file, then command-line flags. Anything left
//! unset falls back to compact text at `warn`.

use std::env;

use crate::config::LogConfig;
use crate::error::{Result, SigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "text" | "plain" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "error" | "err" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" | "verbose" => Some(Self::Trace),
            _ => None,
        }
    }

    /// `EnvFilter` directive for this level
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// One layer of log settings; `None` defers to the layer below.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub format: Option<LogFormat>,
    pub level: Option<LogLevel>,
}

impl LogSettings {
    /// `SIGDB_LOG_FORMAT` and `SIGDB_LOG_LEVEL`; unrecognised values are ignored
    pub fn from_env() -> Self {
        let read = |key: &str| env::var_os(key).map(|value| value.to_string_lossy().into_owned());
        Self::from_env_values(
            read("SIGDB_LOG_FORMAT").as_deref(),
            read("SIGDB_LOG_LEVEL").as_deref(),
        )
    }

    fn from_env_values(format: Option<&str>, level: Option<&str>) -> Self {
        Self {
            format: format.and_then(LogFormat::parse),
            level: level.and_then(LogLevel::parse),
        }
    }

    /// Parse the `[log]` table; unknown values are configuration errors
    pub fn from_config(config: &LogConfig) -> Result<Self> {
        let format = match config.format.as_deref() {
            Some(spec) => Some(LogFormat::parse(spec).ok_or_else(|| {
                SigError::config_error(format!("unknown log format `{spec}`"))
            })?),
            None => None,
        };
        let level = match config.level.as_deref() {
            Some(spec) => Some(LogLevel::parse(spec).ok_or_else(|| {
                SigError::config_error(format!("unknown log level `{spec}`"))
            })?),
            None => None,
        };
        Ok(Self { format, level })
    }

    /// `over` wins wherever it is set
    #[must_use]
    pub fn layer(self, over: LogSettings) -> Self {
        Self {
            format: over.format.or(self.format),
            level: over.level.or(self.level),
        }
    }
}

/// Install the global subscriber once; later calls are no-ops.
pub fn init_logging(settings: LogSettings) {
    use std::io::IsTerminal;
    use std::sync::OnceLock;
    use tracing_subscriber::{EnvFilter, fmt};

    static INITIALISED: OnceLock<()> = OnceLock::new();

    let level = settings.level.unwrap_or_default();
    let _ = INITIALISED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.directive()));
        let builder = fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true);

        let _ = match settings.format.unwrap_or_default() {
            LogFormat::Json => {
                tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())
            }
            LogFormat::Text => {
                let use_ansi = env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
                let subscriber = builder.with_ansi(use_ansi).compact().finish();
                tracing::subscriber::set_global_default(subscriber)
            }
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_and_level_parse_expected_values() {
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("auto"), None);

        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("verbose"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("noop"), None);
        assert_eq!(LogLevel::Debug.directive(), "debug");
    }

    #[test]
    fn env_values_ignore_garbage() {
        let settings = LogSettings::from_env_values(Some("json"), Some("debug"));
        assert_eq!(settings.format, Some(LogFormat::Json));
        assert_eq!(settings.level, Some(LogLevel::Debug));

        let ignored = LogSettings::from_env_values(Some("xml"), None);
        assert_eq!(ignored, LogSettings::default());
    }

    #[test]
    fn later_layers_win() {
        let env = LogSettings::from_env_values(Some("text"), Some("warn"));
        let from_config = LogSettings::from_config(&LogConfig {
            level: Some("trace".into()),
            format: None,
        })
        .unwrap();
        let merged = env.layer(from_config);
        assert_eq!(merged.format, Some(LogFormat::Text));
        assert_eq!(merged.level, Some(LogLevel::Trace));

        let flags = LogSettings {
            format: Some(LogFormat::Json),
            level: None,
        };
        let merged = merged.layer(flags);
        assert_eq!(merged.format, Some(LogFormat::Json));
        assert_eq!(merged.level, Some(LogLevel::Trace));
    }

    #[test]
    fn config_rejects_unknown_values() {
        let err = LogSettings::from_config(&LogConfig {
            level: Some("loud".into()),
            format: None,
        })
        .unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn unset_layers_fall_back_to_text_at_warn() {
        let settings = LogSettings::default();
        assert_eq!(settings.format.unwrap_or_default(), LogFormat::Text);
        assert_eq!(settings.level.unwrap_or_default(), LogLevel::Warn);
    }
}
