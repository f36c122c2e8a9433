use serde::Deserialize;
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Logging configuration
#[derive(Deserialize, Clone, Debug)]
pub struct TelemetryConfig {
    #[serde(default = "default_enabled")]
    pub enable: bool,
    /// Default level for every target
    #[serde(default)]
    pub max_level: LoggingLevel,
    /// Extra directives, e.g. `mongodb=warn,safetysight=debug`
    #[serde(default)]
    pub level_filter: String,
    /// Name of an environment variable holding extra directives
    #[serde(default)]
    pub level_filter_env: String,
    /// Print file, line, thread and target with each event
    #[serde(default)]
    pub enable_debug_logging: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable: default_enabled(),
            max_level: Default::default(),
            level_filter: Default::default(),
            level_filter_env: Default::default(),
            enable_debug_logging: Default::default(),
        }
    }
}

#[derive(Default, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    Off,
}

impl From<LoggingLevel> for LevelFilter {
    fn from(val: LoggingLevel) -> Self {
        match val {
            LoggingLevel::Error => LevelFilter::ERROR,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Trace => LevelFilter::TRACE,
            LoggingLevel::Off => LevelFilter::OFF,
        }
    }
}

impl From<LoggingLevel> for Directive {
    fn from(val: LoggingLevel) -> Self {
        let level: LevelFilter = val.into();
        level.into()
    }
}

fn default_enabled() -> bool {
    true
}

pub fn env_filter(config: &TelemetryConfig) -> EnvFilter {
    let mut directives = config.level_filter.clone();
    if !config.level_filter_env.is_empty() {
        if let Ok(extra) = std::env::var(&config.level_filter_env) {
            if !directives.is_empty() {
                directives.push(',');
            }
            directives.push_str(&extra);
        }
    }
    EnvFilter::builder()
        .with_default_directive(config.max_level.clone().into())
        .parse_lossy(directives)
}

pub fn initialize_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    if !config.enable {
        return Ok(());
    }
    let debug = config.enable_debug_logging;
    let console = tracing_subscriber::fmt::layer()
        .with_file(debug)
        .with_line_number(debug)
        .with_thread_ids(debug)
        .with_target(debug)
        .with_filter(env_filter(config));
    Registry::default().with(console).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info_and_enabled() {
        let config = TelemetryConfig::default();
        assert!(config.enable);
        assert_eq!(config.max_level, LoggingLevel::Info);
        assert_eq!(LevelFilter::from(config.max_level), LevelFilter::INFO);
    }

    #[test]
    fn extra_directives_are_parsed_leniently() {
        let config = TelemetryConfig {
            level_filter: "mongodb=warn,not a directive".to_string(),
            ..Default::default()
        };
        let filter = env_filter(&config).to_string();
        assert!(filter.contains("mongodb=warn"));
    }
}
