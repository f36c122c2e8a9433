use serde::Deserialize;

use crate::telemetry::TelemetryConfig;

pub const CONFIG_FILE: &str = "config";
pub const CONFIG_ENV_PREFIX: &str = "SAFETYSIGHT";
pub const CONFIG_ENV_SEPARATOR: &str = "__";

#[derive(Default, Clone, Deserialize, Debug)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub assist: AssistConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Deserialize, Debug)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }
    fn default_port() -> u16 {
        8000
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_url")]
    pub url: String,
    #[serde(default = "DatabaseConfig::default_name")]
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Run cascading deletes inside a multi-document transaction. Needs a
    /// replica set; standalone servers reject transactions.
    #[serde(default)]
    pub transactions: bool,
}

impl DatabaseConfig {
    fn default_url() -> String {
        "mongodb://localhost:27017".to_string()
    }
    fn default_name() -> String {
        "safetysight".to_string()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            name: Self::default_name(),
            username: None,
            auth_token: None,
            transactions: false,
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct AssistConfig {
    #[serde(default = "AssistConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "AssistConfig::default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "AssistConfig::default_user_agent")]
    pub user_agent: String,
}

impl AssistConfig {
    fn default_endpoint() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }
    fn default_model() -> String {
        "gemini-1.5-flash".to_string()
    }
    fn default_user_agent() -> String {
        "SafetySight/0.1".to_string()
    }
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            model: Self::default_model(),
            api_key: Default::default(),
            user_agent: Self::default_user_agent(),
        }
    }
}

/// Layers `config.yaml`, any yaml files named on the command line, then
/// `SAFETYSIGHT__*` environment variables.
pub fn build_config<I>(args: I) -> anyhow::Result<Settings>
where
    I: IntoIterator<Item = String>,
{
    let mut config = config::Config::builder().add_source(
        config::File::with_name(CONFIG_FILE)
            .required(false)
            .format(config::FileFormat::Yaml),
    );
    for arg in args {
        if arg.ends_with("yaml") || arg.ends_with("yml") {
            config = config.add_source(
                config::File::from(std::path::Path::new(arg.as_str()))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }
    }
    config = config.add_source(
        config::Environment::with_prefix(CONFIG_ENV_PREFIX)
            .separator(CONFIG_ENV_SEPARATOR)
            .try_parsing(true),
    );
    Ok(config.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_fall_back_to_defaults() {
        let settings: Settings = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.database.url, "mongodb://localhost:27017");
        assert_eq!(settings.database.name, "safetysight");
        assert!(!settings.database.transactions);
        assert_eq!(settings.assist.model, "gemini-1.5-flash");
        assert!(settings.telemetry.enable);
    }

    #[test]
    fn yaml_overrides_single_fields() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "database:\n  name: plant_b\n  transactions: true\nserver:\n  port: 9090\n",
                config::FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.database.name, "plant_b");
        assert!(settings.database.transactions);
        assert_eq!(settings.database.url, "mongodb://localhost:27017");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
    }
}
