use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::color::Color;
use crate::language::{LanguageInfo, LanguageSet};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Required in `X-Admin-Key` for admin routes when set
    #[serde(default)]
    pub admin_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Additional languages; the default language may be listed to give it aliases
    #[serde(default)]
    pub languages: Vec<LanguageInfo>,
    /// Directory with `templates.json`, `translations/` and optional palette/plurals
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,
    /// Used for unknown color keys
    #[serde(default = "default_color")]
    pub default_color: Color,
    /// Messages kept per player in the outbox
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_language() -> String {
    "en-us".to_string()
}

fn default_color() -> Color {
    Color::WHITE
}

fn default_outbox_capacity() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("localization.default_language", "en-us")?
            .set_default("logging.level", "info")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER_PORT, SERVER_HOST, LOGGING_LEVEL, LOGGING_FORMAT, etc.
            .add_source(Environment::default().separator("_").try_parsing(true));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.localization.default_language.trim().is_empty() {
            return Err(ConfigError::Message(
                "localization.default_language must not be empty".to_string(),
            ));
        }
        if let Some(info) = self.localization.languages.iter().find(|l| l.code.as_str().is_empty()) {
            return Err(ConfigError::Message(format!(
                "language entry with empty code (aliases: {:?})",
                info.aliases
            )));
        }
        Ok(())
    }
}

impl LocalizationConfig {
    pub fn language_set(&self) -> LanguageSet {
        LanguageSet::new(&self.default_language, self.languages.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            admin_key: None,
        }
    }
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            languages: vec![],
            catalog_dir: None,
            default_color: default_color(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
