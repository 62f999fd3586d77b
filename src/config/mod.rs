mod settings;

pub use settings::{LocalizationConfig, LogFormat, LoggingConfig, ServerConfig, Settings};
