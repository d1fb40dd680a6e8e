use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings file not found: {0}")]
    SettingsFileNotFound(String),

    #[error("Invalid value '{value}' for environment variable {var}: {reason}")]
    InvalidEnvVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid provider settings: {0}")]
    Invalid(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Retry(#[from] ddcloud_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
