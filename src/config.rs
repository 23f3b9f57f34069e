use serde::Deserialize;
use std::path::PathBuf;

/// Service-identity parameters for the hosted database.
///
/// All six values are opaque strings issued by the hosting environment
/// and are required; only `database_url` and `api_key` shape requests,
/// the rest identify the project the credentials belong to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub database_url: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
}

impl ServiceConfig {
    /// Load configuration with priority: env vars > config file.
    ///
    /// Every field must end up non-empty or loading fails.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(api_key) = std::env::var("ROLODEX_API_KEY") {
            config.api_key = api_key;
        }
        if let Ok(auth_domain) = std::env::var("ROLODEX_AUTH_DOMAIN") {
            config.auth_domain = auth_domain;
        }
        if let Ok(database_url) = std::env::var("ROLODEX_DATABASE_URL") {
            config.database_url = database_url;
        }
        if let Ok(project_id) = std::env::var("ROLODEX_PROJECT_ID") {
            config.project_id = project_id;
        }
        if let Ok(storage_bucket) = std::env::var("ROLODEX_STORAGE_BUCKET") {
            config.storage_bucket = storage_bucket;
        }
        if let Ok(sender_id) = std::env::var("ROLODEX_MESSAGING_SENDER_ID") {
            config.messaging_sender_id = sender_id;
        }

        config.validate()?;
        Ok(config)
    }

    /// Default config file path: ~/.config/rolodex/config.yaml
    pub fn default_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("rolodex")
            .join("config.yaml")
    }

    /// Checks that every required field is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("api_key", &self.api_key),
            ("auth_domain", &self.auth_domain),
            ("database_url", &self.database_url),
            ("project_id", &self.project_id),
            ("storage_bucket", &self.storage_bucket),
            ("messaging_sender_id", &self.messaging_sender_id),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(ConfigError::MissingField(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    MissingField(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::MissingField(field) => {
                write!(f, "Missing required config field '{}'", field)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
