
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub provider: ProviderConfig,
    pub study: StudyConfig,
    /// Overrides the application home directory. Used by tests; normally unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

/// Connection settings for the OpenAI-compatible model provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyConfig {
    /// Language the assistant answers, summarizes and quizzes in.
    pub language: String,
    pub quiz_size: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Application directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid quiz size: {0} (must be between 1 and 50)")]
    InvalidQuizSize(u32),
    #[error("Invalid language: {0:?} (cannot be empty)")]
    InvalidLanguage(String),
    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
            },
            study: StudyConfig {
                language: "Italian".to_string(),
                quiz_size: 9,
            },
            base_dir: None,
        }
    }
}

impl Config {
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".studymate"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("studymate"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path =
            Self::config_file_path().context("Failed to determine config file path")?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let app_dir = Self::app_dir().context("Failed to determine application directory")?;

        fs::create_dir_all(&app_dir).with_context(|| {
            format!(
                "Failed to create application directory: {}",
                app_dir.display()
            )
        })?;

        let config_path = app_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider.validate()?;
        self.study.validate()
    }

    /// Root directory for all durable application state.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::app_dir(),
        }
    }

    /// Directory the user's study material is copied into before ingestion.
    pub fn upload_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("uploads"))
    }

    /// Hash-keyed record of prior summarize/embed results.
    pub fn cache_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("pipeline_cache.json"))
    }

    /// Storage location of the persisted index (catalog plus vectors).
    pub fn index_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("index"))
    }

    pub fn quiz_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("quiz.csv"))
    }

    pub fn session_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("session.toml"))
    }

    pub fn conversation_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("conversation.json"))
    }

    pub fn summary_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("summaries"))
    }

    /// Resolve the provider API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.provider.api_key_env)
            .map_err(|_| ConfigError::MissingApiKey(self.provider.api_key_env.clone()))
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.api_key_env.clone()));
        }

        Ok(())
    }
}

impl StudyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language.trim().is_empty() {
            return Err(ConfigError::InvalidLanguage(self.language.clone()));
        }

        if self.quiz_size == 0 || self.quiz_size > 50 {
            return Err(ConfigError::InvalidQuizSize(self.quiz_size));
        }

        Ok(())
    }
}
