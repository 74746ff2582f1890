use crate::models::{ImagePolicy, MAX_IMAGES_PER_REQUEST};

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Request framing used when talking to the model endpoint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama `/api/chat`: raw base64 in a per-message `images` array
    Ollama,
    /// OpenAI-compatible chat completions with `image_url` data URLs
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => write!(f, "ollama"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_llm_provider")]
    pub llm_provider: Provider,

    pub llm_api_url: String,

    #[serde(default)]
    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_model_name")]
    pub llm_model_name: String,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_max_images")]
    pub max_images: usize,

    #[serde(default = "default_mime_type")]
    pub default_mime_type: String,
}

// Hand-written so the API key never ends up in logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("llm_provider", &self.llm_provider)
            .field("llm_api_url", &self.llm_api_url)
            .field(
                "llm_api_key",
                &self.llm_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("llm_model_name", &self.llm_model_name)
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("max_images", &self.max_images)
            .field("default_mime_type", &self.default_mime_type)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: Config = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    fn from_env_no_dotenv() -> Result<Self, ConfigError> {
        let config: Config = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.llm_api_url.starts_with("http://") && !self.llm_api_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "LLM API URL must start with http:// or https://: {}",
                self.llm_api_url
            )));
        }

        if self.llm_model_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "LLM model name must not be empty".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(ConfigError::Validation(format!(
                "LLM temperature must be between 0 and 2, got: {}",
                self.llm_temperature
            )));
        }

        if self.llm_max_tokens == 0 {
            return Err(ConfigError::Validation(
                "LLM max tokens must be greater than 0".into(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Request timeout must be greater than 0".into(),
            ));
        }

        if self.max_images == 0 || self.max_images > MAX_IMAGES_PER_REQUEST {
            return Err(ConfigError::Validation(format!(
                "Max images must be between 1 and {}, got: {}",
                MAX_IMAGES_PER_REQUEST, self.max_images
            )));
        }

        if !self.default_mime_type.starts_with("image/") {
            return Err(ConfigError::Validation(format!(
                "Default MIME type must be an image type, got: {}",
                self.default_mime_type
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy {
            max_images: self.max_images,
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_llm_provider() -> Provider {
    Provider::Ollama
}

fn default_llm_model_name() -> String {
    "llava:7b".to_string()
}

fn default_llm_temperature() -> f32 {
    0.2
}

fn default_llm_max_tokens() -> u32 {
    1200
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_max_images() -> usize {
    MAX_IMAGES_PER_REQUEST
}

fn default_mime_type() -> String {
    "image/jpeg".to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::env;

    pub(crate) fn create_test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            llm_provider: Provider::Ollama,
            llm_api_url: "http://localhost:11434/api/chat".to_string(),
            llm_api_key: None,
            llm_model_name: "llava:7b".to_string(),
            llm_temperature: 0.2,
            llm_max_tokens: 1200,
            request_timeout_seconds: 60,
            max_images: 4,
            default_mime_type: "image/jpeg".to_string(),
        }
    }

    // The only test in the crate that touches process environment
    #[test]
    fn test_config_defaults_from_env() {
        for key in [
            "HOST",
            "PORT",
            "LLM_PROVIDER",
            "LLM_API_KEY",
            "LLM_MODEL_NAME",
            "LLM_TEMPERATURE",
            "LLM_MAX_TOKENS",
            "REQUEST_TIMEOUT_SECONDS",
            "MAX_IMAGES",
            "DEFAULT_MIME_TYPE",
        ] {
            env::remove_var(key);
        }
        env::set_var("LLM_API_URL", "http://localhost:11434/api/chat");

        let config = Config::from_env_no_dotenv().expect("Failed to load config with defaults");

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.llm_provider, Provider::Ollama);
        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.llm_model_name, "llava:7b");
        assert_eq!(config.llm_max_tokens, 1200);
        assert_eq!(config.request_timeout_seconds, 60);
        assert_eq!(config.max_images, 4);
        assert_eq!(config.default_mime_type, "image/jpeg");

        env::set_var("LLM_PROVIDER", "openai");
        env::set_var("MAX_IMAGES", "1");
        let config = Config::from_env_no_dotenv().expect("Failed to load overridden config");
        assert_eq!(config.llm_provider, Provider::OpenAi);
        assert_eq!(config.image_policy(), ImagePolicy::single());

        env::remove_var("LLM_PROVIDER");
        env::remove_var("MAX_IMAGES");
        env::remove_var("LLM_API_URL");
    }

    #[test]
    fn test_config_validation_invalid_url() {
        let config = Config {
            llm_api_url: "invalid-url".to_string(),
            ..create_test_config()
        };

        let error_msg = config.validate().unwrap_err().to_string();
        assert!(error_msg.contains("must start with http:// or https://"));
    }

    #[test]
    fn test_config_validation_max_images() {
        for max_images in [0, 5] {
            let config = Config {
                max_images,
                ..create_test_config()
            };
            let result = config.validate();
            assert!(result
                .unwrap_err()
                .to_string()
                .contains("Max images must be between"));
        }
    }

    #[test]
    fn test_config_validation_ranges() {
        let config = Config {
            llm_temperature: 3.5,
            ..create_test_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            request_timeout_seconds: 0,
            ..create_test_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_mime_type: "text/plain".to_string(),
            ..create_test_config()
        };
        assert!(config.validate().is_err());

        assert!(create_test_config().validate().is_ok());
    }

    #[test]
    fn test_helper_methods() {
        let config = create_test_config();

        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.server_address(), "127.0.0.1:3000");
        assert_eq!(config.image_policy(), ImagePolicy::multi());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            llm_api_key: Some("sk-very-secret".to_string()),
            ..create_test_config()
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
