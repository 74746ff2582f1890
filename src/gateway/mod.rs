pub mod llm;
pub mod prompt;

pub use llm::LlmClient;
pub use prompt::{user_prompt, SYSTEM_PROMPT};

use crate::utils::truncate_chars;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("Model returned an empty response")]
    EmptyResponse,
    #[error("Model call timed out")]
    Timeout,
    #[error("Provider configuration error: {0}")]
    Configuration(String),
}

/// Longest provider error body echoed back to callers.
pub const MAX_PROVIDER_MESSAGE_CHARS: usize = 500;

impl ProviderError {
    /// Text safe to hand to API callers: no endpoint URLs, bounded length.
    pub fn message(&self) -> String {
        let message = match self {
            ProviderError::Http(e) if e.is_connect() => {
                "could not connect to the model provider".to_string()
            }
            ProviderError::Http(e) if e.is_decode() => {
                "model provider returned an unreadable response".to_string()
            }
            ProviderError::Http(e) => match e.status() {
                Some(status) => format!("model provider request failed with HTTP {status}"),
                None => "model provider request failed".to_string(),
            },
            ProviderError::Api(detail) => detail.clone(),
            ProviderError::EmptyResponse => "model returned an empty response".to_string(),
            ProviderError::Timeout => "model call timed out".to_string(),
            ProviderError::Configuration(_) => "model provider is misconfigured".to_string(),
        };
        truncate_chars(&message, MAX_PROVIDER_MESSAGE_CHARS)
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ProviderError::Timeout => true,
            ProviderError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Anything that can turn screenshots plus a prompt pair into raw model text.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(
        &self,
        images: &[String],
        mime_type: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError>;
}
