use super::{ModelGateway, ProviderError};
use crate::config::{Config, Provider};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: OpenAiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAiContent {
    Text(String),
    Parts(Vec<OpenAiPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

/// Model gateway backed by an HTTP chat endpoint. One call, no retries.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    provider: Provider,
    api_url: String,
    api_key: Option<String>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            provider: config.llm_provider,
            api_url: config.llm_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        })
    }

    fn ollama_request(
        &self,
        images: &[String],
        system_prompt: &str,
        user_prompt: &str,
    ) -> OllamaChatRequest {
        // Ollama expects raw base64, not data URLs
        OllamaChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                    images: None,
                },
                OllamaMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                    images: Some(images.to_vec()),
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }

    fn openai_request(
        &self,
        images: &[String],
        mime_type: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> OpenAiChatRequest {
        let mut parts = vec![OpenAiPart::Text {
            text: user_prompt.to_string(),
        }];
        parts.extend(images.iter().map(|data| OpenAiPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{mime_type};base64,{data}"),
            },
        }));

        OpenAiChatRequest {
            model: self.model_name.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: OpenAiContent::Text(system_prompt.to_string()),
                },
                OpenAiMessage {
                    role: "user",
                    content: OpenAiContent::Parts(parts),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<reqwest::Response, ProviderError> {
        let mut request = self.client.post(&self.api_url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Model endpoint returned HTTP {}", status);
            return Err(ProviderError::Api(format!("HTTP {status}: {error_text}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelGateway for LlmClient {
    async fn invoke(
        &self,
        images: &[String],
        mime_type: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        debug!(
            "Sending {} image(s) ({} chars total) to {} model {}",
            images.len(),
            images.iter().map(String::len).sum::<usize>(),
            self.provider,
            self.model_name
        );

        let content = match self.provider {
            Provider::Ollama => {
                let request = self.ollama_request(images, system_prompt, user_prompt);
                let completion: OllamaChatResponse = self.post(&request).await?.json().await?;
                completion.message.content
            }
            Provider::OpenAi => {
                let request = self.openai_request(images, mime_type, system_prompt, user_prompt);
                let completion: OpenAiChatResponse = self.post(&request).await?.json().await?;
                completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .unwrap_or_default()
            }
        };

        let content = content.trim();
        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        debug!("Model response received: {} chars", content.len());
        Ok(content.to_string())
    }
}
