use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};
use async_trait::async_trait;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for an LLM provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    /// Overrides the provider's default endpoint
    pub base_url: Option<String>,
    pub timeout: std::time::Duration,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        let adapter: Box<dyn LLMAdapter> = match (provider.name.as_str(), provider.base_url.as_deref()) {
            ("openai-compatible", None) => {
                return Err(AppError::InvalidConfig(
                    "provider 'openai-compatible' requires LLM_BASE_URL".to_string(),
                ))
            }
            ("openai" | "groq" | "gemini" | "openai-compatible", Some(base)) => Box::new(
                crate::llm::openai::OpenAIAdapter::new_with_api_base(&provider.api_key, base, provider.timeout),
            ),
            ("openai", None) => Box::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key, provider.timeout)),
            ("groq", None) => Box::new(crate::llm::groq::GroqAdapter::new(&provider.api_key, provider.timeout)),
            // Gemini through Google's OpenAI-compatible endpoint
            ("gemini", None) => Box::new(crate::llm::google::GeminiAdapter::new(&provider.api_key, provider.timeout)),
            (other, _) => {
                return Err(AppError::InvalidConfig(format!(
                    "Unsupported LLM provider: {}",
                    other
                )))
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    /// Build the configured provider, or `None` when no API key is set
    pub fn from_config(config: &LLMConfig) -> AppResult<Option<Self>> {
        let Some(api_key) = config.active_api_key() else {
            return Ok(None);
        };

        Self::new(LLMProviderConfig {
            name: config.provider.clone(),
            api_key,
            base_url: config.base_url.clone(),
            timeout: config.request_timeout,
        })
        .map(Some)
    }

    /// Wrap an existing adapter
    pub fn from_adapter(name: impl Into<String>, adapter: Box<dyn LLMAdapter>) -> Self {
        Self {
            adapter,
            provider_name: name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
