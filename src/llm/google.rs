// Gemini through Google's OpenAI-compatible chat completions endpoint

use crate::llm::provider::LLMAdapter;
use crate::types::{AppResult, LLMRequest, LLMResponse};
use async_trait::async_trait;
use std::time::Duration;

const GEMINI_OPENAI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

pub struct GeminiAdapter {
    inner: crate::llm::openai::OpenAIAdapter,
}

impl GeminiAdapter {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        Self {
            inner: crate::llm::openai::OpenAIAdapter::new_with_api_base(
                api_key,
                GEMINI_OPENAI_API_BASE,
                timeout,
            ),
        }
    }
}

#[async_trait]
impl LLMAdapter for GeminiAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.inner.create_chat_completion(request).await
    }
}
