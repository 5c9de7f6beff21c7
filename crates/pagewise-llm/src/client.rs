//! OpenAI-compatible chat completion client.

use crate::error::{LlmError, LlmResult};
use crate::traits::ChatModel;
use crate::types::*;
use async_trait::async_trait;
use pagewise_config::{EndpointConfig, LlmConfig};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for one chat-completion endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    options: SamplingOptions,
}

impl ChatClient {
    /// Create a client for one configured endpoint.
    pub fn from_endpoint(endpoint: &EndpointConfig, config: &LlmConfig) -> LlmResult<Self> {
        if endpoint.base_url.trim().is_empty() {
            return Err(LlmError::InvalidConfig(format!(
                "endpoint '{}' has no base_url",
                endpoint.name
            )));
        }

        let options = SamplingOptions {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        };

        let mut client = Self::new(&endpoint.base_url, &endpoint.model, config.timeout())?
            .with_options(options);
        client.api_key = endpoint.api_key.clone().filter(|k| !k.is_empty());
        if !endpoint.name.is_empty() {
            client.name = endpoint.name.clone();
        }
        Ok(client)
    }

    /// Create a new client with default sampling settings.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(LlmError::Http)?;

        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            name: base_url.clone(),
            base_url,
            model: model.to_string(),
            api_key: None,
            timeout,
            options: SamplingOptions::default(),
        })
    }

    /// Replace the sampling settings.
    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, prompt: &ChatPrompt) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: prompt.to_messages(),
            temperature: self.options.temperature,
            top_p: self.options.top_p,
            max_tokens: self.options.max_tokens,
            stream: false,
        }
    }

    /// Run one non-streaming chat completion.
    pub async fn chat(&self, prompt: &ChatPrompt) -> LlmResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "Chat completion on {} with model {} (prompt length {})",
            self.name,
            self.model,
            prompt.user.len()
        );

        let mut request = self.client.post(&url).json(&self.build_request(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::from_send(e, &self.base_url, self.timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ParseError("response has no message content".to_string()))?;

        debug!("Completion from {}: {} chars", self.name, content.len());
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &ChatPrompt) -> LlmResult<String> {
        self.chat(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> EndpointConfig {
        EndpointConfig {
            name: "gpu-0".to_string(),
            base_url: "http://localhost:9889/v1/".to_string(),
            model: "qwen".to_string(),
            api_key: Some("EMPTY".to_string()),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = ChatClient::from_endpoint(&endpoint(), &LlmConfig::default()).unwrap();
        assert_eq!(client.name(), "gpu-0");
        assert_eq!(client.base_url, "http://localhost:9889/v1");
        assert_eq!(client.model(), "qwen");
    }

    #[test]
    fn test_client_rejects_empty_url() {
        let mut endpoint = endpoint();
        endpoint.base_url = String::new();
        assert!(ChatClient::from_endpoint(&endpoint, &LlmConfig::default()).is_err());
    }

    #[test]
    fn test_request_body() {
        let client = ChatClient::from_endpoint(&endpoint(), &LlmConfig::default()).unwrap();
        let prompt = ChatPrompt::new("summarize").with_system("you are terse");
        let body = serde_json::to_value(client.build_request(&prompt)).unwrap();

        assert_eq!(body["model"], "qwen");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "summarize");
        assert_eq!(body["max_tokens"], 4096);
    }
}
