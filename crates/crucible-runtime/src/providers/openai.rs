//! OpenAI chat completions provider.
//!
//! Also hosts the chat-completions body builder and response reader that
//! the Azure OpenAI adapter shares.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use super::transport::{post_checked, HttpTransport};
use super::{
    parse_verdict, LlmProvider, ProviderError, ProviderOptions, Verdict,
    VERDICT_SYSTEM_INSTRUCTION,
};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// OpenAI API provider.
pub struct OpenAiProvider {
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiProvider {
    pub const ID: &'static str = "openai";

    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn chat_completions_url(options: &ProviderOptions) -> String {
        format!(
            "{}/v1/chat/completions",
            options.endpoint().unwrap_or(DEFAULT_OPENAI_BASE_URL)
        )
    }

    async fn chat(&self, body: JsonValue, options: &ProviderOptions) -> Result<String, ProviderError> {
        let auth_header = format!("Bearer {}", options.api_key().expose());
        let headers = vec![
            ("Authorization", auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        let url = Self::chat_completions_url(options);
        let response = post_checked(self.transport.as_ref(), Self::ID, &url, headers, &body).await?;
        read_chat_content(Self::ID, response)
    }
}

/// Chat-completions request body. `model` is omitted for Azure, where the
/// deployment in the URL selects the model.
pub(super) fn chat_body(
    model: Option<&str>,
    prompt: &str,
    options: &ProviderOptions,
    verdict: bool,
) -> JsonValue {
    let mut messages = Vec::new();
    if verdict {
        messages.push(json!({"role": "system", "content": VERDICT_SYSTEM_INSTRUCTION}));
    }
    messages.push(json!({"role": "user", "content": prompt}));

    let mut body = json!({
        "messages": messages,
        "max_tokens": options.max_tokens,
    });

    if let Some(model) = model {
        body["model"] = json!(model);
    }

    if verdict {
        body["temperature"] = json!(0.0);
        body["response_format"] = json!({"type": "json_object"});
    } else if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }

    body
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Text of the first choice of a chat-completions response.
pub(super) fn read_chat_content(provider: &str, body: JsonValue) -> Result<String, ProviderError> {
    let response: ChatResponse = serde_json::from_value(body).map_err(|e| {
        ProviderError::transport(provider, format!("Failed to parse response: {}", e))
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ProviderError::transport(provider, "No content in response"))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &'static str {
        Self::ID
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        self.validate_options(options)?;
        let body = chat_body(Some(&options.model_name), prompt, options, false);
        self.chat(body, options).await
    }

    async fn generate_verdict(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError> {
        self.validate_options(options)?;
        let body = chat_body(Some(&options.model_name), prompt, options, true);
        let content = self.chat(body, options).await?;
        parse_verdict(&content)
    }

    fn description(&self) -> &'static str {
        "OpenAI chat completions"
    }
}
