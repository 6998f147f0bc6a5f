//! Anthropic Claude provider implementation.
//!
//! Talks to the Messages API. Verdict requests carry the verdict
//! instruction as the `system` prompt and run at temperature 0.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::transport::{post_checked, HttpTransport};
use super::{
    parse_verdict, LlmProvider, ProviderError, ProviderOptions, Verdict,
    VERDICT_SYSTEM_INSTRUCTION,
};

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    transport: Arc<dyn HttpTransport>,
}

impl AnthropicProvider {
    pub const ID: &'static str = "anthropic";

    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    async fn messages(
        &self,
        request: AnthropicRequest<'_>,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1/messages",
            options.endpoint().unwrap_or(DEFAULT_ANTHROPIC_BASE_URL)
        );
        // Only expose the credential here, at the point of use
        let headers = vec![
            ("x-api-key", options.api_key().expose()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("content-type", "application/json"),
        ];

        let body = serde_json::to_value(&request)
            .map_err(|e| ProviderError::transport(Self::ID, e.to_string()))?;
        let response = post_checked(self.transport.as_ref(), Self::ID, &url, headers, &body).await?;

        let response: AnthropicResponse = serde_json::from_value(response).map_err(|e| {
            ProviderError::transport(Self::ID, format!("Failed to parse response: {}", e))
        })?;

        let content = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(ProviderError::transport(Self::ID, "No text content in response"));
        }
        Ok(content)
    }
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> AnthropicRequest<'a> {
    fn user(prompt: &'a str, options: &'a ProviderOptions) -> Self {
        Self {
            model: &options.model_name,
            max_tokens: options.max_tokens,
            system: None,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
        }
    }
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> &'static str {
        Self::ID
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        self.validate_options(options)?;
        self.messages(AnthropicRequest::user(prompt, options), options)
            .await
    }

    async fn generate_verdict(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError> {
        self.validate_options(options)?;
        let request = AnthropicRequest {
            system: Some(VERDICT_SYSTEM_INSTRUCTION),
            temperature: Some(0.0),
            ..AnthropicRequest::user(prompt, options)
        };
        let content = self.messages(request, options).await?;
        parse_verdict(&content)
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude messages"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{TransportResponse, VerdictOutcome};
    use crate::testing::MockTransport;
    use serde_json::{json, Value as JsonValue};

    fn message(text: &str) -> JsonValue {
        json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn test_generate_text_headers_and_body() {
        let transport = Arc::new(MockTransport::new().respond_ok(message("Bonjour")));
        let provider = AnthropicProvider::new(transport.clone());
        let options = ProviderOptions::new("anthropic", "claude-sonnet-4-5", "sk-ant-test");

        let text = provider.generate_text("Say hello in French", &options).await.unwrap();
        assert_eq!(text, "Bonjour");

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(request.header("x-api-key"), Some("sk-ant-test"));
        assert_eq!(request.header("anthropic-version"), Some("2023-06-01"));
        assert_eq!(request.body["model"], "claude-sonnet-4-5");
        assert_eq!(request.body["max_tokens"], 1024);
        assert!(request.body.get("system").is_none());
    }

    #[tokio::test]
    async fn test_generate_verdict_uses_system_instruction() {
        let transport = Arc::new(MockTransport::new().respond_ok(message(
            "```json\n{\"result\": \"Pass\", \"reason\": \"Neutral tone.\"}\n```",
        )));
        let provider = AnthropicProvider::new(transport.clone());
        let options = ProviderOptions::new("anthropic", "claude-sonnet-4-5", "key");

        let verdict = provider.generate_verdict("Evaluate", &options).await.unwrap();
        assert_eq!(verdict.result, VerdictOutcome::Pass);
        assert_eq!(verdict.reason, "Neutral tone.");

        let request = transport.last_request().unwrap();
        assert_eq!(request.body["system"], VERDICT_SYSTEM_INSTRUCTION);
        assert_eq!(request.body["temperature"], 0.0);
    }

    #[tokio::test]
    async fn test_multiple_text_blocks_are_joined() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Part one. "},
                {"type": "text", "text": "Part two."}
            ]
        });
        let transport = Arc::new(MockTransport::new().respond_ok(body));
        let provider = AnthropicProvider::new(transport);
        let options = ProviderOptions::new("anthropic", "claude", "key");

        let text = provider.generate_text("hi", &options).await.unwrap();
        assert_eq!(text, "Part one. Part two.");
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let transport = Arc::new(MockTransport::new().respond(TransportResponse::new(
            529,
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        )));
        let provider = AnthropicProvider::new(transport);
        let options = ProviderOptions::new("anthropic", "claude", "key");

        let err = provider.generate_text("hi", &options).await.unwrap_err();
        assert_eq!(err.to_string(), "anthropic API error: Overloaded");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_io() {
        let transport = Arc::new(MockTransport::new());
        let provider = AnthropicProvider::new(transport.clone());
        let options = ProviderOptions::new("anthropic", "claude", "");

        let err = provider.generate_verdict("Evaluate", &options).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert_eq!(transport.call_count(), 0);
    }
}
