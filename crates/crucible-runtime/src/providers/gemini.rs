//! Google Gemini provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use super::transport::{post_checked, HttpTransport};
use super::{
    parse_verdict, LlmProvider, ProviderError, ProviderOptions, Verdict,
    VERDICT_SYSTEM_INSTRUCTION,
};

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` provider.
///
/// Verdicts are requested with `responseMimeType: application/json` and a
/// response schema, so the model returns the verdict object directly.
pub struct GeminiProvider {
    transport: Arc<dyn HttpTransport>,
}

impl GeminiProvider {
    pub const ID: &'static str = "gemini";

    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn verdict_schema() -> JsonValue {
        json!({
            "type": "OBJECT",
            "properties": {
                "result": {"type": "STRING", "enum": ["Pass", "Fail"]},
                "reason": {"type": "STRING"}
            },
            "required": ["result", "reason"]
        })
    }

    fn request_body(prompt: &str, options: &ProviderOptions, verdict: bool) -> JsonValue {
        let mut generation_config = json!({"maxOutputTokens": options.max_tokens});
        let mut body = json!({
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
        });

        if verdict {
            body["systemInstruction"] = json!({"parts": [{"text": VERDICT_SYSTEM_INSTRUCTION}]});
            generation_config["temperature"] = json!(0.0);
            generation_config["responseMimeType"] = json!("application/json");
            generation_config["responseSchema"] = Self::verdict_schema();
        } else if let Some(temperature) = options.temperature {
            generation_config["temperature"] = json!(temperature);
        }

        body["generationConfig"] = generation_config;
        body
    }

    async fn generate_content(
        &self,
        prompt: &str,
        options: &ProviderOptions,
        verdict: bool,
    ) -> Result<String, ProviderError> {
        self.validate_options(options)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            options.endpoint().unwrap_or(DEFAULT_GEMINI_BASE_URL),
            options.model_name.trim()
        );
        let headers = vec![
            ("x-goog-api-key", options.api_key().expose()),
            ("Content-Type", "application/json"),
        ];
        let body = Self::request_body(prompt, options, verdict);

        let response = post_checked(self.transport.as_ref(), Self::ID, &url, headers, &body).await?;
        let response: GeminiResponse = serde_json::from_value(response).map_err(|e| {
            ProviderError::transport(Self::ID, format!("Failed to parse response: {}", e))
        })?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::transport(Self::ID, "No text in response"))?;

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> &'static str {
        Self::ID
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        self.generate_content(prompt, options, false).await
    }

    async fn generate_verdict(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError> {
        let text = self.generate_content(prompt, options, true).await?;
        parse_verdict(&text)
    }

    fn description(&self) -> &'static str {
        "Google Gemini generateContent"
    }
}
