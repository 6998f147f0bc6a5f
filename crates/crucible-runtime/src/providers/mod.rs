//! LLM provider abstractions for crucible-runtime.
//!
//! This module defines the trait every backend adapter implements and
//! includes adapters for OpenAI, Azure OpenAI, Anthropic, and Gemini.
//! Adapters are registered in a [`ProviderRouter`] and looked up by id.
//!
//! ## Security
//!
//! API keys are held in [`ApiCredential`] and never appear in `Debug`
//! or `Display` output. See the [`secrets`] module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

mod anthropic;
mod azure_openai;
mod gemini;
mod openai;
mod options;
mod router;
pub mod secrets;
pub mod transport;

pub use anthropic::AnthropicProvider;
pub use azure_openai::AzureOpenAiProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use options::ProviderOptions;
pub use router::{Capability, ProviderOutput, ProviderRouter};
pub use secrets::{ApiCredential, CredentialSource};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Missing or forbidden provider-specific options. Raised before any I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported provider: '{0}'")]
    UnsupportedProvider(String),

    /// Transport or HTTP failure, with the most specific message available.
    #[error("{provider} API error: {message}")]
    Transport { provider: String, message: String },

    #[error("Invalid verdict: {0}")]
    VerdictParse(String),
}

impl ProviderError {
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// System instruction sent with every structured-verdict request.
pub const VERDICT_SYSTEM_INSTRUCTION: &str = "You are an evaluation assistant. \
Respond ONLY with a JSON object of the form \
{\"result\": \"Pass\" | \"Fail\", \"reason\": \"<one or two sentence rationale>\"}. \
Do not include any other text.";

/// Pass/Fail outcome of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictOutcome {
    Pass,
    Fail,
}

/// A structured Pass/Fail judgment with rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub result: VerdictOutcome,
    pub reason: String,
}

/// Parse a verdict from raw model output.
///
/// Accepts the JSON object bare or inside a Markdown code fence. `result`
/// must be a string: `"Pass"` maps to Pass, anything else to Fail.
pub fn parse_verdict(raw: &str) -> Result<Verdict, ProviderError> {
    let body = strip_code_fence(raw.trim());

    let value: JsonValue = serde_json::from_str(body)
        .map_err(|e| ProviderError::VerdictParse(format!("response is not valid JSON: {}", e)))?;

    let result = value
        .get("result")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ProviderError::VerdictParse("missing 'result' field".to_string()))?;

    let reason = value
        .get("reason")
        .and_then(JsonValue::as_str)
        .unwrap_or("No reason provided")
        .to_string();

    Ok(Verdict {
        result: if result == "Pass" {
            VerdictOutcome::Pass
        } else {
            VerdictOutcome::Fail
        },
        reason,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().trim_end_matches("```").trim()
}

/// Provider abstraction allows swapping LLM backends.
///
/// Both capabilities validate `options` before any transport call, so a
/// misconfigured provider fails with [`ProviderError::Configuration`]
/// without touching the network.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Id the router registers this adapter under, e.g. "openai".
    fn provider_id(&self) -> &'static str;

    /// Check provider-specific required and forbidden options.
    fn validate_options(&self, options: &ProviderOptions) -> Result<(), ProviderError> {
        options.validate()?;
        options.require_model()?;
        options.forbid_deployment()
    }

    /// Free-form completion.
    async fn generate_text(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError>;

    /// Completion constrained to a `{result, reason}` JSON verdict.
    async fn generate_verdict(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError>;

    /// Human-readable description of this provider.
    fn description(&self) -> &'static str {
        "LLM provider"
    }
}
