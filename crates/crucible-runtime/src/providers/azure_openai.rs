//! Azure OpenAI provider.
//!
//! Same wire format as OpenAI chat completions, addressed by resource
//! endpoint and deployment rather than by model name.

use async_trait::async_trait;
use std::sync::Arc;

use super::openai::{chat_body, read_chat_content};
use super::options::AZURE_OPENAI_ID;
use super::transport::{post_checked, HttpTransport};
use super::{parse_verdict, LlmProvider, ProviderError, ProviderOptions, Verdict};

const AZURE_API_VERSION: &str = "2024-02-01";

/// Azure OpenAI provider.
pub struct AzureOpenAiProvider {
    transport: Arc<dyn HttpTransport>,
}

impl AzureOpenAiProvider {
    pub const ID: &'static str = AZURE_OPENAI_ID;

    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn deployment_url(endpoint: &str, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint, deployment, AZURE_API_VERSION
        )
    }

    async fn chat(
        &self,
        prompt: &str,
        options: &ProviderOptions,
        verdict: bool,
    ) -> Result<String, ProviderError> {
        self.validate_options(options)?;

        let (Some(endpoint), Some(deployment)) = (options.endpoint(), options.deployment()) else {
            // validate_options guarantees both
            return Err(ProviderError::Configuration(
                "endpoint and deploymentName are required for Azure OpenAI".to_string(),
            ));
        };

        let url = Self::deployment_url(endpoint, deployment);
        let headers = vec![
            ("api-key", options.api_key().expose()),
            ("Content-Type", "application/json"),
        ];
        let body = chat_body(None, prompt, options, verdict);

        let response = post_checked(self.transport.as_ref(), Self::ID, &url, headers, &body).await?;
        read_chat_content(Self::ID, response)
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiProvider {
    fn provider_id(&self) -> &'static str {
        Self::ID
    }

    /// Endpoint and deployment are required; the model name is informational.
    fn validate_options(&self, options: &ProviderOptions) -> Result<(), ProviderError> {
        options.validate()?;

        if options.endpoint().is_none() {
            return Err(ProviderError::Configuration(
                "endpoint is required for Azure OpenAI".to_string(),
            ));
        }
        if options.deployment().is_none() {
            return Err(ProviderError::Configuration(
                "deploymentName is required for Azure OpenAI".to_string(),
            ));
        }
        Ok(())
    }

    async fn generate_text(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        self.chat(prompt, options, false).await
    }

    async fn generate_verdict(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError> {
        let content = self.chat(prompt, options, true).await?;
        parse_verdict(&content)
    }

    fn description(&self) -> &'static str {
        "Azure OpenAI deployments"
    }
}
