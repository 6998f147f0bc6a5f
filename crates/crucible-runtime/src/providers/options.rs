//! Per-run provider options.

use super::secrets::{ApiCredential, CredentialSource};
use super::ProviderError;

/// Provider id of the adapter that takes a deployment name.
pub(crate) const AZURE_OPENAI_ID: &str = "azure-openai";

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Options for one run. Immutable once the run starts.
///
/// `provider_id` selects the adapter. Which of `endpoint` and
/// `deployment_name` are required or forbidden depends on the adapter;
/// see [`LlmProvider::validate_options`](super::LlmProvider::validate_options).
#[derive(Debug)]
pub struct ProviderOptions {
    pub provider_id: String,
    pub model_name: String,
    api_key: ApiCredential,
    pub endpoint: Option<String>,
    pub deployment_name: Option<String>,
    /// Token limit for generation calls
    pub max_tokens: u32,
    /// Temperature for generation calls; verdicts always use 0.0
    pub temperature: Option<f32>,
}

impl ProviderOptions {
    pub fn new(
        provider_id: impl Into<String>,
        model_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_credential(
            provider_id,
            model_name,
            ApiCredential::new(api_key, CredentialSource::Programmatic),
        )
    }

    pub fn with_credential(
        provider_id: impl Into<String>,
        model_name: impl Into<String>,
        api_key: ApiCredential,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_name: model_name.into(),
            api_key,
            endpoint: None,
            deployment_name: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_deployment(mut self, deployment_name: impl Into<String>) -> Self {
        self.deployment_name = Some(deployment_name.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn api_key(&self) -> &ApiCredential {
        &self.api_key
    }

    /// Endpoint with any trailing slash removed, if set and non-blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/'))
            .filter(|e| !e.is_empty())
    }

    /// Deployment name, if set and non-blank.
    pub fn deployment(&self) -> Option<&str> {
        self.deployment_name
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Checks shared by every provider.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "API key is required for provider '{}'",
                self.provider_id
            )));
        }

        if let Some(endpoint) = self.endpoint() {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ProviderError::Configuration(
                    "endpoint must start with http:// or https://".to_string(),
                ));
            }
        }

        if self.max_tokens == 0 {
            return Err(ProviderError::Configuration(
                "max_tokens must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub(crate) fn require_model(&self) -> Result<(), ProviderError> {
        if self.model_name.trim().is_empty() {
            return Err(ProviderError::Configuration(format!(
                "model name is required for provider '{}'",
                self.provider_id
            )));
        }
        Ok(())
    }

    pub(crate) fn forbid_deployment(&self) -> Result<(), ProviderError> {
        if self.deployment().is_some() {
            return Err(ProviderError::Configuration(format!(
                "deployment name is only valid for provider '{}', not '{}'",
                AZURE_OPENAI_ID, self.provider_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret = "sk-live-super-secret";
        let options = ProviderOptions::new("openai", "gpt-4o", secret);

        let debug = format!("{:?}", options);
        assert!(!debug.contains(secret), "API key was exposed in Debug output!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_requires_api_key() {
        let options = ProviderOptions::new("openai", "gpt-4o", "");
        assert!(matches!(options.validate(), Err(ProviderError::Configuration(_))));
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let options = ProviderOptions::new("openai", "gpt-4o", "key").with_endpoint("api.local");
        assert!(options.validate().is_err());

        let options =
            ProviderOptions::new("openai", "gpt-4o", "key").with_endpoint("http://localhost:8080/");
        assert!(options.validate().is_ok());
        assert_eq!(options.endpoint(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_blank_deployment_counts_as_absent() {
        let options = ProviderOptions::new("openai", "gpt-4o", "key").with_deployment("  ");
        assert_eq!(options.deployment(), None);
        assert!(options.forbid_deployment().is_ok());
    }

    #[test]
    fn test_forbid_deployment_names_provider() {
        let options = ProviderOptions::new("anthropic", "claude", "key").with_deployment("prod");
        let err = options.forbid_deployment().unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }
}
