//! Registered-adapter table keyed by provider id.
//!
//! New backends are added by registering another [`LlmProvider`]; the
//! router itself never changes. Lookups of unknown ids fail closed.
//!
//! ```ignore
//! let mut router = ProviderRouter::new();
//! router.register(Arc::new(OpenAiProvider::new(transport)));
//!
//! let text = router.generate_text("Write a haiku", &options).await?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::transport::HttpTransport;
use super::{
    AnthropicProvider, AzureOpenAiProvider, GeminiProvider, LlmProvider, OpenAiProvider,
    ProviderError, ProviderOptions, Verdict,
};

/// The two calls every adapter supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    GenerateText,
    GenerateVerdict,
}

/// Result of [`ProviderRouter::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutput {
    Text(String),
    Verdict(Verdict),
}

/// Registry of available provider adapters.
#[derive(Default, Clone)]
pub struct ProviderRouter {
    adapters: BTreeMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with every built-in adapter sharing one transport.
    pub fn with_defaults(transport: Arc<dyn HttpTransport>) -> Self {
        let mut router = Self::new();
        router.register(Arc::new(OpenAiProvider::new(transport.clone())));
        router.register(Arc::new(AzureOpenAiProvider::new(transport.clone())));
        router.register(Arc::new(AnthropicProvider::new(transport.clone())));
        router.register(Arc::new(GeminiProvider::new(transport)));
        router
    }

    /// Register an adapter under its own id, replacing any existing one.
    pub fn register(&mut self, adapter: Arc<dyn LlmProvider>) {
        self.adapters
            .insert(adapter.provider_id().to_string(), adapter);
    }

    /// Adapter for `provider_id`, or [`ProviderError::UnsupportedProvider`].
    pub fn resolve(&self, provider_id: &str) -> Result<&Arc<dyn LlmProvider>, ProviderError> {
        self.adapters
            .get(provider_id)
            .ok_or_else(|| ProviderError::UnsupportedProvider(provider_id.to_string()))
    }

    /// Dispatch one capability to the adapter named by `options.provider_id`.
    pub async fn dispatch(
        &self,
        capability: Capability,
        options: &ProviderOptions,
        prompt: &str,
    ) -> Result<ProviderOutput, ProviderError> {
        let adapter = self.resolve(&options.provider_id)?;
        tracing::debug!(provider = %options.provider_id, ?capability, "Dispatching provider call");

        match capability {
            Capability::GenerateText => adapter
                .generate_text(prompt, options)
                .await
                .map(ProviderOutput::Text),
            Capability::GenerateVerdict => adapter
                .generate_verdict(prompt, options)
                .await
                .map(ProviderOutput::Verdict),
        }
    }

    pub async fn generate_text(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        self.resolve(&options.provider_id)?
            .generate_text(prompt, options)
            .await
    }

    pub async fn generate_verdict(
        &self,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError> {
        self.resolve(&options.provider_id)?
            .generate_verdict(prompt, options)
            .await
    }

    /// Run the adapter's option checks without calling it.
    pub fn validate(&self, options: &ProviderOptions) -> Result<(), ProviderError> {
        self.resolve(&options.provider_id)?.validate_options(options)
    }

    /// Registered provider ids, sorted.
    pub fn available_providers(&self) -> Vec<&str> {
        self.adapters.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    /// Registered adapters with their descriptions, sorted by id.
    pub fn describe(&self) -> Vec<(&str, &'static str)> {
        self.adapters
            .iter()
            .map(|(id, adapter)| (id.as_str(), adapter.description()))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("providers", &self.available_providers())
            .finish()
    }
}
