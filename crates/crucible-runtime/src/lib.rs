//! # crucible-runtime
//!
//! The async half of Crucible: everything that talks to an LLM.
//!
//! `crucible-core` decides *what* to ask (criteria, templates, case state).
//! This crate asks it:
//! - [`providers`]: adapters for OpenAI, Azure OpenAI, Anthropic, and Gemini,
//!   looked up by id in a [`ProviderRouter`]
//! - [`SuiteRunner`]: one verdict per criterion, sequential, errors recorded
//!   per criterion
//! - [`PipelineCaseRunner`]: optional generation, then the suite
//! - [`Orchestrator`]: every case under a concurrency limit, with live updates
//!
//! The runtime never reads the environment. Credentials and endpoints are
//! supplied by the caller in [`ProviderOptions`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use crucible_core::{CaseInput, SuiteKind};
//! use crucible_runtime::{
//!     Orchestrator, PipelineCaseRunner, ProviderOptions, ProviderRouter, RuntimeConfig,
//! };
//!
//! let config = RuntimeConfig::default();
//! let router = Arc::new(ProviderRouter::with_defaults(Arc::new(config.transport()?)));
//! let options = Arc::new(ProviderOptions::new("openai", "gpt-4o", api_key));
//!
//! let runner = PipelineCaseRunner::builder(SuiteKind::Answer, router, options)
//!     .knowledge_base(knowledge_base)
//!     .build()?;
//!
//! let inputs = vec![CaseInput::parse(SuiteKind::Answer, "What is the refund window?")];
//! let run = Orchestrator::from_config(&config)
//!     .run(inputs, &runner, &|update| println!("{} {}", update.id(), update.status()))
//!     .await;
//! ```

pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod suite;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, RuntimeConfig};
pub use executor::BoundedExecutor;
pub use orchestrator::{CaseUpdate, Observer, Orchestrator};
pub use pipeline::{
    CaseError, CaseOutput, CaseRunner, PipelineBuilder, PipelineCaseRunner,
    EXECUTION_FAILED_REASON,
};
pub use providers::{
    parse_verdict, ApiCredential, Capability, CredentialSource, HttpTransport, LlmProvider,
    ProviderError, ProviderOptions, ProviderOutput, ProviderRouter, ReqwestTransport, Verdict,
    VerdictOutcome,
};
pub use suite::SuiteRunner;
