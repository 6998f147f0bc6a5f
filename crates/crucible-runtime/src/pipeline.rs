//! Per-case pipeline: optional generation, then the evaluation suite.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crucible_core::{
    default_generation_template, fill, validate_generation_template, CaseInput, Criterion,
    EvaluationPrompts, EvaluationResult, Placeholder, PromptError, SuiteKind, Substitutions,
};

use crate::providers::{ProviderError, ProviderOptions, ProviderRouter};
use crate::suite::SuiteRunner;

/// Reason recorded in every evaluation slot of a failed answer case.
pub const EXECUTION_FAILED_REASON: &str = "Test execution failed";

/// Errors that abort a single case, or reject a pipeline at build time.
#[derive(Error, Debug)]
pub enum CaseError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// What a successful case produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutput {
    pub generated_text: String,
    pub evaluations: Vec<EvaluationResult>,
}

/// Runs one case's full pipeline.
#[async_trait]
pub trait CaseRunner: Send + Sync {
    async fn run(&self, input: &CaseInput) -> Result<CaseOutput, CaseError>;

    /// Evaluations recorded on a case that failed with `message`.
    fn failure_evaluations(&self, _message: &str) -> Vec<EvaluationResult> {
        Vec::new()
    }
}

/// The standard pipeline: generate with the suite's template (unless the
/// suite is evaluation-only), then evaluate the text against every
/// criterion.
///
/// A generation failure fails the case; evaluation failures are recorded
/// per criterion by the [`SuiteRunner`].
#[derive(Debug)]
pub struct PipelineCaseRunner {
    suite: SuiteKind,
    router: Arc<ProviderRouter>,
    options: Arc<ProviderOptions>,
    generation_template: Option<String>,
    prompts: EvaluationPrompts,
    context: Substitutions,
    suite_runner: SuiteRunner,
}

impl PipelineCaseRunner {
    pub fn builder(
        suite: SuiteKind,
        router: Arc<ProviderRouter>,
        options: Arc<ProviderOptions>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            suite,
            router,
            options,
            generation_template: None,
            prompts: None,
            prompt_overrides: BTreeMap::new(),
            context: Substitutions::new(),
            evaluation_delay: Duration::from_millis(200),
        }
    }

    pub fn suite(&self) -> SuiteKind {
        self.suite
    }

    pub fn prompts(&self) -> &EvaluationPrompts {
        &self.prompts
    }

    pub fn generation_template(&self) -> Option<&str> {
        self.generation_template.as_deref()
    }

    async fn generate(
        &self,
        input: &CaseInput,
        substitutions: &Substitutions,
    ) -> Result<String, CaseError> {
        let Some(template) = &self.generation_template else {
            return Ok(input.to_string());
        };

        let prompt = fill(template, substitutions);
        tracing::debug!(suite = %self.suite, provider = %self.options.provider_id, "Generating text");
        Ok(self.router.generate_text(&prompt, &self.options).await?)
    }
}

#[async_trait]
impl CaseRunner for PipelineCaseRunner {
    async fn run(&self, input: &CaseInput) -> Result<CaseOutput, CaseError> {
        let mut substitutions = self.context.clone();
        substitutions.extend(&input.substitutions());

        let generated_text = self.generate(input, &substitutions).await?;

        let evaluations = self
            .suite_runner
            .run_suite(&generated_text, &self.prompts, &substitutions, &self.options)
            .await;

        Ok(CaseOutput {
            generated_text,
            evaluations,
        })
    }

    fn failure_evaluations(&self, _message: &str) -> Vec<EvaluationResult> {
        if !self.suite.fills_failed_evaluations() {
            return Vec::new();
        }
        self.prompts
            .criteria()
            .into_iter()
            .map(|criterion| EvaluationResult::error(criterion, EXECUTION_FAILED_REASON))
            .collect()
    }
}

/// Builder for [`PipelineCaseRunner`].
pub struct PipelineBuilder {
    suite: SuiteKind,
    router: Arc<ProviderRouter>,
    options: Arc<ProviderOptions>,
    generation_template: Option<String>,
    prompts: Option<EvaluationPrompts>,
    prompt_overrides: BTreeMap<Criterion, String>,
    context: Substitutions,
    evaluation_delay: Duration,
}

impl PipelineBuilder {
    /// Replace the suite's built-in generation template.
    pub fn generation_template(mut self, template: impl Into<String>) -> Self {
        self.generation_template = Some(template.into());
        self
    }

    /// Use an explicit evaluation mapping. It must cover the whole suite.
    pub fn prompts(mut self, prompts: EvaluationPrompts) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Override built-in evaluation templates for some criteria.
    pub fn prompt_overrides(mut self, overrides: BTreeMap<Criterion, String>) -> Self {
        self.prompt_overrides = overrides;
        self
    }

    pub fn knowledge_base(mut self, knowledge_base: impl Into<String>) -> Self {
        self.context.set(Placeholder::KnowledgeBase, knowledge_base);
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.context.set(Placeholder::SystemPrompt, system_prompt);
        self
    }

    pub fn evaluation_delay(mut self, delay: Duration) -> Self {
        self.evaluation_delay = delay;
        self
    }

    /// Validate provider options and templates, then build.
    pub fn build(self) -> Result<PipelineCaseRunner, CaseError> {
        self.router.validate(&self.options)?;

        let prompts = match self.prompts {
            Some(prompts) => prompts,
            None => EvaluationPrompts::for_suite(self.suite, &self.prompt_overrides)?,
        };
        prompts.require_suite(self.suite)?;

        let generation_template = match (self.generation_template, self.suite.has_generation_step()) {
            (Some(_), false) => return Err(PromptError::NoGenerationStep(self.suite).into()),
            (None, false) => None,
            (Some(template), true) => Some(template),
            (None, true) => default_generation_template(self.suite).map(str::to_string),
        };
        if let Some(template) = &generation_template {
            validate_generation_template(self.suite, template)?;
        }

        Ok(PipelineCaseRunner {
            suite: self.suite,
            suite_runner: SuiteRunner::new(self.router.clone(), self.evaluation_delay),
            router: self.router,
            options: self.options,
            generation_template,
            prompts,
            context: self.context,
        })
    }
}
