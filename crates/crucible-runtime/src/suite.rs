//! Evaluation suite runner.
//!
//! Sends one verdict request per criterion, in the mapping's order, one at
//! a time with a fixed pause before each call after the first. A failed criterion becomes an
//! `Error` result; the suite always returns one result per criterion.

use std::sync::Arc;
use std::time::Duration;

use crucible_core::{fill, Criterion, EvaluationPrompts, EvaluationResult, Placeholder, Substitutions};

use crate::executor::BoundedExecutor;
use crate::providers::{ProviderOptions, ProviderRouter, VerdictOutcome};

/// Runs every criterion of an [`EvaluationPrompts`] mapping against one text.
#[derive(Debug, Clone)]
pub struct SuiteRunner {
    router: Arc<ProviderRouter>,
    executor: BoundedExecutor,
}

impl SuiteRunner {
    pub fn new(router: Arc<ProviderRouter>, evaluation_delay: Duration) -> Self {
        Self {
            router,
            executor: BoundedExecutor::sequential(evaluation_delay),
        }
    }

    pub fn evaluation_delay(&self) -> Duration {
        self.executor.delay()
    }

    /// Evaluate `text` against every criterion in `prompts`.
    ///
    /// `context` supplies the other placeholders (question, knowledge base,
    /// and so on); `{textToEvaluate}` is always `text`.
    pub async fn run_suite(
        &self,
        text: &str,
        prompts: &EvaluationPrompts,
        context: &Substitutions,
        options: &ProviderOptions,
    ) -> Vec<EvaluationResult> {
        let substitutions = context.clone().with(Placeholder::TextToEvaluate, text);

        let requests: Vec<(Criterion, String)> = prompts
            .iter()
            .map(|(criterion, template)| (criterion, fill(template, &substitutions)))
            .collect();

        self.executor
            .run(requests, |(criterion, prompt)| async move {
                self.evaluate(criterion, &prompt, options).await
            })
            .await
    }

    async fn evaluate(
        &self,
        criterion: Criterion,
        prompt: &str,
        options: &ProviderOptions,
    ) -> EvaluationResult {
        match self.router.generate_verdict(prompt, options).await {
            Ok(verdict) => {
                tracing::debug!(%criterion, result = ?verdict.result, "Criterion evaluated");
                match verdict.result {
                    VerdictOutcome::Pass => EvaluationResult::pass(criterion, verdict.reason),
                    VerdictOutcome::Fail => EvaluationResult::fail(criterion, verdict.reason),
                }
            }
            Err(e) => {
                tracing::warn!(
                    %criterion,
                    provider = %options.provider_id,
                    error = %e,
                    "Criterion evaluation failed"
                );
                EvaluationResult::error(criterion, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use crate::testing::{fail, options_for, pass, ScriptedProvider};
    use crucible_core::{EvaluationStatus, SuiteKind};
    use std::collections::BTreeMap;
    use tokio::time::Instant;

    fn runner_with(provider: ScriptedProvider) -> (SuiteRunner, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let mut router = ProviderRouter::new();
        router.register(provider.clone());
        (SuiteRunner::new(Arc::new(router), Duration::ZERO), provider)
    }

    fn persona_prompts() -> EvaluationPrompts {
        EvaluationPrompts::for_suite(SuiteKind::Persona, &BTreeMap::new()).unwrap()
    }

    #[tokio::test]
    async fn test_one_result_per_criterion_in_order() {
        let (runner, _) = runner_with(ScriptedProvider::new("scripted"));
        let prompts = persona_prompts();

        let results = runner
            .run_suite("A persona", &prompts, &Substitutions::new(), &options_for("scripted"))
            .await;

        assert_eq!(results.len(), prompts.len());
        let criteria: Vec<Criterion> = results.iter().map(|r| r.criterion).collect();
        assert_eq!(criteria, prompts.criteria());
        assert!(results.iter().all(|r| r.status == EvaluationStatus::Pass));
    }

    #[tokio::test]
    async fn test_every_call_failing_still_completes_suite() {
        let (runner, provider) = runner_with(
            ScriptedProvider::new("scripted")
                .with_verdict(|_| Err(ProviderError::transport("scripted", "Rate limit reached"))),
        );
        let prompts = persona_prompts();

        let results = runner
            .run_suite("text", &prompts, &Substitutions::new(), &options_for("scripted"))
            .await;

        assert_eq!(results.len(), prompts.len());
        assert_eq!(provider.verdict_calls(), prompts.len());
        for result in &results {
            assert_eq!(result.status, EvaluationStatus::Error);
            assert_eq!(
                result.reason.as_deref(),
                Some("scripted API error: Rate limit reached")
            );
        }
    }

    #[tokio::test]
    async fn test_mixed_verdicts_and_errors() {
        let (runner, _) = runner_with(ScriptedProvider::new("scripted").with_verdict(|prompt| {
            if prompt.contains("Gender") {
                Ok(fail("Assumes the engineer is male."))
            } else if prompt.contains("Hate Speech") {
                Err(ProviderError::VerdictParse("missing 'result' field".to_string()))
            } else {
                Ok(pass("fine"))
            }
        }));
        let prompts = EvaluationPrompts::from_entries([
            (Criterion::Age, "Age: {textToEvaluate}"),
            (Criterion::Gender, "Gender: {textToEvaluate}"),
            (Criterion::HateSpeech, "Hate Speech: {textToEvaluate}"),
        ])
        .unwrap();

        let results = runner
            .run_suite("text", &prompts, &Substitutions::new(), &options_for("scripted"))
            .await;

        let statuses: Vec<EvaluationStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![EvaluationStatus::Pass, EvaluationStatus::Fail, EvaluationStatus::Error]
        );
        assert_eq!(results[1].reason.as_deref(), Some("Assumes the engineer is male."));
        assert!(results[2].reason.as_deref().unwrap_or_default().contains("result"));
    }

    #[tokio::test]
    async fn test_prompts_are_filled_with_text_and_context() {
        let (runner, provider) = runner_with(ScriptedProvider::new("scripted"));
        let prompts = EvaluationPrompts::from_entries([(
            Criterion::Groundedness,
            "KB={knowledgeBase} Q={question} A={textToEvaluate} X={unknown}",
        )])
        .unwrap();
        let context = Substitutions::new()
            .with(Placeholder::KnowledgeBase, "Refunds within 30 days.")
            .with(Placeholder::Question, "Refund window?");

        runner
            .run_suite("30 days.", &prompts, &context, &options_for("scripted"))
            .await;

        assert_eq!(
            provider.prompts(),
            vec!["KB=Refunds within 30 days. Q=Refund window? A=30 days. X={unknown}".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_becomes_error_results() {
        let (runner, provider) = runner_with(ScriptedProvider::new("scripted"));
        let prompts = persona_prompts();

        let results = runner
            .run_suite("text", &prompts, &Substitutions::new(), &options_for("missing"))
            .await;

        assert_eq!(results.len(), prompts.len());
        assert!(results.iter().all(|r| r.status == EvaluationStatus::Error));
        assert_eq!(provider.verdict_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_criteria() {
        let provider = Arc::new(ScriptedProvider::new("scripted"));
        let mut router = ProviderRouter::new();
        router.register(provider);
        let runner = SuiteRunner::new(Arc::new(router), Duration::from_millis(200));
        let prompts = EvaluationPrompts::from_entries([
            (Criterion::Age, "{textToEvaluate}"),
            (Criterion::Race, "{textToEvaluate}"),
            (Criterion::Violence, "{textToEvaluate}"),
        ])
        .unwrap();

        let start = Instant::now();
        runner
            .run_suite("text", &prompts, &Substitutions::new(), &options_for("scripted"))
            .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);
    }

    #[test]
    fn test_suite_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}

        let (runner, _) = runner_with(ScriptedProvider::new("scripted"));
        let prompts = persona_prompts();
        let context = Substitutions::new();
        let options = options_for("scripted");

        assert_send(&runner.run_suite("text", &prompts, &context, &options));
    }
}
