//! Test cases, their lifecycle, and per-criterion results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::criteria::{Criterion, SuiteKind};
use crate::template::{Placeholder, Substitutions};

/// Raised when a case is moved backwards or out of a terminal state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid transition for case {case_id}: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub case_id: usize,
    pub from: CaseStatus,
    pub to: CaseStatus,
}

/// The input payload of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseInput {
    /// A question answered from the knowledge base.
    Question { question: String },
    /// Criteria text for a persona.
    Criteria { criteria: String },
    /// A job title and description for ad copy.
    JobDescription { title: String, description: String },
    /// Text evaluated as-is.
    Text { text: String },
}

impl CaseInput {
    /// Interpret one raw input line for a suite.
    ///
    /// Ad-copy lines are `title | description`; a line without `|` is all title.
    pub fn parse(suite: SuiteKind, line: &str) -> Self {
        let line = line.trim();
        match suite {
            SuiteKind::Answer => CaseInput::Question {
                question: line.to_string(),
            },
            SuiteKind::Persona => CaseInput::Criteria {
                criteria: line.to_string(),
            },
            SuiteKind::AdCopy => {
                let (title, description) = line.split_once('|').unwrap_or((line, ""));
                CaseInput::JobDescription {
                    title: title.trim().to_string(),
                    description: description.trim().to_string(),
                }
            }
            SuiteKind::Evaluate => CaseInput::Text {
                text: line.to_string(),
            },
        }
    }

    /// Placeholder values this input contributes to prompts.
    pub fn substitutions(&self) -> Substitutions {
        match self {
            CaseInput::Question { question } => {
                Substitutions::new().with(Placeholder::Question, question.as_str())
            }
            CaseInput::Criteria { criteria } => {
                Substitutions::new().with(Placeholder::Criteria, criteria.as_str())
            }
            CaseInput::JobDescription { title, description } => Substitutions::new()
                .with(Placeholder::JobTitle, title.as_str())
                .with(Placeholder::JobDescription, description.as_str()),
            CaseInput::Text { text } => {
                Substitutions::new().with(Placeholder::TextToEvaluate, text.as_str())
            }
        }
    }
}

impl fmt::Display for CaseInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseInput::Question { question } => f.write_str(question),
            CaseInput::Criteria { criteria } => f.write_str(criteria),
            CaseInput::JobDescription { title, description } if description.is_empty() => {
                f.write_str(title)
            }
            CaseInput::JobDescription { title, description } => {
                write!(f, "{} | {}", title, description)
            }
            CaseInput::Text { text } => f.write_str(text),
        }
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Completed | CaseStatus::Failed)
    }

    /// `Queued -> Running -> {Completed | Failed}`, nothing else.
    pub fn can_transition_to(&self, next: CaseStatus) -> bool {
        matches!(
            (self, next),
            (CaseStatus::Queued, CaseStatus::Running)
                | (CaseStatus::Running, CaseStatus::Completed)
                | (CaseStatus::Running, CaseStatus::Failed)
        )
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaseStatus::Queued => "Queued",
            CaseStatus::Running => "Running",
            CaseStatus::Completed => "Completed",
            CaseStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Outcome of one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationStatus {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluationStatus::Pass => "Pass",
            EvaluationStatus::Fail => "Fail",
            EvaluationStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Result of evaluating one criterion for one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub criterion: Criterion,
    pub status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EvaluationResult {
    pub fn pass(criterion: Criterion, reason: impl Into<String>) -> Self {
        Self {
            criterion,
            status: EvaluationStatus::Pass,
            reason: Some(reason.into()),
        }
    }

    pub fn fail(criterion: Criterion, reason: impl Into<String>) -> Self {
        Self {
            criterion,
            status: EvaluationStatus::Fail,
            reason: Some(reason.into()),
        }
    }

    pub fn error(criterion: Criterion, message: impl Into<String>) -> Self {
        Self {
            criterion,
            status: EvaluationStatus::Error,
            reason: Some(message.into()),
        }
    }
}

/// `100 × passes / total`, or 0 when nothing was evaluated.
pub fn pass_score(evaluations: &[EvaluationResult]) -> f64 {
    if evaluations.is_empty() {
        return 0.0;
    }
    let passed = evaluations
        .iter()
        .filter(|e| e.status == EvaluationStatus::Pass)
        .count();
    100.0 * passed as f64 / evaluations.len() as f64
}

/// One unit of work in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Sequence-assigned, starting at 1.
    pub id: usize,
    pub input: CaseInput,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default)]
    pub evaluations: Vec<EvaluationResult>,
    /// Set when the case completes; 0 for failed cases.
    pub pass_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TestCase {
    pub fn new(id: usize, input: CaseInput) -> Self {
        Self {
            id,
            input,
            status: CaseStatus::Queued,
            generated_text: None,
            evaluations: Vec::new(),
            pass_score: 0.0,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: CaseStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                case_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(CaseStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(
        &mut self,
        generated_text: String,
        evaluations: Vec<EvaluationResult>,
    ) -> Result<(), TransitionError> {
        self.transition(CaseStatus::Completed)?;
        self.pass_score = pass_score(&evaluations);
        self.generated_text = Some(generated_text);
        self.evaluations = evaluations;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the case failed. `generated_text` becomes a description of the
    /// failure so renderers never show stale content.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        evaluations: Vec<EvaluationResult>,
    ) -> Result<(), TransitionError> {
        self.transition(CaseStatus::Failed)?;
        let message = message.into();
        self.generated_text = Some(format!("Error: {}", message));
        self.error = Some(message);
        self.evaluations = evaluations;
        self.pass_score = 0.0;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// The ordered collection of cases for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    cases: Vec<TestCase>,
}

impl Run {
    /// Create a Queued case for every input, ids assigned from 1.
    pub fn new(inputs: impl IntoIterator<Item = CaseInput>) -> Self {
        let cases = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| TestCase::new(index + 1, input))
            .collect();
        Self { cases }
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn get(&self, id: usize) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    /// Replace the slot with the same id. Unknown ids are appended.
    pub fn upsert(&mut self, case: TestCase) {
        match self.cases.iter_mut().find(|c| c.id == case.id) {
            Some(slot) => *slot = case,
            None => self.cases.push(case),
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// True once every case is Completed or Failed.
    pub fn is_finished(&self) -> bool {
        self.cases.iter().all(TestCase::is_terminal)
    }

    pub fn completed_count(&self) -> usize {
        self.count(CaseStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(CaseStatus::Failed)
    }

    fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|c| c.status == status).count()
    }

    /// Mean pass score over Completed cases.
    pub fn mean_pass_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .cases
            .iter()
            .filter(|c| c.status == CaseStatus::Completed)
            .map(|c| c.pass_score)
            .collect();

        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> CaseInput {
        CaseInput::parse(SuiteKind::Answer, text)
    }

    #[test]
    fn test_pass_score_counts_errors_in_total() {
        let evaluations = vec![
            EvaluationResult::pass(Criterion::Age, "ok"),
            EvaluationResult::pass(Criterion::Gender, "ok"),
            EvaluationResult::fail(Criterion::Race, "stereotype"),
            EvaluationResult::error(Criterion::Violence, "timeout"),
        ];
        assert_eq!(pass_score(&evaluations), 50.0);
    }

    #[test]
    fn test_completed_case_without_evaluations_scores_zero() {
        let mut case = TestCase::new(1, question("q"));
        case.start().unwrap();
        case.complete("answer".to_string(), vec![]).unwrap();
        assert_eq!(case.status, CaseStatus::Completed);
        assert_eq!(case.pass_score, 0.0);
    }

    #[test]
    fn test_status_is_monotonic() {
        let mut case = TestCase::new(7, question("q"));

        let err = case.complete("early".to_string(), vec![]).unwrap_err();
        assert_eq!(err.from, CaseStatus::Queued);
        assert_eq!(err.to, CaseStatus::Completed);

        case.start().unwrap();
        assert!(case.start().is_err());
        case.fail("boom", vec![]).unwrap();

        assert!(case.complete("late".to_string(), vec![]).is_err());
        assert_eq!(case.status, CaseStatus::Failed);
    }

    #[test]
    fn test_failed_case_describes_failure() {
        let mut case = TestCase::new(2, question("q"));
        case.start().unwrap();
        case.fail(
            "openai API error: quota exceeded",
            vec![EvaluationResult::error(Criterion::Age, "Test execution failed")],
        )
        .unwrap();

        assert_eq!(case.error.as_deref(), Some("openai API error: quota exceeded"));
        assert_eq!(
            case.generated_text.as_deref(),
            Some("Error: openai API error: quota exceeded")
        );
        assert_eq!(case.evaluations[0].status, EvaluationStatus::Error);
        assert!(case.started_at.is_some() && case.finished_at.is_some());
    }

    #[test]
    fn test_ad_copy_line_splits_on_first_pipe() {
        let input = CaseInput::parse(SuiteKind::AdCopy, " Nurse | Night shifts | weekends ");
        assert_eq!(
            input,
            CaseInput::JobDescription {
                title: "Nurse".to_string(),
                description: "Night shifts | weekends".to_string(),
            }
        );

        let title_only = CaseInput::parse(SuiteKind::AdCopy, "Welder");
        assert_eq!(title_only.to_string(), "Welder");
        assert_eq!(title_only.substitutions().get("jobDescription"), Some(""));
    }

    #[test]
    fn test_input_substitutions() {
        let subs = CaseInput::parse(SuiteKind::Evaluate, "some text").substitutions();
        assert_eq!(subs.get("textToEvaluate"), Some("some text"));

        let subs = CaseInput::parse(SuiteKind::Persona, "retired teacher").substitutions();
        assert_eq!(subs.get("criteria"), Some("retired teacher"));
    }

    #[test]
    fn test_run_assigns_sequential_ids_and_tracks_completion() {
        let mut run = Run::new(vec![question("a"), question("b"), question("c")]);
        assert_eq!(
            run.cases().iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(!run.is_finished());

        for id in 1..=3 {
            let mut case = run.get(id).unwrap().clone();
            case.start().unwrap();
            if id == 2 {
                case.fail("boom", vec![]).unwrap();
            } else {
                case.complete(
                    "text".to_string(),
                    vec![EvaluationResult::pass(Criterion::Age, "ok")],
                )
                .unwrap();
            }
            run.upsert(case);
        }

        assert!(run.is_finished());
        assert_eq!(run.completed_count(), 2);
        assert_eq!(run.failed_count(), 1);
        assert_eq!(run.mean_pass_score(), Some(100.0));
    }

    #[test]
    fn test_run_serializes_cases() {
        let run = Run::new(vec![question("What is the refund window?")]);
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["cases"][0]["status"], "Queued");
        assert_eq!(json["cases"][0]["input"]["type"], "question");
    }
}
