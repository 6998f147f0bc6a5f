//! Test case orchestrator.
//!
//! Runs every case of a run under a global concurrency limit and reports
//! each status transition as it happens.
//!
//! # Architecture
//! - Admission: FIFO by input order, at most `concurrency_limit` cases in flight
//! - Isolation: each case future owns its [`TestCase`]; an error fails that
//!   case only and never cancels siblings
//! - Observation: a [`CaseUpdate`] snapshot after every transition, either
//!   through a callback ([`Orchestrator::run`]) or a channel
//!   ([`Orchestrator::spawn`])

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crucible_core::{CaseInput, CaseStatus, Run, TestCase};

use crate::config::RuntimeConfig;
use crate::executor::BoundedExecutor;
use crate::pipeline::CaseRunner;

/// Snapshot of one case after a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseUpdate {
    pub case: TestCase,
}

impl CaseUpdate {
    fn of(case: &TestCase) -> Self {
        Self { case: case.clone() }
    }

    pub fn id(&self) -> usize {
        self.case.id
    }

    pub fn status(&self) -> CaseStatus {
        self.case.status
    }
}

/// Callback receiving every [`CaseUpdate`].
pub type Observer<'a> = &'a (dyn Fn(&CaseUpdate) + Send + Sync);

/// Drives a run to completion.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    executor: BoundedExecutor,
}

impl Orchestrator {
    /// A limit of 0 is treated as 1.
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            executor: BoundedExecutor::new(concurrency_limit, std::time::Duration::ZERO),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.concurrency_limit)
    }

    pub fn concurrency_limit(&self) -> usize {
        self.executor.limit()
    }

    /// Run every input to a terminal state and return the finished run.
    ///
    /// `observer` first sees every case Queued, in input order, then each
    /// Running and Completed/Failed transition as it happens.
    pub async fn run<R>(&self, inputs: Vec<CaseInput>, runner: &R, observer: Observer<'_>) -> Run
    where
        R: CaseRunner + ?Sized,
    {
        let mut run = Run::new(inputs);
        for case in run.cases() {
            observer(&CaseUpdate::of(case));
        }

        tracing::info!(
            cases = run.len(),
            concurrency_limit = self.concurrency_limit(),
            "Starting run"
        );

        let finished = self
            .executor
            .run_unordered(run.cases().to_vec(), |case| execute_case(case, runner, observer))
            .await;
        for case in finished {
            run.upsert(case);
        }

        tracing::info!(
            completed = run.completed_count(),
            failed = run.failed_count(),
            "Run finished"
        );
        run
    }

    /// Run on a spawned task, streaming updates through a channel.
    ///
    /// The channel closes once the run is finished; the handle yields the
    /// final [`Run`].
    pub fn spawn<R>(
        &self,
        inputs: Vec<CaseInput>,
        runner: Arc<R>,
    ) -> (UnboundedReceiver<CaseUpdate>, JoinHandle<Run>)
    where
        R: CaseRunner + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = self.clone();

        let handle = tokio::spawn(async move {
            let observer = move |update: &CaseUpdate| {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(update.clone());
            };
            orchestrator.run(inputs, runner.as_ref(), &observer).await
        });

        (rx, handle)
    }
}

async fn execute_case<R>(mut case: TestCase, runner: &R, observer: Observer<'_>) -> TestCase
where
    R: CaseRunner + ?Sized,
{
    if let Err(e) = case.start() {
        tracing::error!(case_id = case.id, error = %e, "Case could not start");
        return case;
    }
    observer(&CaseUpdate::of(&case));
    tracing::debug!(case_id = case.id, "Case running");

    let transition = match runner.run(&case.input).await {
        Ok(output) => case.complete(output.generated_text, output.evaluations),
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(case_id = case.id, error = %message, "Case failed");
            let evaluations = runner.failure_evaluations(&message);
            case.fail(message, evaluations)
        }
    };

    if let Err(e) = transition {
        tracing::error!(case_id = case.id, error = %e, "Case could not finish");
        return case;
    }

    tracing::debug!(
        case_id = case.id,
        status = %case.status,
        pass_score = case.pass_score,
        "Case finished"
    );
    observer(&CaseUpdate::of(&case));
    case
}
