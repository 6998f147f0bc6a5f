//! Bounded-parallelism task scheduler.
//!
//! One primitive serves both the evaluation suite (one criterion at a time
//! with a pause between calls) and the orchestrator (up to N cases at
//! once). Tasks are futures driven on the calling task; nothing is spawned.

use futures::stream::{FuturesOrdered, FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::Duration;

/// Runs tasks with at most `limit` in flight, pausing `delay` between them.
///
/// Items are admitted in input order. A task's slot is held until its
/// trailing delay has elapsed; the last task has none. Tasks report their
/// own failures in their output, so one failing task never cancels the
/// others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedExecutor {
    limit: usize,
    delay: Duration,
}

impl BoundedExecutor {
    /// A `limit` of 0 is treated as 1.
    pub fn new(limit: usize, delay: Duration) -> Self {
        Self {
            limit: limit.max(1),
            delay,
        }
    }

    /// One task at a time.
    pub fn sequential(delay: Duration) -> Self {
        Self::new(1, delay)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run every task and collect outputs in input order.
    pub async fn run<I, F, Fut>(&self, items: I, mut task: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        let mut pending = items.into_iter().peekable();
        let mut in_flight = FuturesOrdered::new();
        let mut outputs = Vec::new();

        loop {
            while in_flight.len() < self.limit {
                let Some(item) = pending.next() else { break };
                let pause = self.pause_before_next(pending.peek().is_some());
                in_flight.push_back(with_trailing_delay(task(item), pause));
            }
            match in_flight.next().await {
                Some(output) => outputs.push(output),
                None => return outputs,
            }
        }
    }

    /// Run every task and collect outputs in completion order. A finished
    /// task frees its slot even while an earlier one is still running.
    pub async fn run_unordered<I, F, Fut>(&self, items: I, mut task: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        let mut pending = items.into_iter().peekable();
        let mut in_flight = FuturesUnordered::new();
        let mut outputs = Vec::new();

        loop {
            while in_flight.len() < self.limit {
                let Some(item) = pending.next() else { break };
                let pause = self.pause_before_next(pending.peek().is_some());
                in_flight.push(with_trailing_delay(task(item), pause));
            }
            match in_flight.next().await {
                Some(output) => outputs.push(output),
                None => return outputs,
            }
        }
    }

    fn pause_before_next(&self, more_pending: bool) -> Duration {
        if more_pending {
            self.delay
        } else {
            Duration::ZERO
        }
    }
}

async fn with_trailing_delay<Fut: Future>(fut: Fut, delay: Duration) -> Fut::Output {
    let output = fut.await;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    output
}
