//! Test doubles shared by the runtime's unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::providers::{
    HttpTransport, LlmProvider, ProviderError, ProviderOptions, TransportError,
    TransportResponse, Verdict, VerdictOutcome,
};

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: JsonValue,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport that replays queued responses and records every request.
#[derive(Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: TransportResponse) -> Self {
        self.queue.lock().push_back(Ok(response));
        self
    }

    pub fn respond_ok(self, body: JsonValue) -> Self {
        self.respond(TransportResponse::new(200, body))
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.queue.lock().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &JsonValue,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.clone(),
        });

        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no mock response queued".to_string())))
    }
}

type TextFn = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;
type VerdictFn = Box<dyn Fn(&str) -> Result<Verdict, ProviderError> + Send + Sync>;

/// Provider whose answers are computed from the prompt by closures.
pub struct ScriptedProvider {
    id: &'static str,
    text: TextFn,
    verdict: VerdictFn,
    text_calls: AtomicUsize,
    verdict_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Generates "generated text" and passes every criterion.
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            text: Box::new(|_| Ok("generated text".to_string())),
            verdict: Box::new(|_| Ok(pass("looks fine"))),
            text_calls: AtomicUsize::new(0),
            verdict_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(
        mut self,
        f: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.text = Box::new(f);
        self
    }

    pub fn with_verdict(
        mut self,
        f: impl Fn(&str) -> Result<Verdict, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.verdict = Box::new(f);
        self
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn verdict_calls(&self) -> usize {
        self.verdict_calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_id(&self) -> &'static str {
        self.id
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _options: &ProviderOptions,
    ) -> Result<String, ProviderError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        tokio::task::yield_now().await;
        (self.text)(prompt)
    }

    async fn generate_verdict(
        &self,
        prompt: &str,
        _options: &ProviderOptions,
    ) -> Result<Verdict, ProviderError> {
        self.verdict_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        tokio::task::yield_now().await;
        (self.verdict)(prompt)
    }
}

pub fn pass(reason: &str) -> Verdict {
    Verdict {
        result: VerdictOutcome::Pass,
        reason: reason.to_string(),
    }
}

pub fn fail(reason: &str) -> Verdict {
    Verdict {
        result: VerdictOutcome::Fail,
        reason: reason.to_string(),
    }
}

/// Options accepted by [`ScriptedProvider`] registered as `id`.
pub fn options_for(id: &str) -> ProviderOptions {
    ProviderOptions::new(id, "test-model", "test-key")
}
