//! Scripted completion client

use crate::TEST_MODEL;
use arbor_merge::{ChatTurn, CompletionClient, CompletionError, CompletionRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// What the client does for one call
#[derive(Debug, Clone)]
pub enum Step {
    /// Stream this text word by word
    Reply(String),
    /// Fail with `CompletionError::Failed`
    Fail(String),
    /// Signal the gate, wait for its release, then stream the text
    Gated(String, Gate),
    /// Stream the first word, cancel the request's token, keep streaming
    CancelMidStream(String),
}

/// Rendezvous between a test and an in-flight gated call
#[derive(Debug, Clone, Default)]
pub struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the gated call has begun
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Let the gated call finish
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// A call as the client saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub prompt: String,
    pub history: Vec<ChatTurn>,
    pub streamed: bool,
}

/// Completion client replaying a script of [`Step`]s
///
/// Once the script is exhausted every call answers `"response to: <prompt>"`.
#[derive(Debug)]
pub struct ScriptedCompletion {
    model: String,
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<RecordedRequest>>,
    partials: Mutex<Vec<String>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            model: TEST_MODEL.to_string(),
            steps: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            partials: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    #[must_use]
    pub fn then(self, step: Step) -> Self {
        self.steps.lock().push_back(step);
        self
    }

    #[must_use]
    pub fn then_reply(self, text: &str) -> Self {
        self.then(Step::Reply(text.to_string()))
    }

    #[must_use]
    pub fn then_fail(self, message: &str) -> Self {
        self.then(Step::Fail(message.to_string()))
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every cumulative text passed to a streaming observer
    pub fn partials(&self) -> Vec<String> {
        self.partials.lock().clone()
    }

    fn emit(&self, request: &CompletionRequest<'_>, text: &str) {
        if let Some(on_partial) = request.on_partial {
            self.partials.lock().push(text.to_string());
            on_partial(text);
        }
    }

    fn stream(&self, request: &CompletionRequest<'_>, text: &str) -> Result<String, CompletionError> {
        let mut cumulative = String::new();
        for chunk in text.split_inclusive(' ') {
            if request.cancel.is_cancelled() {
                return Err(CompletionError::Cancelled);
            }
            cumulative.push_str(chunk);
            self.emit(request, &cumulative);
        }
        Ok(cumulative)
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedCompletion {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError> {
        self.requests.lock().push(RecordedRequest {
            prompt: request.prompt.to_string(),
            history: request.history.to_vec(),
            streamed: request.on_partial.is_some(),
        });

        let step = self.steps.lock().pop_front();
        match step {
            None => self.stream(&request, &format!("response to: {}", request.prompt)),
            Some(Step::Reply(text)) => self.stream(&request, &text),
            Some(Step::Fail(message)) => Err(CompletionError::Failed(message)),
            Some(Step::Gated(text, gate)) => {
                gate.started.notify_one();
                gate.release.notified().await;
                self.stream(&request, &text)
            }
            Some(Step::CancelMidStream(text)) => {
                let first = text.split_inclusive(' ').next().unwrap_or_default();
                self.emit(&request, first);
                request.cancel.cancel();
                self.stream(&request, &text)
            }
        }
    }
}
