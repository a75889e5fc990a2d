//! Completion collaborator contract
//!
//! The language-model client is an injected capability. It receives a prompt
//! plus prior turns and may stream: `on_partial` is called with the cumulative
//! text produced so far (never a delta), and the returned text equals the
//! last value passed to it.

use crate::cancel::CancellationToken;
use arbor_graph::Node;
use serde::{Deserialize, Serialize};

/// Speaker of a history turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side
    User,
    /// The completion model
    Model,
}

/// One prior message sent along with a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker
    pub role: Role,
    /// Message text
    pub text: String,
}

impl ChatTurn {
    /// Create user turn
    #[inline]
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create model turn
    #[inline]
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Interleaved history for a root-to-node path
///
/// Each node contributes a user turn when its prompt is non-empty, then a
/// model turn when its response is non-empty.
#[must_use]
pub fn history_from_path(path: &[Node]) -> Vec<ChatTurn> {
    let mut history = Vec::with_capacity(path.len() * 2);
    for node in path {
        if !node.prompt.is_empty() {
            history.push(ChatTurn::user(node.prompt.as_str()));
        }
        if !node.response.is_empty() {
            history.push(ChatTurn::model(node.response.as_str()));
        }
    }
    history
}

/// Callback receiving the cumulative response text
pub type PartialFn<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// A single completion call
#[derive(Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Text to complete
    pub prompt: &'a str,
    /// Prior turns, oldest first
    pub history: &'a [ChatTurn],
    /// Streaming observer; `None` requests a non-streamed call
    pub on_partial: Option<PartialFn<'a>>,
    /// Cancellation flag the client should poll while streaming
    pub cancel: &'a CancellationToken,
}

impl<'a> CompletionRequest<'a> {
    /// Create non-streamed request
    #[inline]
    #[must_use]
    pub fn new(prompt: &'a str, history: &'a [ChatTurn], cancel: &'a CancellationToken) -> Self {
        Self {
            prompt,
            history,
            on_partial: None,
            cancel,
        }
    }

    /// With streaming observer
    #[inline]
    #[must_use]
    pub fn with_partial(mut self, on_partial: Option<PartialFn<'a>>) -> Self {
        self.on_partial = on_partial;
        self
    }
}

impl std::fmt::Debug for CompletionRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("prompt_len", &self.prompt.len())
            .field("history", &self.history.len())
            .field("streaming", &self.on_partial.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Completion failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// The client reported an error
    #[error("completion failed: {0}")]
    Failed(String),

    /// The call was cancelled before it finished
    #[error("completion cancelled")]
    Cancelled,
}

impl CompletionError {
    /// Check if the same request may succeed when repeated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Language-model client
///
/// Implement this trait to plug a concrete provider into merges and sessions.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Identifier of the model answering requests, stored on created nodes
    fn model_id(&self) -> &str;

    /// Complete `request.prompt` given `request.history`
    ///
    /// # Errors
    /// - `CompletionError::Failed` if the provider errors
    /// - `CompletionError::Cancelled` if `request.cancel` fired mid-call
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError>;
}
