//! Merge engine
//!
//! Drives the completion client for a chosen strategy. Single-call strategies
//! stream their one call; the summary strategy streams only its final call.
//! The cancellation token is checked before every call and after each one
//! returns, so a cancelled merge never yields text.

use crate::cancel::CancellationToken;
use crate::completion::{CompletionClient, CompletionError, CompletionRequest, PartialFn};
use crate::format;
use crate::strategy::{BranchContext, MergeError, MergeStrategy, SummaryMode};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Merge engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Scheduling of per-branch summary calls
    pub summary_mode: SummaryMode,
}

/// Stateless strategy dispatcher bound to one completion client
#[derive(Clone)]
pub struct MergeEngine {
    client: Arc<dyn CompletionClient>,
    summary_mode: SummaryMode,
}

impl MergeEngine {
    /// Create engine with sequential summaries
    #[inline]
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            summary_mode: SummaryMode::default(),
        }
    }

    /// Create engine from configuration
    #[inline]
    #[must_use]
    pub fn from_config(client: Arc<dyn CompletionClient>, config: MergeConfig) -> Self {
        Self::new(client).with_summary_mode(config.summary_mode)
    }

    /// With summary scheduling
    #[inline]
    #[must_use]
    pub fn with_summary_mode(mut self, mode: SummaryMode) -> Self {
        self.summary_mode = mode;
        self
    }

    /// Model identifier of the bound client
    #[inline]
    #[must_use]
    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    /// Synthesize `branches` into one answer to `question`
    ///
    /// # Errors
    /// - `MergeError::NoBranches` if `branches` is empty (no call is made)
    /// - `MergeError::Completion` if any call fails or `cancel` fires
    pub async fn merge(
        &self,
        strategy: MergeStrategy,
        branches: &[BranchContext],
        question: &str,
        on_partial: Option<PartialFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<String, MergeError> {
        if branches.is_empty() {
            return Err(MergeError::NoBranches);
        }

        tracing::info!(
            strategy = %strategy,
            branches = branches.len(),
            calls = strategy.completion_calls(branches.len()),
            "merging branches"
        );

        let prompt = match strategy {
            MergeStrategy::XmlContext => format::xml_context_prompt(branches, question),
            MergeStrategy::Rag => format::rag_prompt(branches, question),
            MergeStrategy::Comparative => format::comparative_prompt(branches, question),
            MergeStrategy::Summary => {
                let summaries = self.summarize(branches, cancel).await?;
                format::summary_final_prompt(&summaries, question)
            }
        };

        let text = self.call(&prompt, on_partial, cancel).await?;
        tracing::info!(strategy = %strategy, chars = text.len(), "merge completed");
        Ok(text)
    }

    /// Labelled per-branch summaries in branch input order
    async fn summarize(
        &self,
        branches: &[BranchContext],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CompletionError> {
        let prompts: Vec<String> = branches.iter().map(format::branch_summary_prompt).collect();

        let summaries = match self.summary_mode {
            SummaryMode::Sequential => {
                let mut out = Vec::with_capacity(prompts.len());
                for prompt in &prompts {
                    out.push(self.call(prompt, None, cancel).await?);
                }
                out
            }
            SummaryMode::Concurrent => {
                try_join_all(prompts.iter().map(|prompt| self.call(prompt, None, cancel))).await?
            }
        };

        Ok(branches
            .iter()
            .zip(&summaries)
            .map(|(branch, summary)| format::labelled_summary(branch, summary))
            .collect())
    }

    async fn call(
        &self,
        prompt: &str,
        on_partial: Option<PartialFn<'_>>,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }

        tracing::debug!(prompt_chars = prompt.len(), streaming = on_partial.is_some(), "completion call");
        let request = CompletionRequest::new(prompt, &[], cancel).with_partial(on_partial);
        let text = self.client.complete(request).await?;

        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("model", &self.client.model_id())
            .field("summary_mode", &self.summary_mode)
            .finish()
    }
}
