//! Application session
//!
//! Holds the cursor (current vault, current node, derived path) and orchestrates
//! the graph store and the completion client for user actions.
//!
//! # Invariants
//!
//! - No state lock is held across an `.await`; completion calls run unlocked.
//! - A node is written only after its completion finished uncancelled, so a
//!   failed or cancelled send leaves the graph and the cursor untouched.
//! - Every fallible action reports through its `Result` and also overwrites the
//!   single error slot; a successful action clears it.

use crate::config::{ArborConfig, SessionConfig};
use crate::error::{Result, SessionError};
use crate::state::{Cursor, PromptOutcome, SessionState};
use arbor_graph::traversal::{path_to_root, NodeIndex};
use arbor_graph::{CascadeDeletion, GraphStore, Node, NodeId, SpliceDeletion, Turn, Vault, VaultId};
use arbor_merge::{
    history_from_path, BranchContext, CancellationToken, ChatTurn, CompletionClient,
    CompletionError, CompletionRequest, MergeConfig, MergeEngine, MergeStrategy, PartialFn,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;

/// Cursor-holding session over one graph store
pub struct Session {
    store: Arc<GraphStore>,
    client: Option<Arc<dyn CompletionClient>>,
    config: SessionConfig,
    merge_config: MergeConfig,
    state: RwLock<SessionState>,
    in_flight: RwLock<String>,
    active: Mutex<Vec<CancellationToken>>,
}

/// Marks a completion in progress
///
/// Completions may overlap; the loading slots clear only when the last live
/// one is dropped.
struct InFlight<'a> {
    session: &'a Session,
    token: CancellationToken,
}

impl<'a> InFlight<'a> {
    fn begin(session: &'a Session) -> Self {
        let token = CancellationToken::new();
        let mut active = session.active.lock();
        if active.is_empty() {
            session.in_flight.write().clear();
        }
        active.push(token.clone());
        session.state.write().is_loading = true;
        Self { session, token }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut active = self.session.active.lock();
        active.retain(|token| !token.is_same(&self.token));
        if active.is_empty() {
            self.session.state.write().is_loading = false;
            self.session.in_flight.write().clear();
        }
    }
}

impl Session {
    /// Create session without a completion client
    #[must_use]
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self {
            store,
            client: None,
            config: SessionConfig::default(),
            merge_config: MergeConfig::default(),
            state: RwLock::new(SessionState::default()),
            in_flight: RwLock::new(String::new()),
            active: Mutex::new(Vec::new()),
        }
    }

    /// Open the configured store and build a session over it
    ///
    /// # Errors
    /// - `SessionError::Graph` if the snapshot cannot be loaded
    pub fn from_config(config: &ArborConfig) -> Result<Self> {
        let store = GraphStore::open(config.store.clone())?;
        Ok(Self::new(Arc::new(store))
            .with_config(config.session.clone())
            .with_merge_config(config.merge))
    }

    /// With completion client
    #[inline]
    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// With session configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// With merge engine configuration
    #[inline]
    #[must_use]
    pub fn with_merge_config(mut self, config: MergeConfig) -> Self {
        self.merge_config = config;
        self
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Check if a completion client is available
    #[inline]
    #[must_use]
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Snapshot of the cursor
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.state.read().cursor.clone()
    }

    /// Current vault
    #[must_use]
    pub fn current_vault(&self) -> Option<Vault> {
        self.state.read().cursor.vault.clone()
    }

    /// Current node
    #[must_use]
    pub fn current_node(&self) -> Option<Node> {
        self.state.read().cursor.node.clone()
    }

    /// Root-to-current-node path
    #[must_use]
    pub fn current_path(&self) -> Vec<Node> {
        self.state.read().cursor.path.clone()
    }

    /// Vault list as of the last load or mutation
    #[must_use]
    pub fn vaults(&self) -> Vec<Vault> {
        self.state.read().vaults.clone()
    }

    /// Node set of the current vault, refreshed after every mutation
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.state.read().nodes.clone()
    }

    /// Nodes selected for the next merge, in selection order
    #[must_use]
    pub fn merge_selection(&self) -> Vec<NodeId> {
        self.state.read().merge_selection.clone()
    }

    /// Check if a completion is running
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    /// Cumulative text streamed so far by the running completion
    #[must_use]
    pub fn in_flight_response(&self) -> String {
        self.in_flight.read().clone()
    }

    /// Most recent error message
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Clear the error slot
    pub fn clear_error(&self) {
        self.state.write().last_error = None;
    }

    /// Check if sending now would start a sibling branch
    #[must_use]
    pub fn will_branch(&self) -> bool {
        let Some(id) = self.state.read().cursor.node_id() else {
            return false;
        };
        self.store
            .get_node(id)
            .is_ok_and(|node| !node.child_ids.is_empty())
    }

    /// Cancel every running completion; returns whether any was running
    pub fn cancel_in_flight(&self) -> bool {
        let active = self.active.lock();
        for token in active.iter() {
            token.cancel();
        }
        if !active.is_empty() {
            tracing::info!(count = active.len(), "cancellation requested");
        }
        !active.is_empty()
    }

    /// Reload the vault list, most recently updated first
    ///
    /// # Errors
    /// Infallible today; kept fallible like every other session action.
    pub fn load_vaults(&self) -> Result<Vec<Vault>> {
        let vaults = self.store.list_vaults();
        self.state.write().vaults.clone_from(&vaults);
        self.record("load vaults", Ok(vaults))
    }

    /// Create a vault and make it current with an empty cursor
    ///
    /// # Errors
    /// - `SessionError::Graph` if the store rejects the write
    pub fn create_vault(&self, name: &str, description: &str) -> Result<Vault> {
        let result = self.store.create_vault(name, description).map(|vault| {
            let vaults = self.store.list_vaults();
            let mut state = self.state.write();
            state.clear_vault();
            state.cursor.vault = Some(vault.clone());
            state.vaults = vaults;
            vault
        });
        self.record("create vault", result.map_err(Into::into))
    }

    /// Delete a vault; clears the cursor when it was current
    ///
    /// # Errors
    /// - `SessionError::Graph` if the store rejects the write
    pub fn delete_vault(&self, id: VaultId) -> Result<bool> {
        let result = self.store.delete_vault(id).map(|existed| {
            let vaults = self.store.list_vaults();
            let mut state = self.state.write();
            if state.cursor.vault.as_ref().is_some_and(|v| v.id == id) {
                state.clear_vault();
            }
            state.vaults = vaults;
            existed
        });
        self.record("delete vault", result.map_err(Into::into))
    }

    /// Make `id` current and resume at the deepest node of its first branch
    ///
    /// From the root the cursor follows `child_ids[0]` until a leaf.
    ///
    /// # Errors
    /// - `SessionError::Graph` with `VaultNotFound`
    pub fn select_vault(&self, id: VaultId) -> Result<Cursor> {
        let result = self.select_vault_inner(id);
        self.record("select vault", result)
    }

    fn select_vault_inner(&self, id: VaultId) -> Result<Cursor> {
        let vault = self.store.get_vault(id)?;
        let nodes = self.store.nodes_in_vault(id)?;
        let index: NodeIndex = nodes.iter().map(|n| (n.id, n.clone())).collect();

        let mut leaf = vault.root_node_id.and_then(|root| index.get(&root));
        if let Some(mut node) = leaf {
            let mut seen = HashSet::from([node.id]);
            while let Some(child) = node.child_ids.first().and_then(|c| index.get(c)) {
                if !seen.insert(child.id) {
                    break;
                }
                node = child;
            }
            leaf = Some(node);
        }

        let path: Vec<Node> = leaf
            .map(|n| path_to_root(n.id, &index).into_iter().cloned().collect())
            .unwrap_or_default();
        let cursor = Cursor {
            vault: Some(vault),
            node: leaf.cloned(),
            path,
        };

        tracing::debug!(vault = %id, node = ?cursor.node_id(), depth = cursor.path.len(), "selected vault");

        let mut state = self.state.write();
        let switching = state.cursor.vault.as_ref().map(|v| v.id) != Some(id);
        if switching {
            state.merge_selection.clear();
        }
        state.cursor = cursor.clone();
        state.nodes = nodes;
        Ok(cursor)
    }

    /// Move the cursor to `id`
    ///
    /// # Errors
    /// - `SessionError::Graph` with `NodeNotFound`
    pub fn select_node(&self, id: NodeId) -> Result<Cursor> {
        let result = self.select_node_inner(id);
        self.record("select node", result)
    }

    fn select_node_inner(&self, id: NodeId) -> Result<Cursor> {
        let node = self.store.get_node(id)?;
        let path = self.store.node_path(id);
        tracing::debug!(node = %id, depth = path.len(), "selected node");

        let mut state = self.state.write();
        state.set_cursor_node(Some(node), path);
        Ok(state.cursor.clone())
    }

    /// Complete `text` in the context of the current path and store the turn
    ///
    /// The new node becomes a child of the cursor node (a root-like node when
    /// the cursor is empty) and the cursor advances to it. `branched` reports
    /// whether the cursor node already had children.
    ///
    /// # Errors
    /// - `SessionError::NoVaultSelected`
    /// - `SessionError::CompletionUnavailable`
    /// - `SessionError::Completion` if the call fails or is cancelled; nothing is stored
    /// - `SessionError::Graph` if the store rejects the write
    pub async fn send_prompt(&self, text: &str) -> Result<PromptOutcome> {
        let result = self.send_prompt_inner(text).await;
        self.record("send prompt", result)
    }

    async fn send_prompt_inner(&self, text: &str) -> Result<PromptOutcome> {
        let vault_id = self.require_vault()?;
        let client = self.require_client()?;
        let (parent, path) = {
            let state = self.state.read();
            (state.cursor.node_id(), state.cursor.path.clone())
        };

        let branched = match parent {
            Some(id) => !self.store.get_node(id)?.child_ids.is_empty(),
            None => false,
        };
        if branched {
            tracing::info!(parent = ?parent, "prompt starts a sibling branch");
        }

        let history = history_from_path(&path);
        let response = self.complete(client.as_ref(), text, &history).await?;

        let node = self.store.create_node(
            vault_id,
            parent,
            Turn::new(text, response, client.model_id()),
        )?;
        let path = self.store.node_path(node.id);
        self.refresh_vault(vault_id)?;
        self.state.write().set_cursor_node(Some(node.clone()), path);

        Ok(PromptOutcome { node, branched })
    }

    /// Move the cursor to `node_id`, then send `text` from there
    ///
    /// # Errors
    /// Same as [`Session::select_node`] and [`Session::send_prompt`].
    pub async fn branch_from_node(&self, node_id: NodeId, text: &str) -> Result<PromptOutcome> {
        if let Err(e) = self.require_vault().and_then(|_| self.require_client().map(|_| ())) {
            return self.record("branch from node", Err(e));
        }
        self.select_node(node_id)?;
        self.send_prompt(text).await
    }

    /// Complete `text` with no history and store it without a parent
    ///
    /// The node becomes the vault root only if the vault has none. The cursor
    /// does not move.
    ///
    /// # Errors
    /// Same as [`Session::send_prompt`].
    pub async fn create_standalone_node(&self, text: &str) -> Result<Node> {
        let result = self.create_standalone_inner(text).await;
        self.record("create standalone node", result)
    }

    async fn create_standalone_inner(&self, text: &str) -> Result<Node> {
        let vault_id = self.require_vault()?;
        let client = self.require_client()?;

        let response = self.complete(client.as_ref(), text, &[]).await?;
        let node = self
            .store
            .create_node(vault_id, None, Turn::new(text, response, client.model_id()))?;
        self.refresh_vault(vault_id)?;
        Ok(node)
    }

    async fn complete(
        &self,
        client: &dyn CompletionClient,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<String> {
        let guard = InFlight::begin(self);
        let on_partial: PartialFn<'_> = &|text: &str| {
            let mut slot = self.in_flight.write();
            slot.clear();
            slot.push_str(text);
        };

        let request = CompletionRequest::new(prompt, history, &guard.token).with_partial(Some(on_partial));
        let text = client.complete(request).await?;

        if guard.token.is_cancelled() {
            return Err(CompletionError::Cancelled.into());
        }
        Ok(text)
    }

    /// Cascade-delete `id` and recompute the cursor
    ///
    /// A deleted cursor moves to the former parent (or clears); a surviving
    /// cursor is re-fetched. Deleted ids leave the merge selection.
    ///
    /// # Errors
    /// - `SessionError::NoVaultSelected`
    /// - `SessionError::Graph` with `NodeNotFound`
    pub fn delete_node(&self, id: NodeId) -> Result<CascadeDeletion> {
        let result = self.require_vault().and_then(|vault_id| {
            let outcome = self.store.delete_node_cascade(id)?;
            self.after_delete(vault_id, &outcome.deleted_ids, outcome.new_current)?;
            Ok(outcome)
        });
        self.record("delete node", result)
    }

    /// Splice-delete `id` and recompute the cursor like [`Session::delete_node`]
    ///
    /// # Errors
    /// - `SessionError::NoVaultSelected`
    /// - `SessionError::Graph` with `NodeNotFound`
    pub fn delete_node_preserve_children(&self, id: NodeId) -> Result<SpliceDeletion> {
        let result = self.require_vault().and_then(|vault_id| {
            let outcome = self.store.delete_node_preserve_children(id)?;
            self.after_delete(vault_id, &[outcome.deleted_id], outcome.new_current)?;
            Ok(outcome)
        });
        self.record("delete node preserving children", result)
    }

    fn after_delete(&self, vault_id: VaultId, deleted: &[NodeId], suggested: Option<NodeId>) -> Result<()> {
        let current = self.state.read().cursor.node_id();
        let node = match current {
            Some(id) if deleted.contains(&id) => suggested.and_then(|s| self.store.get_node(s).ok()),
            Some(id) => self.store.get_node(id).ok(),
            None => None,
        };
        let path = node
            .as_ref()
            .map(|n| self.store.node_path(n.id))
            .unwrap_or_default();

        self.refresh_vault(vault_id)?;

        let mut state = self.state.write();
        tracing::debug!(from = ?current, to = ?node.as_ref().map(|n| n.id), "cursor recomputed after delete");
        state.set_cursor_node(node, path);
        state.merge_selection.retain(|id| !deleted.contains(id));
        Ok(())
    }

    /// Add `id` to the merge selection, or remove it if present; returns whether it is now selected
    pub fn toggle_merge_selection(&self, id: NodeId) -> bool {
        let mut state = self.state.write();
        if let Some(pos) = state.merge_selection.iter().position(|s| *s == id) {
            state.merge_selection.remove(pos);
            false
        } else {
            state.merge_selection.push(id);
            true
        }
    }

    /// Empty the merge selection
    pub fn clear_merge_selection(&self) {
        self.state.write().merge_selection.clear();
    }

    /// Merge the selected branches and store the result as a merge node
    ///
    /// Each selected node that still resolves in the current vault becomes a
    /// branch named `"<branch_label> <n>"` with its root path as context.
    /// `strategy` defaults to the configured one. The cursor does not move;
    /// the selection is cleared on success.
    ///
    /// # Errors
    /// - `SessionError::NoVaultSelected`
    /// - `SessionError::CompletionUnavailable`
    /// - `SessionError::EmptyMergeSelection` if nothing selected still resolves
    /// - `SessionError::Merge` if a completion fails or is cancelled; nothing is stored
    pub async fn merge_selected(&self, strategy: Option<MergeStrategy>, question: &str) -> Result<Node> {
        let result = self.merge_selected_inner(strategy, question).await;
        self.record("merge selected", result)
    }

    async fn merge_selected_inner(&self, strategy: Option<MergeStrategy>, question: &str) -> Result<Node> {
        let vault_id = self.require_vault()?;
        let client = self.require_client()?;
        let selection = self.merge_selection();

        let mut branches = Vec::with_capacity(selection.len());
        for id in selection {
            match self.store.get_node(id) {
                Ok(node) if node.vault_id == vault_id => {
                    let name = format!("{} {}", self.config.branch_label, branches.len() + 1);
                    branches.push(BranchContext::new(id, name, self.store.node_path(id)));
                }
                _ => tracing::warn!(node = %id, "selected node no longer resolves, skipping"),
            }
        }
        if branches.is_empty() {
            return Err(SessionError::EmptyMergeSelection);
        }

        let strategy = strategy.unwrap_or(self.config.default_strategy);
        let engine = MergeEngine::from_config(Arc::clone(&client), self.merge_config);

        let text = {
            let guard = InFlight::begin(self);
            let on_partial: PartialFn<'_> = &|text: &str| {
                let mut slot = self.in_flight.write();
                slot.clear();
                slot.push_str(text);
            };
            let text = engine
                .merge(strategy, &branches, question, Some(on_partial), &guard.token)
                .await?;
            if guard.token.is_cancelled() {
                return Err(CompletionError::Cancelled.into());
            }
            text
        };

        let sources: Vec<NodeId> = branches.iter().map(|b| b.id).collect();
        let node = self.store.create_merge_node(
            vault_id,
            &sources,
            Turn::new(question, text, client.model_id()),
        )?;
        self.refresh_vault(vault_id)?;
        self.state.write().merge_selection.clear();

        Ok(node)
    }

    fn require_vault(&self) -> Result<VaultId> {
        self.state
            .read()
            .cursor
            .vault
            .as_ref()
            .map(|v| v.id)
            .ok_or(SessionError::NoVaultSelected)
    }

    fn require_client(&self) -> Result<Arc<dyn CompletionClient>> {
        self.client.clone().ok_or(SessionError::CompletionUnavailable)
    }

    /// Re-fetch the vault record, its nodes and the vault list
    fn refresh_vault(&self, vault_id: VaultId) -> Result<()> {
        let vault = self.store.get_vault(vault_id)?;
        let nodes = self.store.nodes_in_vault(vault_id)?;
        let vaults = self.store.list_vaults();

        let mut state = self.state.write();
        if state.cursor.vault.as_ref().is_some_and(|v| v.id == vault_id) {
            state.cursor.vault = Some(vault);
        }
        state.nodes = nodes;
        state.vaults = vaults;
        Ok(())
    }

    fn record<T>(&self, action: &'static str, result: Result<T>) -> Result<T> {
        let mut state = self.state.write();
        match &result {
            Ok(_) => state.last_error = None,
            Err(e) => {
                tracing::warn!(action, error = %e, "session action failed");
                state.last_error = Some(e.to_string());
            }
        }
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("model", &self.client.as_ref().map(|c| c.model_id().to_string()))
            .field("vault", &state.cursor.vault.as_ref().map(|v| v.id))
            .field("node", &state.cursor.node_id())
            .field("is_loading", &state.is_loading)
            .finish_non_exhaustive()
    }
}
