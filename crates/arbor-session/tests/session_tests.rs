use arbor_graph::{GraphStore, Turn};
use arbor_merge::{ChatTurn, MergeStrategy};
use arbor_session::{ArborConfig, Session, SessionConfig, SessionError};
use arbor_test_utils::{assert_graph_consistent, chain, init_tracing, Gate, ScriptedCompletion, Step};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn session_with(client: ScriptedCompletion) -> (Arc<Session>, Arc<ScriptedCompletion>) {
    init_tracing();
    let client = client.into_arc();
    let session = Session::new(Arc::new(GraphStore::in_memory())).with_client(client.clone());
    (Arc::new(session), client)
}

fn ids(nodes: &[arbor_graph::Node]) -> Vec<arbor_graph::NodeId> {
    nodes.iter().map(|n| n.id).collect()
}

#[test]
fn create_vault_becomes_current_with_empty_cursor() {
    let (session, _) = session_with(ScriptedCompletion::new());

    let vault = session.create_vault("Plans", "weekend").unwrap();

    let cursor = session.cursor();
    assert_eq!(cursor.vault.map(|v| v.id), Some(vault.id));
    assert!(cursor.node.is_none());
    assert!(cursor.path.is_empty());
    assert_eq!(session.vaults().len(), 1);
}

#[test]
fn select_vault_resumes_at_deepest_first_child() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let store = session.store();
    let vault = store.create_vault("v", "").unwrap();
    let trunk = chain(store, &vault, None, &["a", "b", "d"]);
    // later sibling of b is ignored by the walk
    chain(store, &vault, Some(trunk[0].id), &["c", "e"]);

    let cursor = session.select_vault(vault.id).unwrap();

    assert_eq!(cursor.node.map(|n| n.id), Some(trunk[2].id));
    assert_eq!(ids(&cursor.path), ids(&trunk));
    assert_eq!(session.nodes().len(), 5);
}

#[test]
fn select_empty_vault_has_no_node() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.store().create_vault("v", "").unwrap();

    let cursor = session.select_vault(vault.id).unwrap();

    assert!(cursor.node.is_none());
    assert!(cursor.path.is_empty());
}

#[test]
fn select_missing_vault_sets_error_slot() {
    let (session, _) = session_with(ScriptedCompletion::new());

    let err = session.select_vault(arbor_graph::VaultId::new()).unwrap_err();

    assert!(err.is_not_found());
    assert!(session.last_error().is_some());
    session.clear_error();
    assert_eq!(session.last_error(), None);
}

#[test]
fn deleting_current_vault_clears_cursor() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();

    assert!(session.delete_vault(vault.id).unwrap());

    assert!(session.current_vault().is_none());
    assert!(session.vaults().is_empty());
    assert!(!session.delete_vault(vault.id).unwrap());
}

#[tokio::test]
async fn send_prompt_carries_path_history() {
    let (session, client) = session_with(ScriptedCompletion::new().then_reply("first answer"));
    session.create_vault("v", "").unwrap();

    let first = session.send_prompt("hello").await.unwrap();
    let second = session.send_prompt("more").await.unwrap();

    assert!(!first.branched);
    assert!(!second.branched);
    assert_eq!(second.node.parent_id, Some(first.node.id));
    assert_eq!(ids(&session.current_path()), vec![first.node.id, second.node.id]);
    assert_eq!(session.current_vault().unwrap().root_node_id, Some(first.node.id));

    let requests = client.requests();
    assert!(requests[0].history.is_empty());
    assert_eq!(
        requests[1].history,
        vec![ChatTurn::user("hello"), ChatTurn::model("first answer")]
    );
    assert_eq!(first.node.model, arbor_test_utils::TEST_MODEL);
}

#[tokio::test]
async fn sending_from_interior_node_starts_branch() {
    let (session, _) = session_with(ScriptedCompletion::new());
    session.create_vault("v", "").unwrap();
    let root = session.send_prompt("root").await.unwrap().node;
    session.send_prompt("child").await.unwrap();

    session.select_node(root.id).unwrap();
    assert!(session.will_branch());
    let outcome = session.send_prompt("sibling").await.unwrap();

    assert!(outcome.branched);
    assert_eq!(session.store().get_node(root.id).unwrap().child_ids.len(), 2);
    assert!(!session.will_branch());
    assert_graph_consistent(session.store());
}

#[tokio::test]
async fn branch_from_node_moves_cursor_first() {
    let (session, _) = session_with(ScriptedCompletion::new());
    session.create_vault("v", "").unwrap();
    let root = session.send_prompt("root").await.unwrap().node;
    session.send_prompt("child").await.unwrap();

    let outcome = session.branch_from_node(root.id, "alternative").await.unwrap();

    assert!(outcome.branched);
    assert_eq!(outcome.node.parent_id, Some(root.id));
    assert_eq!(ids(&session.current_path()), vec![root.id, outcome.node.id]);
}

#[tokio::test]
async fn streamed_text_is_cumulative_and_cleared_after() {
    let (session, client) = session_with(ScriptedCompletion::new().then_reply("one two three"));
    session.create_vault("v", "").unwrap();

    let outcome = session.send_prompt("count").await.unwrap();

    assert_eq!(client.partials(), vec!["one ", "one two ", "one two three"]);
    assert_eq!(outcome.node.response, "one two three");
    assert_eq!(session.in_flight_response(), "");
    assert!(!session.is_loading());
}

#[tokio::test]
async fn failed_send_stores_nothing() {
    let (session, _) = session_with(ScriptedCompletion::new().then_fail("quota exceeded"));
    session.create_vault("v", "").unwrap();

    let err = session.send_prompt("hello").await.unwrap_err();

    assert!(matches!(err, SessionError::Completion(_)));
    assert!(session.nodes().is_empty());
    assert!(session.current_node().is_none());
    assert!(session.last_error().unwrap().contains("quota exceeded"));
    assert!(!session.is_loading());

    session.send_prompt("again").await.unwrap();
    assert_eq!(session.last_error(), None);
}

#[tokio::test]
async fn send_requires_vault_and_client() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let err = session.send_prompt("hello").await.unwrap_err();
    assert!(matches!(err, SessionError::NoVaultSelected));

    let bare = Session::new(Arc::new(GraphStore::in_memory()));
    bare.create_vault("v", "").unwrap();
    let err = bare.send_prompt("hello").await.unwrap_err();
    assert!(matches!(err, SessionError::CompletionUnavailable));
    assert!(!bare.has_client());
}

#[tokio::test]
async fn cancel_while_in_flight_stores_nothing() {
    let gate = Gate::new();
    let (session, _) = session_with(ScriptedCompletion::new().then(Step::Gated("late reply".into(), gate.clone())));
    session.create_vault("v", "").unwrap();

    let task = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send_prompt("slow").await })
    };
    gate.wait_started().await;
    assert!(session.is_loading());
    assert!(session.cancel_in_flight());
    gate.release();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(session.nodes().is_empty());
    assert!(!session.is_loading());
    assert!(!session.cancel_in_flight());
}

#[tokio::test]
async fn overlapping_completions_stay_cancellable() {
    let (first_gate, second_gate) = (Gate::new(), Gate::new());
    let (session, _) = session_with(
        ScriptedCompletion::new()
            .then(Step::Gated("first".into(), first_gate.clone()))
            .then(Step::Gated("second".into(), second_gate.clone())),
    );
    session.create_vault("v", "").unwrap();

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.send_prompt("one").await })
    };
    first_gate.wait_started().await;
    let second = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.create_standalone_node("two").await })
    };
    second_gate.wait_started().await;

    first_gate.release();
    first.await.unwrap().unwrap();

    // the second call is still running and still reachable
    assert!(session.is_loading());
    assert!(session.cancel_in_flight());
    second_gate.release();

    let err = second.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(session.nodes().len(), 1);
    assert!(!session.is_loading());
    assert!(!session.cancel_in_flight());
}

#[tokio::test]
async fn cancel_mid_stream_stores_nothing() {
    let (session, client) = session_with(ScriptedCompletion::new().then(Step::CancelMidStream("partial words here".into())));
    session.create_vault("v", "").unwrap();

    let err = session.send_prompt("hello").await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(client.partials(), vec!["partial "]);
    assert!(session.nodes().is_empty());
    assert_eq!(session.in_flight_response(), "");
}

#[tokio::test]
async fn standalone_node_has_no_history_and_keeps_cursor() {
    let (session, client) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let root = session.send_prompt("root").await.unwrap().node;

    let standalone = session.create_standalone_node("fresh start").await.unwrap();

    assert_eq!(standalone.parent_id, None);
    assert!(client.requests()[1].history.is_empty());
    assert_eq!(session.current_node().map(|n| n.id), Some(root.id));
    assert_eq!(session.store().get_vault(vault.id).unwrap().root_node_id, Some(root.id));
    assert_eq!(session.nodes().len(), 2);
}

#[test]
fn cascade_delete_moves_cursor_to_parent_and_prunes_selection() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b", "c"]);
    session.select_node(nodes[2].id).unwrap();
    session.toggle_merge_selection(nodes[2].id);
    session.toggle_merge_selection(nodes[0].id);

    let outcome = session.delete_node(nodes[1].id).unwrap();

    assert_eq!(outcome.deleted_ids.len(), 2);
    assert_eq!(session.current_node().map(|n| n.id), Some(nodes[0].id));
    assert_eq!(ids(&session.current_path()), vec![nodes[0].id]);
    assert_eq!(session.merge_selection(), vec![nodes[0].id]);
    assert_eq!(session.nodes().len(), 1);
}

#[test]
fn cascade_delete_of_root_clears_cursor() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b"]);
    session.select_node(nodes[1].id).unwrap();

    session.delete_node(nodes[0].id).unwrap();

    assert!(session.current_node().is_none());
    assert!(session.current_path().is_empty());
    assert_eq!(session.current_vault().unwrap().root_node_id, None);
}

#[test]
fn splice_delete_of_cursor_moves_to_parent() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b", "c"]);
    session.select_node(nodes[1].id).unwrap();

    session.delete_node_preserve_children(nodes[1].id).unwrap();

    assert_eq!(session.current_node().map(|n| n.id), Some(nodes[0].id));
    assert_eq!(session.store().node_path(nodes[2].id).len(), 2);
}

#[test]
fn splice_delete_above_cursor_shortens_its_path() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b", "c"]);
    session.select_node(nodes[2].id).unwrap();

    session.delete_node_preserve_children(nodes[1].id).unwrap();

    assert_eq!(session.current_node().unwrap().parent_id, Some(nodes[0].id));
    assert_eq!(ids(&session.current_path()), vec![nodes[0].id, nodes[2].id]);
}

#[test]
fn splice_delete_of_root_promotes_only_child() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b"]);
    session.select_node(nodes[0].id).unwrap();

    let outcome = session.delete_node_preserve_children(nodes[0].id).unwrap();

    assert_eq!(outcome.new_current, Some(nodes[1].id));
    assert_eq!(session.current_node().map(|n| n.id), Some(nodes[1].id));
    assert_eq!(session.current_vault().unwrap().root_node_id, Some(nodes[1].id));
}

#[test]
fn delete_requires_vault() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let store_vault = session.store().create_vault("v", "").unwrap();
    let node = session.store().create_node(store_vault.id, None, Turn::new("p", "r", "m")).unwrap();

    let err = session.delete_node(node.id).unwrap_err();

    assert!(matches!(err, SessionError::NoVaultSelected));
    assert!(session.store().get_node(node.id).is_ok());
}

#[test]
fn toggle_adds_then_removes() {
    let (session, _) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b"]);

    assert!(session.toggle_merge_selection(nodes[1].id));
    assert!(session.toggle_merge_selection(nodes[0].id));
    assert_eq!(session.merge_selection(), vec![nodes[1].id, nodes[0].id]);
    assert!(!session.toggle_merge_selection(nodes[1].id));
    assert_eq!(session.merge_selection(), vec![nodes[0].id]);

    session.clear_merge_selection();
    assert!(session.merge_selection().is_empty());
}

#[tokio::test]
async fn merge_selected_stores_merge_node() {
    let (session, client) = session_with(ScriptedCompletion::new());
    let vault = session.create_vault("v", "").unwrap();
    let root = chain(session.store(), &vault, None, &["root"]).remove(0);
    let left = chain(session.store(), &vault, Some(root.id), &["left"]).remove(0);
    let right = chain(session.store(), &vault, Some(root.id), &["right"]).remove(0);
    session.select_node(left.id).unwrap();
    session.toggle_merge_selection(left.id);
    session.toggle_merge_selection(right.id);

    let merged = session
        .merge_selected(Some(MergeStrategy::Comparative), "which is better?")
        .await
        .unwrap();

    assert_eq!(merged.merged_from_ids, vec![left.id, right.id]);
    assert_eq!(merged.parent_id, None);
    assert_eq!(merged.prompt, "which is better?");
    assert!(merged.response.starts_with("response to: You are performing a comparative analysis of 2"));
    assert!(session.merge_selection().is_empty());
    assert_eq!(session.current_node().map(|n| n.id), Some(left.id));
    assert_eq!(session.nodes().len(), 4);

    let prompt = &client.requests()[0].prompt;
    assert!(prompt.contains("name=\"Branch 1\""));
    assert!(prompt.contains("name=\"Branch 2\""));
    assert_graph_consistent(session.store());
}

#[tokio::test]
async fn merge_uses_configured_strategy_and_label() {
    let client = ScriptedCompletion::new().into_arc();
    let session = Session::new(Arc::new(GraphStore::in_memory()))
        .with_client(client.clone())
        .with_config(
            SessionConfig::default()
                .with_default_strategy(MergeStrategy::Summary)
                .with_branch_label("Path"),
        );
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a", "b"]);
    session.toggle_merge_selection(nodes[1].id);

    session.merge_selected(None, "sum up").await.unwrap();

    // one summary per branch, then the final call
    assert_eq!(client.call_count(), 2);
    assert!(client.requests()[1].prompt.contains("**Path 1:**"));
}

#[tokio::test]
async fn merge_with_nothing_selected_fails() {
    let (session, client) = session_with(ScriptedCompletion::new());
    session.create_vault("v", "").unwrap();

    let err = session.merge_selected(None, "q").await.unwrap_err();

    assert!(matches!(err, SessionError::EmptyMergeSelection));
    assert_eq!(client.call_count(), 0);
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn failed_merge_keeps_selection() {
    let (session, _) = session_with(ScriptedCompletion::new().then_fail("model offline"));
    let vault = session.create_vault("v", "").unwrap();
    let nodes = chain(session.store(), &vault, None, &["a"]);
    session.toggle_merge_selection(nodes[0].id);

    let err = session.merge_selected(Some(MergeStrategy::Rag), "q").await.unwrap_err();

    assert!(matches!(err, SessionError::Merge(_)));
    assert_eq!(session.merge_selection(), vec![nodes[0].id]);
    assert_eq!(session.nodes().len(), 1);
}

#[tokio::test]
async fn session_from_config_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("arbor.toml");
    let snapshot = dir.path().join("graph.json");
    std::fs::write(
        &config_path,
        format!("[store]\nsnapshot_path = {:?}\n", snapshot.display().to_string()),
    )
    .unwrap();
    let config = ArborConfig::load(&config_path).unwrap();

    let (vault_id, tip) = {
        let session = Session::from_config(&config)
            .unwrap()
            .with_client(ScriptedCompletion::new().into_arc());
        let vault = session.create_vault("kept", "").unwrap();
        session.send_prompt("one").await.unwrap();
        let tip = session.send_prompt("two").await.unwrap().node;
        (vault.id, tip.id)
    };

    let reopened = Session::from_config(&config).unwrap();
    let vaults = reopened.load_vaults().unwrap();
    assert_eq!(vaults.len(), 1);
    let cursor = reopened.select_vault(vault_id).unwrap();
    assert_eq!(cursor.node.map(|n| n.id), Some(tip));
    assert_eq!(cursor.path.len(), 2);
}

#[test]
fn missing_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ArborConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SessionError::Config(_)));
}
