use arbor_graph::{GraphStore, Node};
use arbor_merge::{
    BranchContext, CancellationToken, CompletionError, MergeEngine, MergeError, MergeStrategy,
    PartialFn, SummaryMode,
};
use arbor_test_utils::{chain, init_tracing, store_with_vault, Gate, ScriptedCompletion, Step};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Two branches forking after a shared first turn
fn forked_branches() -> (GraphStore, Vec<BranchContext>) {
    init_tracing();
    let (store, vault) = store_with_vault();
    let trunk = chain(&store, &vault, None, &["plan a trip"]);
    let left = chain(&store, &vault, Some(trunk[0].id), &["by train"]);
    let right = chain(&store, &vault, Some(trunk[0].id), &["by car <fast & cheap>"]);

    let branches = [&left[0], &right[0]]
        .into_iter()
        .enumerate()
        .map(|(i, tip): (usize, &Node)| {
            BranchContext::new(tip.id, format!("Branch {}", i + 1), store.node_path(tip.id))
        })
        .collect();
    (store, branches)
}

#[tokio::test]
async fn streamed_partials_are_cumulative_and_end_at_result() {
    let (_store, branches) = forked_branches();
    let client = ScriptedCompletion::new().then_reply("take the train").into_arc();
    let engine = MergeEngine::new(client.clone());

    let seen = Mutex::new(Vec::<String>::new());
    let on_partial: PartialFn<'_> = &|text: &str| seen.lock().push(text.to_string());
    let text = engine
        .merge(MergeStrategy::XmlContext, &branches, "which?", Some(on_partial), &CancellationToken::new())
        .await
        .unwrap();

    let seen = seen.lock().clone();
    assert_eq!(seen, vec!["take ", "take the ", "take the train"]);
    assert_eq!(seen.last(), Some(&text));
    for pair in seen.windows(2) {
        assert!(pair[1].starts_with(&pair[0]));
    }
}

#[tokio::test]
async fn merge_calls_carry_no_history() {
    let (_store, branches) = forked_branches();
    let client = ScriptedCompletion::new().into_arc();
    let engine = MergeEngine::new(client.clone());

    for strategy in MergeStrategy::ALL {
        engine
            .merge(strategy, &branches, "which?", None, &CancellationToken::new())
            .await
            .unwrap();
    }

    // three single-call strategies plus summary's two summaries and one final call
    assert_eq!(client.call_count(), 6);
    assert!(client.requests().iter().all(|r| r.history.is_empty()));
}

#[tokio::test]
async fn xml_context_escapes_branch_content_and_rag_does_not() {
    let (_store, branches) = forked_branches();
    let client = ScriptedCompletion::new().into_arc();
    let engine = MergeEngine::new(client.clone());
    let cancel = CancellationToken::new();

    engine.merge(MergeStrategy::XmlContext, &branches, "a < b?", None, &cancel).await.unwrap();
    engine.merge(MergeStrategy::Rag, &branches, "a < b?", None, &cancel).await.unwrap();

    let requests = client.requests();
    let xml = &requests[0].prompt;
    assert!(xml.contains("by car &lt;fast &amp; cheap&gt;"));
    assert!(xml.contains("a &lt; b?"));
    assert!(xml.contains("<branch id=\""));
    assert_eq!(xml.matches("<turn index=\"1\">").count(), 2);
    assert_eq!(xml.matches("<turn index=\"2\">").count(), 2);

    let rag = &requests[1].prompt;
    assert!(rag.contains("by car <fast & cheap>"));
    assert!(!rag.contains("&lt;"));
}

#[tokio::test]
async fn concurrent_summaries_keep_branch_order() {
    let (_store, branches) = forked_branches();
    let gate = Gate::new();
    let client = ScriptedCompletion::new()
        .then(Step::Gated("slow summary".into(), gate.clone()))
        .then_reply("fast summary")
        .into_arc();
    let engine = MergeEngine::new(client.clone()).with_summary_mode(SummaryMode::Concurrent);
    let cancel = CancellationToken::new();

    let (result, ()) = tokio::join!(
        engine.merge(MergeStrategy::Summary, &branches, "which?", None, &cancel),
        async {
            gate.wait_started().await;
            // let the second summary finish first
            tokio::task::yield_now().await;
            gate.release();
        }
    );
    result.unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    let final_prompt = &requests[2].prompt;
    let first = final_prompt.find("**Branch 1:**\nslow summary").unwrap();
    let second = final_prompt.find("**Branch 2:**\nfast summary").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn failed_summary_skips_final_call() {
    let (_store, branches) = forked_branches();
    let client = ScriptedCompletion::new()
        .then_reply("ok")
        .then_fail("rate limited")
        .into_arc();
    let engine = MergeEngine::new(client.clone());

    let err = engine
        .merge(MergeStrategy::Summary, &branches, "which?", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, MergeError::Completion(CompletionError::Failed("rate limited".into())));
    assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn cancel_during_summary_stops_merge() {
    let (_store, branches) = forked_branches();
    let client = ScriptedCompletion::new()
        .then(Step::CancelMidStream("first summary text".into()))
        .into_arc();
    let engine = MergeEngine::new(client.clone());

    let err = engine
        .merge(MergeStrategy::Summary, &branches, "which?", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn unknown_tag_merges_as_xml_context() {
    let (_store, branches) = forked_branches();
    let client = ScriptedCompletion::new().into_arc();
    let engine = MergeEngine::new(client.clone());

    let strategy = MergeStrategy::from_tag("mystery");
    engine.merge(strategy, &branches, "q", None, &CancellationToken::new()).await.unwrap();

    assert_eq!(strategy, MergeStrategy::XmlContext);
    assert!(client.requests()[0].prompt.contains("<user_query>q</user_query>"));
}

#[test]
fn engine_reports_client_model() {
    let client = Arc::new(ScriptedCompletion::new().with_model("local-llm"));
    let engine = MergeEngine::new(client);
    assert_eq!(engine.model_id(), "local-llm");
}
