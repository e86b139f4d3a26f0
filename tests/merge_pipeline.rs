//! End-to-end merge workflow against a SQLite store

mod common;

use common::{concept, link, memory_store, merge_scenario, processor, scripted_merge};
use engram::{
    CancellationToken, ElementPair, MemoryConfig, MemoryError, MemoryStore, MergeCandidate,
    MockBackend, MERGED_INTO_KEY,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn successful_merge_creates_element_and_redirects_edges() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let d = concept(&store, json!({"name": "lifetimes"}));
    let outgoing = link(&store, &scenario.a, &d, 0.6);
    let incoming = link(&store, &d, &scenario.b, 0.4);

    let backend = scripted_merge(
        r#"{"merged":true}"#,
        json!({"success": true, "confidence": 0.9}),
    );
    let processor = processor(&store, &backend, MemoryConfig::default());
    let report = assert_ok!(
        processor
            .merge_elements(scenario.a.id, scenario.b.id, &CancellationToken::new())
            .await
    );
    let c = report.merged.id;

    let merged = store.get_element(&c).unwrap();
    assert_eq!(merged.content["content"], json!({"merged": true}));
    assert_eq!(merged.content["merge_verification"]["success"], json!(true));
    assert_eq!(merged.content["merge_verification"]["confidence"], json!(0.9));
    assert_eq!(merged.element_type, scenario.a.element_type);
    assert!(merged.embedding.is_some());

    for original in [&scenario.a, &scenario.b] {
        let stored = store.get_element(&original.id).unwrap();
        assert_eq!(stored.merged_into(), Some(c));
        assert_eq!(stored.content[MERGED_INTO_KEY], json!(c.to_string()));
        // Original content survives next to the tombstone
        assert_eq!(stored.content["name"], original.content["name"]);
    }

    let outgoing = store.get_association(&outgoing.id).unwrap();
    assert_eq!((outgoing.source, outgoing.target), (c, d.id));
    let incoming = store.get_association(&incoming.id).unwrap();
    assert_eq!((incoming.source, incoming.target), (d.id, c));
    let collapsed = store.get_association(&scenario.link.id).unwrap();
    assert!(collapsed.is_self_loop());
    assert_eq!(collapsed.source, c);

    let gone = store.get_merge_candidate(&ElementPair::new(scenario.a.id, scenario.b.id));
    assert!(assert_err!(gone).is_not_found());
    assert_eq!(report.outcome.tombstoned, 2);

    processor.shutdown().await;
}

#[tokio::test]
async fn rejected_merge_only_annotates_candidate() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let backend = scripted_merge(
        r#"{"merged":true}"#,
        json!({"success": false, "confidence": 0.3, "issues": ["conflict"]}),
    );
    let processor = processor(&store, &backend, MemoryConfig::default());

    let err = processor
        .merge_elements(scenario.a.id, scenario.b.id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::VerificationRejected { .. }));
    assert!(err.to_string().contains("conflict"));

    assert_eq!(store.get_recent_elements(10).unwrap().len(), 2);
    assert_eq!(store.get_element(&scenario.a.id).unwrap().content, scenario.a.content);
    assert_eq!(store.get_element(&scenario.b.id).unwrap().content, scenario.b.content);

    let candidate = store
        .get_merge_candidate(&ElementPair::new(scenario.b.id, scenario.a.id))
        .unwrap();
    let failure = &candidate.metadata["merge_verification_failed"];
    assert_eq!(failure["success"], json!(false));
    assert_eq!(failure["issues"], json!(["conflict"]));

    processor.shutdown().await;
}

#[tokio::test]
async fn repeated_merge_of_consumed_pair_is_not_found() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let backend = scripted_merge(
        r#"{"merged":true}"#,
        json!({"success": true, "confidence": 0.8}),
    );
    let processor = processor(&store, &backend, MemoryConfig::default());
    let cancel = CancellationToken::new();

    assert_ok!(processor.merge_elements(scenario.a.id, scenario.b.id, &cancel).await);
    // Argument order is irrelevant to the pair
    let err = processor
        .merge_elements(scenario.b.id, scenario.a.id, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(backend.pending_completions(), 0);

    processor.shutdown().await;
}

#[tokio::test]
async fn merge_without_candidate_is_not_found() {
    let store = memory_store();
    let a = concept(&store, json!("a"));
    let b = concept(&store, json!("b"));
    let backend = Arc::new(MockBackend::new());
    let processor = processor(&store, &backend, MemoryConfig::default());

    let err = processor
        .merge_elements(a.id, b.id, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn merge_conserves_edges_touching_the_pair() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let others: Vec<_> = (0..4).map(|i| concept(&store, json!({ "other": i }))).collect();
    for (i, other) in others.iter().enumerate() {
        let (from, to) = if i % 2 == 0 {
            (&scenario.a, other)
        } else {
            (other, &scenario.b)
        };
        link(&store, from, to, 0.1 * (i + 1) as f32);
    }
    // Unrelated edge stays as it was
    let untouched = link(&store, &others[0], &others[1], 0.9);
    let before: HashSet<_> = store
        .associations_for(&scenario.a.id)
        .unwrap()
        .into_iter()
        .chain(store.associations_for(&scenario.b.id).unwrap())
        .map(|a| a.id)
        .collect();
    let total = store.count_associations().unwrap();

    let backend = scripted_merge(r#"{"k": 1}"#, json!({"success": true, "confidence": 1.0}));
    let processor = processor(&store, &backend, MemoryConfig::default());
    let report = processor
        .merge_elements(scenario.a.id, scenario.b.id, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.count_associations().unwrap(), total);
    for id in &before {
        assert!(store.get_association(id).unwrap().touches(&report.merged.id));
    }
    assert!(store.associations_for(&scenario.a.id).unwrap().is_empty());
    assert!(store.associations_for(&scenario.b.id).unwrap().is_empty());
    let after = store.get_association(&untouched.id).unwrap();
    assert_eq!((after.source, after.target), (untouched.source, untouched.target));
    assert_eq!(after.strength, untouched.strength);
}

#[tokio::test]
async fn overlapping_merges_are_serialized_and_second_conflicts() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let c = concept(&store, json!({"name": "borrow checking"}));
    store
        .create_merge_candidate(&MergeCandidate::new(scenario.b.id, c.id))
        .unwrap();

    let backend = Arc::new(
        MockBackend::new()
            .with_completion(r#"{"merged": 1}"#)
            .with_completion(json!({"success": true, "confidence": 0.9}).to_string())
            .with_completion(r#"{"merged": 2}"#)
            .with_completion(json!({"success": true, "confidence": 0.9}).to_string()),
    );
    let processor = processor(&store, &backend, MemoryConfig::default());
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        processor.merge_elements(scenario.a.id, scenario.b.id, &cancel),
        processor.merge_elements(scenario.b.id, c.id, &cancel),
    );
    let outcomes = [first, second];
    let committed = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(MemoryError::Conflict(_))))
        .count();
    assert_eq!((committed, conflicts), (1, 1));

    // B was merged exactly once
    let b = store.get_element(&scenario.b.id).unwrap();
    assert!(b.is_tombstone());
    assert_eq!(backend.pending_completions(), 2);
}

#[tokio::test]
async fn expired_deadline_cancels_merge() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let backend = scripted_merge(r#"{"merged":true}"#, json!({"success": true, "confidence": 0.9}));
    let processor = processor(&store, &backend, MemoryConfig::default());

    let cancel = CancellationToken::with_deadline(std::time::Duration::from_millis(1));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let err = processor
        .merge_elements(scenario.a.id, scenario.b.id, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::Cancelled));
    assert!(!store.get_element(&scenario.a.id).unwrap().is_tombstone());
    assert_eq!(store.list_merge_candidates().unwrap().len(), 1);
}

#[tokio::test]
async fn processors_sharing_a_store_cannot_both_merge_a_participant() {
    let store = memory_store();
    let scenario = merge_scenario(&store);
    let c = concept(&store, json!({"name": "borrow checking"}));
    store
        .create_merge_candidate(&MergeCandidate::new(scenario.b.id, c.id))
        .unwrap();

    let verdict = json!({"success": true, "confidence": 0.9});
    let left = processor(
        &store,
        &scripted_merge(r#"{"merged": "ab"}"#, verdict.clone()),
        MemoryConfig::default(),
    );
    let right = processor(
        &store,
        &scripted_merge(r#"{"merged": "bc"}"#, verdict),
        MemoryConfig::default(),
    );
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(
        left.merge_elements(scenario.a.id, scenario.b.id, &cancel),
        right.merge_elements(scenario.b.id, c.id, &cancel),
    );
    let (winner, loser) = match (first, second) {
        (Ok(report), Err(err)) | (Err(err), Ok(report)) => (report, err),
        (first, second) => panic!("expected one commit and one failure: {first:?} / {second:?}"),
    };
    assert!(matches!(loser, MemoryError::Conflict(_)), "{loser}");

    let b = store.get_element(&scenario.b.id).unwrap();
    assert_eq!(b.merged_into(), Some(winner.merged.id));
    // Only the winning merge created an element
    assert_eq!(store.get_recent_elements(10).unwrap().len(), 4);
}
