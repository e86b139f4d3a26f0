//! Context enrichment over a seeded graph

mod common;

use common::{concept, link, memory_store, processor};
use engram::{CancellationToken, ElementId, MemoryConfig, MemoryError, MemoryStore, MockBackend};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn neighbourhood_is_expanded_with_minimum_depth() {
    let store = memory_store();
    // far -> mid -> seed, plus a weak edge that must be ignored
    let far = concept(&store, json!("far"));
    let weak = concept(&store, json!("weak"));
    let mid = concept(&store, json!("mid"));
    let seed = concept(&store, json!("seed"));
    link(&store, &far, &mid, 0.3);
    link(&store, &mid, &seed, 0.9);
    link(&store, &weak, &seed, 0.29);

    let mut config = MemoryConfig::default();
    config.enrichment.recent_limit = 1;
    let processor = processor(&store, &Arc::new(MockBackend::new()), config);
    let context = processor
        .enrich_context(&CancellationToken::new())
        .await
        .unwrap();

    let found: Vec<(ElementId, usize)> = context.iter().map(|c| (c.element.id, c.depth)).collect();
    assert_eq!(found, vec![(seed.id, 0), (mid.id, 1), (far.id, 2)]);
    processor.shutdown().await;
}

#[tokio::test]
async fn overlapping_seeds_are_reported_once() {
    let store = memory_store();
    let a = concept(&store, json!("a"));
    let b = concept(&store, json!("b"));
    let c = concept(&store, json!("c"));
    link(&store, &a, &b, 0.5);
    link(&store, &b, &c, 0.5);

    let processor = processor(&store, &Arc::new(MockBackend::new()), MemoryConfig::default());
    let context = processor
        .enrich_context(&CancellationToken::new())
        .await
        .unwrap();

    let ids: HashSet<ElementId> = context.iter().map(|c| c.element.id).collect();
    assert_eq!(ids.len(), context.len());
    assert_eq!(ids, HashSet::from([a.id, b.id, c.id]));
    // All three are recent, so all are seeds
    assert!(context.iter().all(|c| c.depth == 0));

    processor.shutdown().await;
    let stats = processor.recorder_stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.recorded + stats.dropped + stats.failed, 3);
}

#[tokio::test]
async fn accesses_accumulate_across_calls() {
    let store = memory_store();
    let only = concept(&store, json!("only"));
    let processor = processor(&store, &Arc::new(MockBackend::new()), MemoryConfig::default());
    let cancel = CancellationToken::new();

    processor.enrich_context(&cancel).await.unwrap();
    processor.enrich_context(&cancel).await.unwrap();
    processor.shutdown().await;

    let pattern = store.get_access_pattern(&only.id).unwrap();
    assert_eq!(pattern.access_count, 2);
    assert_eq!(pattern.successful_recalls, 2);
    assert!((pattern.certaindex - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn cancelled_enrichment_returns_cancelled() {
    let store = memory_store();
    concept(&store, json!("x"));
    let processor = processor(&store, &Arc::new(MockBackend::new()), MemoryConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = processor.enrich_context(&cancel).await.unwrap_err();
    assert!(matches!(err, MemoryError::Cancelled));
}
