use sorteia::{BulkWriteSummary, ResourceId};

use crate::context::TestContext;
use crate::helpers::assert_dense;

fn batch(items: &[(&str, usize)]) -> Vec<(ResourceId, usize)> {
    items
        .iter()
        .map(|(id, position)| (ResourceId::from(*id), *position))
        .collect()
}

#[tokio::test]
async fn batch_into_empty_scope_creates_every_record() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["a", "b", "c"])
        .await;

    let summary = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("c", 0), ("a", 1), ("b", 2)]))
        .await
        .unwrap();

    assert_eq!(
        summary,
        BulkWriteSummary {
            matched: 0,
            modified: 0,
            upserted: 3,
        }
    );
    assert_eq!(ctx.order().await, ["c", "a", "b"]);
}

#[tokio::test]
async fn requested_items_land_exactly_and_the_rest_keep_their_order() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C", "D"])
        .await
        .with_order(&["A", "B", "C", "D"])
        .await;

    let summary = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("D", 0), ("A", 3)]))
        .await
        .unwrap();

    assert_eq!(ctx.order().await, ["D", "B", "C", "A"]);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.modified, 2);
    assert_eq!(summary.upserted, 0);
}

#[tokio::test]
async fn untouched_records_that_shift_are_counted() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C"])
        .await
        .with_order(&["A", "B", "C"])
        .await;

    let summary = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("C", 0)]))
        .await
        .unwrap();

    assert_eq!(ctx.order().await, ["C", "A", "B"]);
    assert_eq!(summary.matched, 3);
    assert_eq!(summary.modified, 3);
}

#[tokio::test]
async fn new_and_existing_items_mix() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "N"])
        .await
        .with_order(&["A", "B"])
        .await;

    let summary = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("N", 0)]))
        .await
        .unwrap();

    assert_eq!(ctx.order().await, ["N", "A", "B"]);
    assert_eq!(summary.upserted, 1);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.modified, 2);
    assert_dense(&ctx.engine.read_many(&ctx.scope).await.unwrap());
}

#[tokio::test]
async fn item_already_in_place_is_matched_but_not_modified() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A", "B"])
        .await;

    let summary = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("A", 0)]))
        .await
        .unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.modified, 0);
    assert_eq!(ctx.order().await, ["A", "B"]);
}

#[tokio::test]
async fn duplicate_resource_is_rejected() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A", "B"])
        .await;

    let err = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("A", 0), ("A", 1)]))
        .await
        .unwrap_err();

    assert!(err.is_position_out_of_bounds());
    assert_eq!(ctx.order().await, ["A", "B"]);
}

#[tokio::test]
async fn duplicate_position_is_rejected() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A", "B"])
        .await;

    let err = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("A", 1), ("B", 1)]))
        .await
        .unwrap_err();

    assert!(err.is_position_out_of_bounds());
    assert_eq!(ctx.order().await, ["A", "B"]);
}

#[tokio::test]
async fn position_past_the_final_count_is_rejected() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C"])
        .await
        .with_order(&["A", "B"])
        .await;

    // Final count is 3 once C is inserted, so 3 is one past the end.
    let err = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("C", 3)]))
        .await
        .unwrap_err();
    assert!(err.is_position_out_of_bounds());

    ctx.engine
        .reorder_many(&ctx.scope, &batch(&[("C", 2)]))
        .await
        .unwrap();
    assert_eq!(ctx.order().await, ["A", "B", "C"]);
}

#[tokio::test]
async fn unknown_resource_fails_the_whole_batch() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A"])
        .await;

    let err = ctx
        .engine
        .reorder_many(&ctx.scope, &batch(&[("B", 0), ("ghost", 1)]))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(ctx.order().await, ["A"]);
}

#[tokio::test]
async fn empty_batch_writes_nothing() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A"])
        .await
        .with_order(&["A"])
        .await;
    let before = ctx.engine.backend().find_scope(&ctx.scope).await.unwrap();

    let summary = ctx.engine.reorder_many(&ctx.scope, &[]).await.unwrap();

    assert_eq!(summary, BulkWriteSummary::default());
    let after = ctx.engine.backend().find_scope(&ctx.scope).await.unwrap();
    assert_eq!(after.version, before.version);
}
