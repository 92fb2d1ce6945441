use sorteia::OrderingError;

use crate::context::TestContext;
use crate::helpers::assert_dense;

#[tokio::test]
async fn delete_compacts_the_remaining_positions() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C"])
        .await
        .with_order(&["A", "B", "C"])
        .await;

    let removed = ctx.engine.delete_one(&ctx.scope, &"B".into()).await.unwrap();
    assert_eq!(removed.resource_id.as_str(), "B");
    assert_eq!(removed.position, 1);

    let records = ctx.engine.read_many(&ctx.scope).await.unwrap();
    assert_dense(&records);
    assert_eq!(ctx.order().await, ["A", "C"]);
}

#[tokio::test]
async fn deleted_item_can_be_ordered_again() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A", "B"])
        .await;

    ctx.engine.delete_one(&ctx.scope, &"A".into()).await.unwrap();
    let outcome = ctx
        .engine
        .reorder_one(&ctx.scope, &"A".into(), sorteia::Placement::End)
        .await
        .unwrap();

    assert!(outcome.is_created());
    assert_eq!(ctx.order().await, ["B", "A"]);
}

#[tokio::test]
async fn deleting_an_unordered_item_reports_not_found() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A"])
        .await;

    let err = ctx
        .engine
        .delete_one(&ctx.scope, &"B".into())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(matches!(
        err.as_ordering(),
        Some(OrderingError::CustomOrderNotFound { .. })
    ));
    assert_eq!(ctx.order().await, ["A"]);
}

#[tokio::test]
async fn delete_only_touches_the_owners_scope() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A", "B"])
        .await;
    let bob = ctx.other_owner("bob");
    ctx.engine
        .reorder_one(&bob, &"A".into(), sorteia::Placement::End)
        .await
        .unwrap();

    ctx.engine.delete_one(&ctx.scope, &"A".into()).await.unwrap();

    assert_eq!(ctx.order().await, ["B"]);
    assert_eq!(ctx.engine.read_many(&bob).await.unwrap().len(), 1);
}
