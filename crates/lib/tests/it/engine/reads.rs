use serde::Deserialize;
use serde_json::json;

use sorteia::{
    MergeQuery, Resource, ResourceFilter, ResourceType, clock::millis_to_datetime,
};

use crate::context::TestContext;

fn ids(items: &[sorteia::CollectionItem]) -> Vec<String> {
    items.iter().map(|i| i.resource.id.to_string()).collect()
}

#[tokio::test]
async fn read_many_on_an_empty_scope_is_empty() {
    let ctx = TestContext::new().await;
    assert!(ctx.engine.read_many(&ctx.scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn whole_object_pairs_records_with_payloads() {
    #[derive(Deserialize)]
    struct Task {
        name: String,
    }

    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["B", "A"])
        .await;

    let items = ctx.engine.read_many_whole_object(&ctx.scope).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].ordering.resource_id.as_str(), "B");
    assert_eq!(items[0].resource.id.as_str(), "B");
    assert_eq!(items[1].ordering.position, 1);
    let task: Task = items[1].payload_as().unwrap();
    assert_eq!(task.name, "A");
}

#[tokio::test]
async fn whole_object_skips_records_whose_resource_is_gone() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C"])
        .await
        .with_order(&["A", "B", "C"])
        .await;
    ctx.engine
        .backend()
        .remove_resource(&ctx.scope.resource_type, &"B".into())
        .await
        .unwrap();

    let items = ctx.engine.read_many_whole_object(&ctx.scope).await.unwrap();

    let names: Vec<&str> = items.iter().map(|i| i.resource.id.as_str()).collect();
    assert_eq!(names, ["A", "C"]);
    // The record itself survives; only the joined view drops it.
    assert_eq!(ctx.engine.read_many(&ctx.scope).await.unwrap().len(), 3);
}

#[tokio::test]
async fn entire_collection_lists_ordered_items_then_newest_unordered() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C", "D", "E"])
        .await
        .with_order(&["B", "D"])
        .await;

    let items = ctx
        .engine
        .read_many_entire_collection(&ctx.scope, &MergeQuery::default())
        .await
        .unwrap();

    assert_eq!(ids(&items), ["B", "D", "E", "C", "A"]);
    assert_eq!(items[1].position(), Some(1));
    assert!(items[2..].iter().all(|i| !i.is_ordered()));
}

#[tokio::test]
async fn entire_collection_pages_after_merging() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C", "D", "E"])
        .await
        .with_order(&["B", "D"])
        .await;

    let page = ctx
        .engine
        .read_many_entire_collection(&ctx.scope, &MergeQuery::default().offset(1).limit(3))
        .await
        .unwrap();
    assert_eq!(ids(&page), ["D", "E", "C"]);

    let past_end = ctx
        .engine
        .read_many_entire_collection(&ctx.scope, &MergeQuery::default().offset(10))
        .await
        .unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn entire_collection_filters_before_paging() {
    let ctx = TestContext::new().await;
    let tasks = ResourceType::from(ctx.scope.resource_type.as_str());
    let backend = ctx.engine.backend();
    for (i, (id, status)) in [("A", "open"), ("B", "done"), ("C", "open"), ("D", "open")]
        .into_iter()
        .enumerate()
    {
        backend
            .put_resource(
                &tasks,
                Resource::new(
                    id,
                    millis_to_datetime(1_000 * (i as u64 + 1)),
                    json!({ "status": status }),
                ),
            )
            .await
            .unwrap();
    }
    let ctx = ctx.with_order(&["B", "C"]).await;

    let open = MergeQuery::new(ResourceFilter::new().field("status", "open"));
    let items = ctx
        .engine
        .read_many_entire_collection(&ctx.scope, &open)
        .await
        .unwrap();
    assert_eq!(ids(&items), ["C", "D", "A"]);

    let second = ctx
        .engine
        .read_many_entire_collection(&ctx.scope, &open.clone().offset(1).limit(1))
        .await
        .unwrap();
    assert_eq!(ids(&second), ["D"]);
}

#[tokio::test]
async fn entire_collection_never_shows_other_owners_records() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B"])
        .await
        .with_order(&["A"])
        .await;
    let bob = ctx.other_owner("bob");

    let items = ctx
        .engine
        .read_many_entire_collection(&bob, &MergeQuery::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| !i.is_ordered()));
    assert_eq!(ids(&items), ["B", "A"]);
}
