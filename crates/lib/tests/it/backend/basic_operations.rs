use serde_json::json;

use sorteia::{
    OrderingRecord, Resource, ResourceType, Scope,
    backend::{OrderingBackend, WriteOp},
    clock::millis_to_datetime,
};

use crate::helpers::{seed_resources, test_backend};

fn record(scope: &Scope, id: &str, position: usize) -> OrderingRecord {
    OrderingRecord::new(scope, id.into(), position, millis_to_datetime(1_000))
}

#[tokio::test]
async fn versions_start_at_zero_and_bump_per_commit() {
    let backend = test_backend().await;
    let scope = Scope::new("ana", "tasks");

    let empty = backend.find_scope(&scope).await.unwrap();
    assert_eq!(empty.version, 0);
    assert!(empty.is_empty());

    backend
        .apply(&scope, 0, vec![WriteOp::Insert(record(&scope, "a", 0))])
        .await
        .unwrap();
    backend
        .apply(&scope, 1, vec![WriteOp::Insert(record(&scope, "b", 1))])
        .await
        .unwrap();

    let snapshot = backend.find_scope(&scope).await.unwrap();
    assert_eq!(snapshot.version, 2);
    let ids: Vec<&str> = snapshot
        .records
        .iter()
        .map(|r| r.resource_id.as_str())
        .collect();
    assert_eq!(ids, ["a", "b"]);
}

#[tokio::test]
async fn two_writers_cannot_commit_from_the_same_snapshot() {
    let backend = test_backend().await;
    let scope = Scope::new("ana", "tasks");
    let snapshot = backend.find_scope(&scope).await.unwrap();

    backend
        .apply(
            &scope,
            snapshot.version,
            vec![WriteOp::Insert(record(&scope, "a", 0))],
        )
        .await
        .unwrap();
    let err = backend
        .apply(
            &scope,
            snapshot.version,
            vec![WriteOp::Insert(record(&scope, "b", 0))],
        )
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    let after = backend.find_scope(&scope).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after.records[0].resource_id.as_str(), "a");
}

#[tokio::test]
async fn scopes_have_independent_versions() {
    let backend = test_backend().await;
    let ana = Scope::new("ana", "tasks");
    let bob = Scope::new("bob", "tasks");

    backend
        .apply(&ana, 0, vec![WriteOp::Insert(record(&ana, "a", 0))])
        .await
        .unwrap();
    backend
        .apply(&bob, 0, vec![WriteOp::Insert(record(&bob, "a", 0))])
        .await
        .unwrap();

    assert_eq!(backend.find_scope(&ana).await.unwrap().version, 1);
    assert_eq!(backend.find_scope(&bob).await.unwrap().version, 1);
}

#[tokio::test]
async fn failed_batch_leaves_nothing_behind() {
    let backend = test_backend().await;
    let scope = Scope::new("ana", "tasks");
    backend
        .apply(&scope, 0, vec![WriteOp::Insert(record(&scope, "a", 0))])
        .await
        .unwrap();

    // A gap at position 1 makes the batch non-dense.
    let err = backend
        .apply(
            &scope,
            1,
            vec![
                WriteOp::Insert(record(&scope, "b", 2)),
                WriteOp::Insert(record(&scope, "c", 3)),
            ],
        )
        .await
        .unwrap_err();
    assert!(err.is_integrity_error());

    let snapshot = backend.find_scope(&scope).await.unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn duplicate_key_is_a_conflict() {
    let backend = test_backend().await;
    let scope = Scope::new("ana", "tasks");
    backend
        .apply(&scope, 0, vec![WriteOp::Insert(record(&scope, "a", 0))])
        .await
        .unwrap();

    let err = backend
        .apply(&scope, 1, vec![WriteOp::Insert(record(&scope, "a", 1))])
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(backend.find_scope(&scope).await.unwrap().len(), 1);
}

#[tokio::test]
async fn moving_an_unknown_record_is_not_found() {
    let backend = test_backend().await;
    let scope = Scope::new("ana", "tasks");
    let ghost = record(&scope, "ghost", 0);

    let err = backend
        .apply(
            &scope,
            0,
            vec![WriteOp::SetPosition {
                id: ghost.id,
                position: 0,
                updated_at: ghost.updated_at,
            }],
        )
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn find_by_key_is_scoped_to_the_owner() {
    let backend = test_backend().await;
    let ana = Scope::new("ana", "tasks");
    let stored = record(&ana, "a", 0);
    backend
        .apply(&ana, 0, vec![WriteOp::Insert(stored.clone())])
        .await
        .unwrap();

    let found = backend.find_by_key(&ana, &"a".into()).await.unwrap();
    assert_eq!(found, Some(stored));

    let bob = Scope::new("bob", "tasks");
    assert_eq!(backend.find_by_key(&bob, &"a".into()).await.unwrap(), None);
}

#[tokio::test]
async fn resources_can_be_replaced_and_removed() {
    let backend = test_backend().await;
    let tasks = ResourceType::from("tasks");
    seed_resources(backend.as_ref(), "tasks", &["a"]).await;
    assert!(backend.resource_exists(&tasks, &"a".into()).await.unwrap());
    assert!(!backend.resource_exists(&tasks, &"b".into()).await.unwrap());
    assert!(
        !backend
            .resource_exists(&"notes".into(), &"a".into())
            .await
            .unwrap()
    );

    backend
        .put_resource(
            &tasks,
            Resource::new("a", millis_to_datetime(5), json!({ "name": "renamed" })),
        )
        .await
        .unwrap();
    let scope = Scope::new("ana", "tasks");
    backend
        .apply(&scope, 0, vec![WriteOp::Insert(record(&scope, "a", 0))])
        .await
        .unwrap();
    let joined = backend.join_resources(&scope).await.unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].1.payload["name"], "renamed");

    assert!(backend.remove_resource(&tasks, &"a".into()).await.unwrap());
    assert!(!backend.remove_resource(&tasks, &"a".into()).await.unwrap());
    assert!(backend.join_resources(&scope).await.unwrap().is_empty());
}

#[tokio::test]
async fn ensure_indexes_is_idempotent() {
    let backend = test_backend().await;
    backend.ensure_indexes().await.unwrap();
    backend.ensure_indexes().await.unwrap();
}
