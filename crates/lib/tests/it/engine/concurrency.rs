use sorteia::{OrderingError, Placement, ResourceId};

use crate::context::TestContext;
use crate::helpers::assert_dense;

const WRITERS: usize = 8;

fn writer_ids() -> Vec<String> {
    (0..WRITERS).map(|i| format!("item-{i}")).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_inserts_never_break_density() {
    let ids = writer_ids();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let ctx = TestContext::new().await.with_resources(&id_refs).await;

    let mut handles = Vec::new();
    for id in &ids {
        let engine = ctx.engine.clone();
        let scope = ctx.scope.clone();
        let resource_id = ResourceId::from(id.as_str());
        handles.push(tokio::spawn(async move {
            engine
                .reorder_one(&scope, &resource_id, Placement::At(0))
                .await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(err) => {
                assert!(err.is_retryable(), "unexpected failure: {err}");
                assert!(matches!(
                    err.as_ordering(),
                    Some(OrderingError::CustomOrderNotSaved { .. })
                ));
            }
        }
    }

    let records = ctx.engine.read_many(&ctx.scope).await.unwrap();
    assert!(committed >= 1);
    assert_eq!(records.len(), committed);
    assert_dense(&records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retried_writers_all_eventually_commit() {
    let ids = writer_ids();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let ctx = TestContext::new().await.with_resources(&id_refs).await;

    let mut handles = Vec::new();
    for id in &ids {
        let engine = ctx.engine.clone();
        let scope = ctx.scope.clone();
        let resource_id = ResourceId::from(id.as_str());
        handles.push(tokio::spawn(async move {
            loop {
                match engine
                    .reorder_one(&scope, &resource_id, Placement::End)
                    .await
                {
                    Ok(outcome) => return outcome,
                    Err(err) if err.is_retryable() => tokio::task::yield_now().await,
                    Err(err) => panic!("non-retryable failure: {err}"),
                }
            }
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_created());
    }

    let records = ctx.engine.read_many(&ctx.scope).await.unwrap();
    assert_eq!(records.len(), WRITERS);
    assert_dense(&records);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_owners_do_not_contend() {
    let ctx = TestContext::new()
        .await
        .with_resources(&["A", "B", "C"])
        .await;

    let mut handles = Vec::new();
    for owner in ["o1", "o2", "o3", "o4"] {
        let engine = ctx.engine.clone();
        let scope = ctx.other_owner(owner);
        handles.push(tokio::spawn(async move {
            for id in ["A", "B", "C"] {
                // SQL backends may still report lock contention; only a
                // version conflict inside one scope would be a bug here.
                loop {
                    match engine
                        .reorder_one(&scope, &ResourceId::from(id), Placement::At(0))
                        .await
                    {
                        Ok(_) => break,
                        Err(err) if err.is_retryable() && !err.is_conflict() => {
                            tokio::task::yield_now().await
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
            engine.read_many(&scope).await
        }));
    }

    for handle in handles {
        let records = handle.await.unwrap().unwrap();
        let order: Vec<&str> = records.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(order, ["C", "B", "A"]);
    }
}
