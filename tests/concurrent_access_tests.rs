mod common;

use common::{rec, setup};
use modelkit::{Operator, QueryDescriptor, Value};

#[tokio::test]
async fn test_concurrent_queries_share_one_state() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    for i in 0..40 {
        users
            .create(rec(serde_json::json!({"name": format!("u{}", i), "rank": i % 4})))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for rank in 0..4i64 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let q = QueryDescriptor::model("user")
                .filter("rank", Operator::Eq, rank)
                .with("addresses", modelkit::With::new());
            let rows = state.query().run(&q).await.unwrap();
            (rank, rows)
        }));
    }

    for handle in handles {
        let (rank, rows) = handle.await.unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.get("rank") == Some(&Value::Int(rank))));
        assert!(rows.iter().all(|r| r.get("addresses") == Some(&Value::List(vec![]))));
    }
}

#[tokio::test]
async fn test_concurrent_writers_get_distinct_ids() {
    let state = setup().await;
    let mut handles = Vec::new();
    for i in 0..8 {
        let users = state.select("user").unwrap();
        handles.push(tokio::spawn(async move {
            users
                .create(rec(serde_json::json!({"name": format!("w{}", i)})))
                .await
                .unwrap()
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().as_i64().unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());

    let users = state.select("user").unwrap();
    assert_eq!(users.count(&QueryDescriptor::new()).await.unwrap(), 8);
}
