mod common;

use common::{rec, rows, setup};
use modelkit::{ModelError, Operator, QueryDescriptor, Value};

#[tokio::test]
async fn test_primary_key_detection() {
    let state = setup().await;
    for name in ["user", "manu", "address", "user_friend", "node"] {
        assert_eq!(state.model(name).unwrap().primary_key, "id", "model {}", name);
    }
    assert_eq!(state.registry.names(), vec!["address", "manu", "node", "user", "user_friend"]);
}

#[tokio::test]
async fn test_create_then_find_round_trip() {
    let state = setup().await;
    let users = state.select("user").unwrap();

    let id = users
        .create(rec(serde_json::json!({
            "name": "ann",
            "mobile": "13900001111",
            "password": "s3cret",
            "balance": 12.5,
            "extra": "{\"theme\": \"dark\", \"tags\": [\"a\", \"b\"]}"
        })))
        .await
        .unwrap();
    assert_eq!(id, Value::Int(1));

    let row = users.find(id, &QueryDescriptor::new()).await.unwrap();
    assert_eq!(row.get("name"), Some(&Value::from("ann")));
    assert_eq!(row.get("mobile"), Some(&Value::from("13900001111")));
    assert_eq!(row.get("balance"), Some(&Value::Float(12.5)));
    assert_eq!(row.get("status"), Some(&Value::from("enabled")));
    assert_eq!(row.get_path("extra.tags.1"), Some(&Value::from("b")));
    assert!(row.get("created_at").and_then(Value::as_str).is_some());
    assert_eq!(row.get("deleted_at"), Some(&Value::Null));

    let hashed = row.get("password").and_then(Value::as_str).unwrap();
    assert_ne!(hashed, "s3cret");
    assert!(bcrypt::verify("s3cret", hashed).unwrap());
}

#[tokio::test]
async fn test_find_ignores_window_of_the_query() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let id = users.create(rec(serde_json::json!({"name": "ann"}))).await.unwrap();

    let windowed = QueryDescriptor::new().offset(5).limit(10);
    let row = users.find(id.clone(), &windowed).await.unwrap();
    assert_eq!(row.get("id"), Some(&id));
}

#[tokio::test]
async fn test_save_updates_or_inserts() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let all = QueryDescriptor::new();

    let id = users.save(rec(serde_json::json!({"name": "ann"}))).await.unwrap();
    assert_eq!(users.count(&all).await.unwrap(), 1);

    let same = users
        .save(rec(serde_json::json!({"id": id.clone(), "name": "anna", "status": "disabled"})))
        .await
        .unwrap();
    assert_eq!(same, id);
    assert_eq!(users.count(&all).await.unwrap(), 1);
    let row = users.find(id, &all).await.unwrap();
    assert_eq!(row.get("name"), Some(&Value::from("anna")));
    assert_eq!(row.get("status"), Some(&Value::from("disabled")));

    users.save(rec(serde_json::json!({"name": "bob"}))).await.unwrap();
    assert_eq!(users.count(&all).await.unwrap(), 2);
}

#[tokio::test]
async fn test_soft_delete_then_destroy() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let a = users.create(rec(serde_json::json!({"name": "a"}))).await.unwrap();
    let b = users.create(rec(serde_json::json!({"name": "b"}))).await.unwrap();
    let all = QueryDescriptor::new();
    let trashed = QueryDescriptor::new().with_trashed();

    assert_eq!(users.delete(a.clone()).await.unwrap(), 1);
    assert!(matches!(
        users.find(a.clone(), &all).await,
        Err(ModelError::NotFound { .. })
    ));
    assert_eq!(users.count(&all).await.unwrap(), 1);
    assert_eq!(users.count(&trashed).await.unwrap(), 2);
    let ghost = users.find(a.clone(), &trashed).await.unwrap();
    assert!(ghost.get("deleted_at").and_then(Value::as_str).is_some());

    // A second soft delete finds nothing left to mark.
    assert_eq!(users.delete(a.clone()).await.unwrap(), 0);

    assert_eq!(users.destroy(a).await.unwrap(), 1);
    assert_eq!(users.count(&trashed).await.unwrap(), 1);
    assert_eq!(users.destroy(b).await.unwrap(), 1);
    assert_eq!(users.count(&trashed).await.unwrap(), 0);
}

#[tokio::test]
async fn test_hard_delete_without_soft_delete_column() {
    let state = setup().await;
    let manus = state.select("manu").unwrap();
    let id = manus.create(rec(serde_json::json!({"name": "Acme"}))).await.unwrap();
    assert_eq!(manus.delete(id).await.unwrap(), 1);
    assert_eq!(manus.count(&QueryDescriptor::new().with_trashed()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_where_counts_rows() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    for (name, status) in [("a", "enabled"), ("b", "disabled"), ("c", "disabled")] {
        users
            .create(rec(serde_json::json!({"name": name, "status": status})))
            .await
            .unwrap();
    }
    let disabled = QueryDescriptor::new().filter("status", Operator::Eq, "disabled");
    let changed = users
        .update_where(&disabled, rec(serde_json::json!({"rank": 7})))
        .await
        .unwrap();
    assert_eq!(changed, 2);
    let ranked = users
        .get(&QueryDescriptor::new().filter("rank", Operator::Eq, 7))
        .await
        .unwrap();
    assert_eq!(ranked.len(), 2);
}

#[tokio::test]
async fn test_validation_reports_every_failure() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let err = users
        .create(rec(serde_json::json!({"mobile": "12", "status": "gone", "rank": "high"})))
        .await
        .unwrap_err();
    let ModelError::Validation(errors) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.columns(), vec!["name", "mobile", "status", "rank"]);
    assert_eq!(users.count(&QueryDescriptor::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_columns() {
    let state = setup().await;
    let users = state.select("user").unwrap();

    let id = users
        .create(rec(serde_json::json!({"name": "x", "nickname": "y"})))
        .await
        .unwrap();
    let row = users.find(id, &QueryDescriptor::new()).await.unwrap();
    assert!(!row.contains_key("nickname"));

    let err = users
        .get(&QueryDescriptor::new().filter("nickname", Operator::Eq, "y"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::UnknownColumn { ref column, .. } if column == "nickname"));
}

#[tokio::test]
async fn test_insert_shape_mismatch_writes_nothing() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let all = QueryDescriptor::new();

    let err = users
        .insert(
            &["name", "status"],
            vec![
                vec!["a".into(), "enabled".into()],
                vec!["b".into()],
                vec!["c".into(), "enabled".into()],
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Shape { row: 1, expected: 2, got: 1 }));
    assert_eq!(users.count(&all).await.unwrap(), 0);

    let written = users
        .insert(
            &["name", "status"],
            vec![vec!["a".into(), "enabled".into()], vec!["b".into(), "disabled".into()]],
        )
        .await
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(users.count(&all).await.unwrap(), 2);
}

#[tokio::test]
async fn test_each_save_index_placeholder() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let defaults = rec(serde_json::json!({"rank": "$index", "status": "disabled"}));

    let ids = users
        .each_save(
            rows(serde_json::json!([
                {"name": "a"},
                {"name": "b"},
                {"name": "c", "status": "enabled"}
            ])),
            Some(&defaults),
        )
        .await
        .unwrap();
    assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

    let saved = users
        .get(&QueryDescriptor::new().order_by("id", modelkit::Direction::Asc))
        .await
        .unwrap();
    let ranks: Vec<_> = saved.iter().map(|r| r.get("rank").cloned()).collect();
    assert_eq!(ranks, vec![Some(Value::Int(0)), Some(Value::Int(1)), Some(Value::Int(2))]);
    assert_eq!(saved[0].get("status"), Some(&Value::from("disabled")));
    assert_eq!(saved[2].get("status"), Some(&Value::from("enabled")));
}

#[tokio::test]
async fn test_each_save_reports_failing_row() {
    let state = setup().await;
    let users = state.select("user").unwrap();
    let err = users
        .each_save(rows(serde_json::json!([{"name": "a"}, {"rank": 1}])), None)
        .await
        .unwrap_err();
    let ModelError::Validation(errors) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.columns(), vec!["1.name"]);
}

#[tokio::test]
async fn test_must_variants_carry_status() {
    let state = setup().await;
    let users = state.select("user").unwrap();

    let fault = users.must_find(99, &QueryDescriptor::new()).await.unwrap_err();
    assert_eq!(fault.status.as_u16(), 404);
    assert_eq!(fault.code, "not_found");

    let fault = users.must_create(rec(serde_json::json!({}))).await.unwrap_err();
    assert_eq!(fault.status.as_u16(), 400);
    assert_eq!(fault.code, "validation_error");
    let details = fault.details.expect("validation details");
    assert_eq!(details[0]["column"], "name");

    let fault = users.must_insert(&["name"], vec![vec![]]).await.unwrap_err();
    assert_eq!(fault.status.as_u16(), 400);

    let id = users.must_create(rec(serde_json::json!({"name": "ok"}))).await.unwrap();
    assert_eq!(users.must_find(id, &QueryDescriptor::new()).await.unwrap().get("name"), Some(&Value::from("ok")));
}
