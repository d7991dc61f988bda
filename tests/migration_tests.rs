mod common;

use common::{rec, setup};
use modelkit::{migrate, ModelError, QueryDescriptor, Store, Value};

const MANU_V2: &str = r#"{
  "name": "Manufacturer",
  "table": { "name": "manus" },
  "columns": [
    { "name": "id", "type": "ID" },
    { "name": "name", "type": "text", "nullable": false },
    { "name": "country", "type": "string", "length": 2, "default": "DE" }
  ]
}"#;

#[tokio::test]
async fn test_second_run_is_noop() {
    let state = setup().await;
    let model = state.model("user").unwrap();
    let report = migrate(&state, &model, false).await.unwrap();
    assert!(report.is_noop(), "unexpected report {:?}", report);
    assert_eq!(report.table, "users");
    assert!(report.retained.is_empty());
}

#[tokio::test]
async fn test_alter_adds_and_changes_but_never_drops() {
    let state = setup().await;
    let manus = state.select("manu").unwrap();
    manus
        .create(rec(serde_json::json!({"name": "Acme", "short_name": "AC"})))
        .await
        .unwrap();

    let model = state.registry.load(MANU_V2, "manu").await.unwrap();
    let report = migrate(&state, &model, false).await.unwrap();
    assert!(!report.created);
    assert_eq!(report.added, vec!["country"]);
    assert_eq!(report.changed, vec!["name"]);
    assert_eq!(report.retained, vec!["short_name"]);

    let rows = state.select("manu").unwrap().get(&QueryDescriptor::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("Acme")));
    assert_eq!(rows[0].get("country"), Some(&Value::from("DE")));

    // Running again only reports the undeclared column.
    let again = migrate(&state, &model, false).await.unwrap();
    assert!(again.is_noop());
    assert_eq!(again.retained, vec!["short_name"]);
}

#[tokio::test]
async fn test_force_recreates_empty_table() {
    let state = setup().await;
    let manus = state.select("manu").unwrap();
    manus.create(rec(serde_json::json!({"name": "Acme"}))).await.unwrap();

    let report = manus.migrate(true).await.unwrap();
    assert!(report.created);
    assert_eq!(manus.count(&QueryDescriptor::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_not_null_column_without_default_is_fatal() {
    let state = setup().await;
    state
        .select("manu")
        .unwrap()
        .create(rec(serde_json::json!({"name": "Acme"})))
        .await
        .unwrap();

    let strict = r#"{
      "table": { "name": "manus" },
      "columns": [
        { "name": "id", "type": "ID" },
        { "name": "name", "type": "string", "length": 80, "nullable": false },
        { "name": "short_name", "type": "string", "length": 20 },
        { "name": "code", "type": "string", "nullable": false }
      ]
    }"#;
    let model = state.registry.load(strict, "manu").await.unwrap();
    let err = migrate(&state, &model, false).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, ModelError::Migration { ref table, .. } if table == "manus"));
}

const MANU_NARROW: &str = r#"{
  "table": { "name": "manus" },
  "columns": [
    { "name": "id", "type": "ID" },
    { "name": "name", "type": "string", "length": 10, "nullable": false },
    { "name": "short_name", "type": "string", "length": 20 }
  ]
}"#;

#[tokio::test]
async fn test_length_change_is_migrated() {
    let state = setup().await;
    let manus = state.select("manu").unwrap();
    manus.create(rec(serde_json::json!({"name": "Acme"}))).await.unwrap();

    let model = state.registry.load(MANU_NARROW, "manu").await.unwrap();
    let report = migrate(&state, &model, false).await.unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.changed, vec!["name"]);
    assert!(report.retained.is_empty());

    let live = state.store.describe_table("manus").await.unwrap();
    let name = live.iter().find(|c| c.name == "name").unwrap();
    assert_eq!(name.length, Some(10));

    assert!(migrate(&state, &model, false).await.unwrap().is_noop());
}

#[tokio::test]
async fn test_shrinking_below_stored_values_is_fatal() {
    let state = setup().await;
    state
        .select("manu")
        .unwrap()
        .create(rec(serde_json::json!({"name": "Acme Industrial Holdings"})))
        .await
        .unwrap();

    let model = state.registry.load(MANU_NARROW, "manu").await.unwrap();
    let err = migrate(&state, &model, false).await.unwrap_err();
    assert!(err.is_fatal());
    let rows = state.select("manu").unwrap().get(&QueryDescriptor::new()).await.unwrap();
    assert_eq!(rows[0].get("name"), Some(&Value::from("Acme Industrial Holdings")));
}
