mod common;

use common::{rec, rows, setup};
use modelkit::{AppState, Direction, ModelError, Operator, QueryDescriptor, Record, Value, Where, With};

/// Two manufacturers, four users, three addresses and three friendships.
///
/// users: 1 mom (manu 1), 2 ann (mother 1, manu 2), 3 bob (mother 1), 4 cy
async fn seed() -> AppState {
    let state = setup().await;
    let manus = state.select("manu").unwrap();
    manus
        .each_save(rows(serde_json::json!([{"name": "Acme"}, {"name": "Bolt"}])), None)
        .await
        .unwrap();

    let users = state.select("user").unwrap();
    users
        .each_save(
            rows(serde_json::json!([
                {"name": "mom", "manu_id": 1},
                {"name": "ann", "mother_id": 1, "manu_id": 2},
                {"name": "bob", "mother_id": 1},
                {"name": "cy", "status": "disabled"}
            ])),
            None,
        )
        .await
        .unwrap();

    state
        .select("address")
        .unwrap()
        .insert(
            &["user_id", "city", "location"],
            vec![
                vec![2.into(), "Paris".into(), "rue A".into()],
                vec![3.into(), "Rome".into(), "via B".into()],
                vec![2.into(), "Lyon".into(), "rue C".into()],
            ],
        )
        .await
        .unwrap();

    state
        .select("user_friend")
        .unwrap()
        .insert(
            &["user_id", "friend_id", "type"],
            vec![
                vec![2.into(), 3.into(), "school".into()],
                vec![2.into(), 4.into(), "work".into()],
                vec![3.into(), 2.into(), "school".into()],
            ],
        )
        .await
        .unwrap();
    state
}

fn by_name<'a>(rows: &'a [Record], name: &str) -> &'a Record {
    rows.iter()
        .find(|r| r.get("name").and_then(Value::as_str) == Some(name))
        .unwrap_or_else(|| panic!("no row named {}", name))
}

#[tokio::test]
async fn test_one_to_one_and_one_to_many() {
    let state = seed().await;
    let q = QueryDescriptor::model("user")
        .select(["name"])
        .with("manu", With::new())
        .with("addresses", With::new());
    let rows = state.query().run(&q).await.unwrap();
    assert_eq!(rows.len(), 4);

    let ann = by_name(&rows, "ann");
    assert_eq!(ann.get_path("manu.name"), Some(&Value::from("Bolt")));
    assert_eq!(ann.get("addresses").and_then(Value::as_list).map(|l| l.len()), Some(2));

    let bob = by_name(&rows, "bob");
    assert!(!bob.contains_key("manu"));
    assert_eq!(bob.get_path("addresses.0.city"), Some(&Value::from("Rome")));

    let cy = by_name(&rows, "cy");
    assert_eq!(cy.get("addresses"), Some(&Value::List(vec![])));
    // The stitch keys were added to the explicit select list.
    assert!(cy.contains_key("id") && cy.contains_key("manu_id"));
}

#[tokio::test]
async fn test_nested_eager_load_keeps_siblings_apart() {
    let state = seed().await;
    let addresses = QueryDescriptor::new()
        .select(["city"])
        .order_by("city", Direction::Asc)
        .with(
            "user",
            With::new().query(QueryDescriptor::new().with("manu", With::new())),
        );
    let q = QueryDescriptor::model("user")
        .order_by("id", Direction::Desc)
        .with("addresses", With::new().query(addresses));
    let rows = state.query().run(&q).await.unwrap();

    // Outer ordering applies to the parents only.
    assert_eq!(rows[0].get("name"), Some(&Value::from("cy")));

    let ann = by_name(&rows, "ann");
    assert_eq!(ann.get_path("addresses.0.city"), Some(&Value::from("Lyon")));
    assert_eq!(ann.get_path("addresses.1.city"), Some(&Value::from("Paris")));
    assert_eq!(ann.get_path("addresses.1.user.name"), Some(&Value::from("ann")));
    assert_eq!(ann.get_path("addresses.1.user.manu.name"), Some(&Value::from("Bolt")));
    // The child select was narrowed; only the stitch key joined it.
    assert_eq!(ann.get_path("addresses.0.location"), None);

    let bob = by_name(&rows, "bob");
    assert_eq!(bob.get("addresses").and_then(Value::as_list).map(|l| l.len()), Some(1));
    assert_eq!(bob.get_path("addresses.0.user.name"), Some(&Value::from("bob")));
    assert_eq!(bob.get_path("addresses.0.user.manu"), None);
}

#[tokio::test]
async fn test_override_filter_is_anded_with_parent_keys() {
    let state = seed().await;
    let q = QueryDescriptor::model("user").with(
        "addresses",
        With::new().query(QueryDescriptor::new().filter("city", Operator::Like, "%o%")),
    );
    let rows = state.query().run(&q).await.unwrap();
    let ann = by_name(&rows, "ann");
    let cities: Vec<_> = ann
        .get("addresses")
        .and_then(Value::as_list)
        .unwrap()
        .iter()
        .filter_map(|a| a.as_record().and_then(|r| r.get("city")).cloned())
        .collect();
    assert_eq!(cities, vec![Value::from("Lyon")]);
    assert_eq!(by_name(&rows, "bob").get_path("addresses.0.city"), Some(&Value::from("Rome")));
}

#[tokio::test]
async fn test_many_to_many_inlines_pivot_columns() {
    let state = seed().await;
    let users = state.select("user").unwrap();
    let ann = users
        .find(2, &QueryDescriptor::new().with("friends", With::new()))
        .await
        .unwrap();
    let friends = ann.get("friends").and_then(Value::as_list).unwrap();
    assert_eq!(friends.len(), 2);
    assert_eq!(ann.get_path("friends.0.name"), Some(&Value::from("bob")));
    assert_eq!(ann.get_path("friends.0.type"), Some(&Value::from("school")));
    assert_eq!(ann.get_path("friends.1.name"), Some(&Value::from("cy")));
    assert_eq!(ann.get_path("friends.1.type"), Some(&Value::from("work")));
    // The related row keeps its own id rather than the pivot's.
    assert_eq!(ann.get_path("friends.1.id"), Some(&Value::Int(4)));

    let mom = users
        .find(1, &QueryDescriptor::new().with("friends", With::new()))
        .await
        .unwrap();
    assert_eq!(mom.get("friends"), Some(&Value::List(vec![])));
}

#[tokio::test]
async fn test_relation_alias_and_ignored_withs() {
    let state = seed().await;
    let q = QueryDescriptor::model("user")
        .with("mom", With::relation("mother"))
        .with("ghost", With::new());
    let rows = state.query().run(&q).await.unwrap();
    assert_eq!(by_name(&rows, "ann").get_path("mom.name"), Some(&Value::from("mom")));
    assert!(!by_name(&rows, "cy").contains_key("mom"));
    assert!(rows.iter().all(|r| !r.contains_key("ghost")));
}

#[tokio::test]
async fn test_with_name_colliding_with_column_is_rejected() {
    let state = seed().await;
    let q = QueryDescriptor::model("user").with("name", With::relation("manu"));
    assert!(matches!(state.query().run(&q).await, Err(ModelError::Schema(_))));
}

#[tokio::test]
async fn test_relation_cycle_is_detected() {
    let state = setup().await;
    let nodes = state.select("node").unwrap();
    nodes.create(rec(serde_json::json!({"label": "root"}))).await.unwrap();
    nodes
        .create(rec(serde_json::json!({"label": "leaf", "parent_id": 1})))
        .await
        .unwrap();

    let err = nodes
        .get(&QueryDescriptor::new().with("parent", With::new()))
        .await
        .unwrap_err();
    let ModelError::RelationCycle { chain } = err else {
        panic!("expected a relation cycle, got {:?}", err);
    };
    assert_eq!(chain, vec!["node.parent", "node.parent"]);
}

#[tokio::test]
async fn test_paginate_windows() {
    let state = seed().await;
    let users = state.select("user").unwrap();
    let q = QueryDescriptor::new()
        .filter("name", Operator::Ne, "cy")
        .order_by("id", Direction::Asc);

    let first = users.paginate(&q, 1, 2).await.unwrap();
    assert_eq!((first.total, first.page, first.next, first.prev), (3, 1, 2, -1));
    assert_eq!(first.pages, 2);
    assert_eq!(first.data.len(), 2);

    let second = users.paginate(&q, 2, 2).await.unwrap();
    assert_eq!((second.total, second.next, second.prev), (3, -1, 1));
    assert_eq!(second.data.len(), 1);
    assert_eq!(second.data[0].get("name"), Some(&Value::from("bob")));

    let defaults = users.search(&q, 0, 0).await.unwrap();
    assert_eq!((defaults.page, defaults.pagesize, defaults.next), (1, 15, -1));
}

#[tokio::test]
async fn test_paginate_past_the_end_is_empty() {
    let state = seed().await;
    let users = state.select("user").unwrap();
    let all = QueryDescriptor::new();

    let far = users.paginate(&all, u64::MAX, 15).await.unwrap();
    assert_eq!(far.total, 4);
    assert!(far.data.is_empty());
    assert_eq!((far.next, far.prev), (-1, i64::MAX));

    let wide = users.paginate(&all, 3, u64::MAX).await.unwrap();
    assert!(wide.data.is_empty());

    let beyond = users.paginate(&all, 9, 2).await.unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!((beyond.next, beyond.prev), (-1, 8));
}

#[tokio::test]
async fn test_filter_groups_fold_left_to_right() {
    let state = seed().await;
    let users = state.select("user").unwrap();
    // status = enabled AND (name LIKE 'a%' OR name = 'bob')
    let q = QueryDescriptor::new()
        .filter("status", Operator::Eq, "enabled")
        .push(Where::group(vec![
            Where::leaf("name", Operator::Like, "a%"),
            Where::leaf("name", Operator::Eq, "bob").or(),
        ]))
        .order_by("name", Direction::Asc);
    let names: Vec<_> = users
        .get(&q)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.get("name").cloned())
        .collect();
    assert_eq!(names, vec![Value::from("ann"), Value::from("bob")]);

    let parsed: QueryDescriptor = serde_json::from_value(serde_json::json!({
        "wheres": [
            {"column": "mother_id", "op": "null"},
            {"method": "orwhere", "column": "manu_id", "op": "in", "value": [2]}
        ]
    }))
    .unwrap();
    assert_eq!(users.count(&parsed).await.unwrap(), 3);
}
