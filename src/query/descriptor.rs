//! Query descriptor: the declarative fetch request. Deserializes from the JSON shape
//! `{ "select": [], "wheres": [], "orders": [], "limit": n, "withs": { name: { "query": {...} } } }`.

pub use crate::store::{Conjunction, Direction, Operator};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One filter node plus the conjunction joining it to the nodes before it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Where {
    #[serde(default)]
    pub method: Conjunction,
    #[serde(flatten)]
    pub node: WhereNode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereNode {
    Group {
        wheres: Vec<Where>,
    },
    Leaf {
        column: String,
        #[serde(default)]
        op: Operator,
        #[serde(default)]
        value: Value,
    },
}

impl Where {
    pub fn leaf(column: &str, op: Operator, value: impl Into<Value>) -> Self {
        Where {
            method: Conjunction::And,
            node: WhereNode::Leaf {
                column: column.to_string(),
                op,
                value: value.into(),
            },
        }
    }

    pub fn group(wheres: Vec<Where>) -> Self {
        Where {
            method: Conjunction::And,
            node: WhereNode::Group { wheres },
        }
    }

    /// Join with OR instead of AND.
    pub fn or(mut self) -> Self {
        self.method = Conjunction::Or;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Eager-load request. `relation` defaults to the key the request is stored under.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct With {
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub query: Option<QueryDescriptor>,
}

impl With {
    pub fn new() -> Self {
        With::default()
    }

    pub fn relation(name: &str) -> Self {
        With {
            relation: Some(name.to_string()),
            query: None,
        }
    }

    pub fn query(mut self, query: QueryDescriptor) -> Self {
        self.query = Some(query);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(default)]
    pub model: Option<String>,
    /// Empty selects every column.
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub wheres: Vec<Where>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub withs: BTreeMap<String, With>,
    /// Include soft-deleted rows.
    #[serde(default)]
    pub with_trashed: bool,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        QueryDescriptor::default()
    }

    pub fn model(name: &str) -> Self {
        QueryDescriptor {
            model: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.wheres.push(Where::leaf(column, op, value));
        self
    }

    pub fn or_filter(mut self, column: &str, op: Operator, value: impl Into<Value>) -> Self {
        self.wheres.push(Where::leaf(column, op, value).or());
        self
    }

    pub fn push(mut self, node: Where) -> Self {
        self.wheres.push(node);
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.orders.push(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn with(mut self, name: &str, with: With) -> Self {
        self.withs.insert(name.to_string(), with);
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.with_trashed = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_groups_and_withs() {
        let q: QueryDescriptor = serde_json::from_str(
            r#"{
                "select": ["id", "name"],
                "wheres": [
                    {"column": "status", "value": "active"},
                    {"method": "orwhere", "wheres": [
                        {"column": "balance", "op": "gt", "value": 10},
                        {"column": "name", "op": "like", "value": "a%"}
                    ]}
                ],
                "orders": [{"column": "id", "direction": "desc"}],
                "limit": 5,
                "withs": {"addresses": {"query": {"select": ["city"]}}, "mom": {"relation": "mother"}}
            }"#,
        )
        .unwrap();
        assert_eq!(q.wheres.len(), 2);
        assert_eq!(q.wheres[0], Where::leaf("status", Operator::Eq, "active"));
        match &q.wheres[1] {
            Where {
                method: Conjunction::Or,
                node: WhereNode::Group { wheres },
            } => assert_eq!(wheres[0], Where::leaf("balance", Operator::Gt, 10)),
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(q.orders[0].direction, Direction::Desc);
        assert_eq!(q.withs["mom"].relation.as_deref(), Some("mother"));
        assert_eq!(q.withs["addresses"].query.as_ref().unwrap().select, vec!["city"]);
    }

    #[test]
    fn operator_symbols_are_accepted() {
        let w: Where = serde_json::from_str(r#"{"column":"age","op":">=","value":3}"#).unwrap();
        assert_eq!(w, Where::leaf("age", Operator::Ge, 3));
    }
}
