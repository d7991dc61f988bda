//! Input preparation shared by every write path: drop unknown columns, parse JSON text,
//! validate, hash passwords and stamp timestamps.

use super::validation::RequestValidator;
use crate::config::{Model, ColumnKind, CREATED_AT, UPDATED_AT};
use crate::error::{ModelError, Result};
use crate::value::{Record, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Write {
    Insert,
    Update,
}

pub(crate) fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

pub(crate) fn prepare(model: &Model, row: Record, cost: u32, mode: Write) -> Result<Record> {
    let mut out = Record::new();
    for (name, value) in row {
        let Some(col) = model.column(&name) else {
            tracing::warn!(model = %model.name, column = %name, "dropping unknown input column");
            continue;
        };
        let value = match (&col.kind, value) {
            (ColumnKind::Json, Value::String(text)) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(parsed) => parsed.into(),
                Err(_) => Value::String(text),
            },
            (_, v) => v,
        };
        out.insert(name, value);
    }

    if mode == Write::Insert {
        if out.get(&model.primary_key).map(Value::is_null).unwrap_or(false) {
            out.remove(&model.primary_key);
        }
        RequestValidator::validate(model, &out).map_err(ModelError::Validation)?;
    } else {
        RequestValidator::validate_partial(model, &out).map_err(ModelError::Validation)?;
    }

    for col in model.ordered_columns().filter(|c| c.is_password()) {
        if let Some(Value::String(plain)) = out.get(&col.name) {
            let hashed = bcrypt::hash(plain, cost).map_err(|source| ModelError::Crypt {
                model: model.name.clone(),
                column: col.name.clone(),
                source,
            })?;
            out.insert(col.name.clone(), hashed);
        }
    }

    if model.timestamps() {
        let stamp = now();
        if mode == Write::Insert && !out.contains_key(CREATED_AT) {
            out.insert(CREATED_AT, stamp.clone());
        }
        out.insert(UPDATED_AT, stamp);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_metadata;

    fn model() -> Model {
        let meta = parse_metadata(
            r#"{"table":{"name":"accounts"},"columns":[
                {"name":"id","type":"ID"},
                {"name":"login","type":"string"},
                {"name":"secret","type":"string","crypt":"PASSWORD"},
                {"name":"extra","type":"json"}
            ],"option":{"timestamps":true}}"#,
        )
        .unwrap();
        Model::resolve("account", "inline", meta).unwrap()
    }

    #[test]
    fn insert_prepares_every_column() {
        let m = model();
        let row: Record = [
            ("id", Value::Null),
            ("login", "ann".into()),
            ("secret", "hunter2".into()),
            ("extra", r#"{"theme":"dark"}"#.into()),
            ("bogus", Value::Int(1)),
        ]
        .into_iter()
        .collect();
        let out = prepare(&m, row, 4, Write::Insert).unwrap();
        assert!(!out.contains_key("id"));
        assert!(!out.contains_key("bogus"));
        let hashed = out.get("secret").and_then(Value::as_str).unwrap();
        assert!(bcrypt::verify("hunter2", hashed).unwrap());
        assert_eq!(out.get_path("extra.theme"), Some(&Value::from("dark")));
        assert!(out.contains_key(CREATED_AT) && out.contains_key(UPDATED_AT));
    }

    #[test]
    fn bad_hash_cost_is_a_crypt_error() {
        let m = model();
        let row: Record = [("login", "ann"), ("secret", "hunter2")].into_iter().collect();
        let err = prepare(&m, row, 99, Write::Insert).unwrap_err();
        assert!(matches!(err, ModelError::Crypt { ref column, .. } if column == "secret"));
    }

    #[test]
    fn update_only_touches_updated_at() {
        let m = model();
        let row: Record = [("login", "bob")].into_iter().collect();
        let out = prepare(&m, row, 4, Write::Update).unwrap();
        assert!(!out.contains_key(CREATED_AT));
        assert!(out.contains_key(UPDATED_AT));
    }
}
