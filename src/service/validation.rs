//! Row validation from declared column types and rules. Every failure is collected.

use crate::config::{Column, ColumnKind, Model};
use crate::error::ValidationErrors;
use crate::value::{Record, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a row about to be inserted. Required columns, and non-nullable columns
    /// without a default, must be present.
    pub fn validate(model: &Model, row: &Record) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for col in model.ordered_columns() {
            let val = row.get(&col.name).filter(|v| !v.is_null());
            match val {
                Some(v) => validate_field(col, v, &mut errors),
                None if col.is_required() => errors.push(&col.name, "is required".into()),
                None if !col.nullable && col.default.is_none() && !generated(model, col) => {
                    errors.push(&col.name, "must not be null".into())
                }
                None => {}
            }
        }
        finish(errors)
    }

    /// Validate only the columns present in `row` (updates). Required is not enforced for missing columns.
    pub fn validate_partial(model: &Model, row: &Record) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for (name, v) in row {
            let Some(col) = model.column(name) else {
                continue;
            };
            if v.is_null() {
                if col.is_required() {
                    errors.push(name, "is required".into());
                } else if !col.nullable {
                    errors.push(name, "must not be null".into());
                }
                continue;
            }
            validate_field(col, v, &mut errors);
        }
        finish(errors)
    }
}

fn finish(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Columns the engine or the store fills in on insert.
fn generated(model: &Model, col: &Column) -> bool {
    col.implicit || (col.name == model.primary_key && col.kind == ColumnKind::Id)
}

fn validate_field(col: &Column, v: &Value, errors: &mut ValidationErrors) {
    let name = col.name.as_str();
    if let Some(msg) = check_type(&col.kind, v) {
        errors.push(name, msg);
        return;
    }
    if let (Some(max), Some(s)) = (col.kind.max_length(), v.as_str()) {
        if s.chars().count() > max as usize {
            errors.push(name, format!("must be at most {} characters", max));
        }
    }
    if col.kind == ColumnKind::Enum && !col.options.is_empty() {
        if let Some(s) = v.as_str() {
            if !col.options.iter().any(|o| o == s) {
                errors.push(name, format!("must be one of: {}", col.options.join(", ")));
            }
        }
    }

    let Some(rule) = &col.rule else {
        return;
    };
    if let Some(format) = &rule.format {
        if let Some(msg) = check_format(v, format) {
            errors.push(name, msg);
        }
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            errors.push(name, format!("must be at most {} characters", max));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            errors.push(name, format!("must be at least {} characters", min));
        }
    }
    if let (Some(re), Some(s)) = (&col.pattern, v.as_str()) {
        if !re.is_match(s) {
            errors.push(name, "does not match required pattern".into());
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| v.loose_eq(a)) {
            let shown: Vec<String> = allowed.iter().take(5).map(|a| a.to_string()).collect();
            errors.push(name, format!("must be one of: {}", shown.join(", ")));
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            errors.push(name, format!("must be at least {}", min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            errors.push(name, format!("must be at most {}", max));
        }
    }
}

fn parses_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

/// Message when `v` cannot be stored in a column of `kind`.
fn check_type(kind: &ColumnKind, v: &Value) -> Option<String> {
    let ok = match kind {
        k if k.is_integer() => match v {
            Value::Int(_) => true,
            Value::Float(f) => f.fract() == 0.0,
            _ => false,
        },
        k if k.is_numeric() => matches!(v, Value::Int(_) | Value::Float(_)),
        ColumnKind::Boolean => matches!(v, Value::Bool(_)),
        ColumnKind::Json => true,
        ColumnKind::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
        ColumnKind::Date => v.as_str().map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()).unwrap_or(false),
        ColumnKind::DateTime | ColumnKind::Timestamp => v.as_str().map(parses_datetime).unwrap_or(false),
        ColumnKind::Time => v
            .as_str()
            .map(|s| NaiveTime::parse_from_str(s, "%H:%M:%S").is_ok() || NaiveTime::parse_from_str(s, "%H:%M").is_ok())
            .unwrap_or(false),
        _ => matches!(v, Value::String(_)),
    };
    if ok {
        None
    } else {
        Some(format!("expects {}, got {}", kind.name(), v.type_name()))
    }
}

fn check_format(v: &Value, format: &str) -> Option<String> {
    let s = v.as_str()?;
    let ok = match format.to_lowercase().as_str() {
        "email" => {
            let mut parts = s.splitn(2, '@');
            let local = parts.next().unwrap_or("");
            let domain = parts.next().unwrap_or("");
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        "mobile" => {
            let digits = s.strip_prefix('+').unwrap_or(s);
            (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        _ => true,
    };
    if ok {
        None
    } else {
        Some(format!("must be a valid {}", format.to_lowercase()))
    }
}
