//! Typed errors and HTTP mapping for the `must_*` boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("table not found: {0}")]
    MissingTable(String),
    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },
    #[error("table already exists: {0}")]
    TableExists(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// One column that failed validation, with every rule it broke.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    pub column: String,
    pub messages: Vec<String>,
}

/// Full set of validation failures for one row.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push(&mut self, column: &str, message: String) {
        match self.fields.iter_mut().find(|f| f.column == column) {
            Some(f) => f.messages.push(message),
            None => self.fields.push(FieldError {
                column: column.to_string(),
                messages: vec![message],
            }),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }

    /// Prefix every column with the row index, for batch operations.
    pub fn at_row(mut self, index: usize) -> Self {
        for f in &mut self.fields {
            f.column = format!("{}.{}", index, f.column);
        }
        self
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.column, e.messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("parse: {0}")]
    Parse(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("model {model} has no column {column}")]
    UnknownColumn { model: String, column: String },
    #[error("validation: {0}")]
    Validation(ValidationErrors),
    #[error("row {row} has {got} values, expected {expected}")]
    Shape { row: usize, expected: usize, got: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("relation cycle: {}", .chain.join(" -> "))]
    RelationCycle { chain: Vec<String> },
    #[error("not found: {model} {id}")]
    NotFound { model: String, id: String },
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),
    #[error("hashing {model}.{column} failed: {source}")]
    Crypt {
        model: String,
        column: String,
        #[source]
        source: bcrypt::BcryptError,
    },
    #[error("migration of {table} failed: {source}")]
    Migration {
        table: String,
        #[source]
        source: StoreError,
    },
}

impl ModelError {
    /// Migration failures leave the schema in an unknown state; callers stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModelError::Migration { .. })
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ModelError::Parse(_) => (StatusCode::BAD_REQUEST, "parse_error"),
            ModelError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            ModelError::UnknownColumn { .. } => (StatusCode::BAD_REQUEST, "unknown_column"),
            ModelError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ModelError::Shape { .. } => (StatusCode::BAD_REQUEST, "shape_error"),
            ModelError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            ModelError::RelationCycle { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "relation_cycle"),
            ModelError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ModelError::ModelNotLoaded(_) => (StatusCode::INTERNAL_SERVER_ERROR, "model_not_loaded"),
            ModelError::Crypt { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "crypt_error"),
            ModelError::Migration { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "migration_error"),
        }
    }
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

/// Error raised by the `must_*` variants: a status-coded fault for the HTTP layer to render.
#[derive(Debug)]
pub struct Fault {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for Fault {}

impl From<ModelError> for Fault {
    fn from(err: ModelError) -> Self {
        let (status, code) = err.status_and_code();
        let details = match &err {
            ModelError::Validation(v) => serde_json::to_value(&v.fields).ok(),
            _ => None,
        };
        Fault {
            status,
            code,
            message: err.to_string(),
            details,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for ModelError {
    fn into_response(self) -> Response {
        Fault::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_carries_status_and_field_details() {
        let mut errors = ValidationErrors::default();
        errors.push("name", "is required".into());
        let fault = Fault::from(ModelError::Validation(errors.at_row(2)));
        assert_eq!(fault.status, StatusCode::BAD_REQUEST);
        assert_eq!(fault.code, "validation_error");
        assert_eq!(fault.details.unwrap()[0]["column"], "2.name");

        let missing = Fault::from(ModelError::NotFound {
            model: "user".into(),
            id: "9".into(),
        });
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert!(missing.details.is_none());
    }

    #[test]
    fn hash_failures_are_crypt_faults() {
        let source = bcrypt::hash("pw", 99).unwrap_err();
        let fault = Fault::from(ModelError::Crypt {
            model: "user".into(),
            column: "password".into(),
            source,
        });
        assert_eq!(fault.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fault.code, "crypt_error");
        assert!(fault.message.contains("user.password"));
    }

    #[test]
    fn only_migration_failures_are_fatal() {
        let err = ModelError::Migration {
            table: "t".into(),
            source: StoreError::MissingTable("t".into()),
        };
        assert!(err.is_fatal());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!ModelError::Parse("bad".into()).is_fatal());
    }
}
