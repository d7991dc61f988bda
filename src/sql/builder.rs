//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and DDL for PostgreSQL.
//! Identifiers come from model metadata only and are always quoted; values are parameters.

use crate::config::ColumnKind;
use crate::store::{Clause, ColumnDef, Condition, Operator, SelectQuery, TableDef, TableDiff, TableSchema};
use crate::value::Value;

/// PostgreSQL caps bind parameters per statement at u16::MAX.
pub const MAX_PARAMS: usize = 65_535;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Schema-qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push `v` and return its placeholder, cast to the column's type when known.
    fn placeholder(&mut self, table: &TableSchema, column: &str, v: Value) -> String {
        let n = self.push_param(v);
        match table.kind(column).map(param_cast) {
            Some(cast) => format!("${}::{}", n, cast),
            None => format!("${}", n),
        }
    }
}

/// Cast applied to a parameter bound against a column of `kind`. Textual kinds cast to
/// `text`, so a number compared with a string column is converted instead of rejected.
pub fn param_cast(kind: &ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Id | ColumnKind::BigInteger => "bigint",
        ColumnKind::SmallInteger => "smallint",
        ColumnKind::Integer => "integer",
        ColumnKind::Float => "real",
        ColumnKind::Double => "double precision",
        ColumnKind::Decimal { .. } => "numeric",
        ColumnKind::Boolean => "boolean",
        ColumnKind::Json => "jsonb",
        ColumnKind::Date => "date",
        ColumnKind::DateTime => "timestamp",
        ColumnKind::Timestamp => "timestamptz",
        ColumnKind::Time => "time",
        ColumnKind::Uuid => "uuid",
        ColumnKind::String { .. }
        | ColumnKind::Char { .. }
        | ColumnKind::Text
        | ColumnKind::Enum
        | ColumnKind::Password => "text",
    }
}

/// DDL type for `kind`, and the matching `information_schema.columns.data_type`.
pub fn ddl_type(kind: &ColumnKind) -> (String, &'static str) {
    match kind {
        ColumnKind::Id => ("BIGSERIAL".into(), "bigint"),
        ColumnKind::String { length } => (format!("VARCHAR({})", length), "character varying"),
        ColumnKind::Char { length } => (format!("CHAR({})", length), "character"),
        ColumnKind::Text => ("TEXT".into(), "text"),
        ColumnKind::SmallInteger => ("SMALLINT".into(), "smallint"),
        ColumnKind::Integer => ("INTEGER".into(), "integer"),
        ColumnKind::BigInteger => ("BIGINT".into(), "bigint"),
        ColumnKind::Float => ("REAL".into(), "real"),
        ColumnKind::Double => ("DOUBLE PRECISION".into(), "double precision"),
        ColumnKind::Decimal { precision, scale } => (format!("NUMERIC({},{})", precision, scale), "numeric"),
        ColumnKind::Boolean => ("BOOLEAN".into(), "boolean"),
        ColumnKind::Json => ("JSONB".into(), "jsonb"),
        ColumnKind::Date => ("DATE".into(), "date"),
        ColumnKind::DateTime => ("TIMESTAMP".into(), "timestamp without time zone"),
        ColumnKind::Timestamp => ("TIMESTAMPTZ".into(), "timestamp with time zone"),
        ColumnKind::Time => ("TIME".into(), "time without time zone"),
        ColumnKind::Uuid => ("UUID".into(), "uuid"),
        ColumnKind::Enum | ColumnKind::Password => ("VARCHAR(255)".into(), "character varying"),
    }
}

/// SQL literal for a column default.
pub fn default_literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".into(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.into(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::List(_) | Value::Map(_) => {
            let json: serde_json::Value = v.clone().into();
            format!("'{}'::jsonb", json.to_string().replace('\'', "''"))
        }
    }
}

/// SELECT list: declared columns, numeric as col::text so the row decodes without a decimal type.
fn select_column_list(table: &TableSchema, columns: &[String]) -> String {
    let names: &[String] = if columns.is_empty() { &table.columns } else { columns };
    if names.is_empty() {
        return "*".into();
    }
    names
        .iter()
        .map(|c| match table.kind(c) {
            Some(ColumnKind::Decimal { .. }) => format!("{}::text AS {}", quoted(c), quoted(c)),
            _ => quoted(c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_clauses(q: &mut QueryBuf, table: &TableSchema, clauses: &[Clause]) -> Option<String> {
    let mut out: Option<String> = None;
    for clause in clauses {
        let Some(part) = render_condition(q, table, &clause.cond) else {
            continue;
        };
        out = Some(match out {
            None => part,
            // Wrap the accumulated left side so the chain folds left to right.
            Some(prev) => format!("({}) {} {}", prev, clause.conj.sql(), part),
        });
    }
    out
}

fn render_condition(q: &mut QueryBuf, table: &TableSchema, cond: &Condition) -> Option<String> {
    match cond {
        Condition::Group(inner) => render_clauses(q, table, inner).map(|s| format!("({})", s)),
        Condition::Compare { column, op, value } => {
            let col = quoted(column);
            Some(match op {
                Operator::Null | Operator::NotNull => format!("{} {}", col, op.sql()),
                Operator::Eq if value.is_null() => format!("{} IS NULL", col),
                Operator::Ne if value.is_null() => format!("{} IS NOT NULL", col),
                Operator::Like => {
                    let n = q.push_param(Value::String(value.to_string()));
                    format!("{}::text {} ${}", col, op.sql(), n)
                }
                Operator::In => {
                    let items: Vec<Value> = match value {
                        Value::List(items) => items.clone(),
                        other => vec![other.clone()],
                    };
                    if items.is_empty() {
                        return Some("1 = 0".into());
                    }
                    let placeholders: Vec<String> =
                        items.into_iter().map(|v| q.placeholder(table, column, v)).collect();
                    format!("{} IN ({})", col, placeholders.join(", "))
                }
                _ => {
                    let ph = q.placeholder(table, column, value.clone());
                    format!("{} {} {}", col, op.sql(), ph)
                }
            })
        }
    }
}

fn where_clause(q: &mut QueryBuf, table: &TableSchema, filter: &[Clause]) -> String {
    render_clauses(q, table, filter)
        .map(|w| format!(" WHERE {}", w))
        .unwrap_or_default()
}

pub fn select(schema: &str, table: &TableSchema, query: &SelectQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(table, &query.columns);
    let where_clause = where_clause(&mut q, table, &query.filter);
    let order_clause = if !query.orders.is_empty() {
        let parts: Vec<String> = query
            .orders
            .iter()
            .map(|(c, d)| format!("{} {}", quoted(c), d.sql()))
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    } else if let Some(pk) = table.primary_key.as_deref().filter(|_| !table.columns.is_empty()) {
        format!(" ORDER BY {}", quoted(pk))
    } else {
        String::new()
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        cols,
        qualified_table(schema, &table.name),
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

pub fn count(schema: &str, table: &TableSchema, filter: &[Clause]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(&mut q, table, filter);
    q.sql = format!(
        "SELECT COUNT(*) AS total FROM {}{}",
        qualified_table(schema, &table.name),
        where_clause
    );
    q
}

/// INSERT one row, returning the primary key.
pub fn insert(schema: &str, table: &TableSchema, row: &crate::value::Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let target = qualified_table(schema, &table.name);
    let returning = table
        .primary_key
        .as_deref()
        .map(|pk| format!(" RETURNING {}", quoted(pk)))
        .unwrap_or_default();
    if row.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES{}", target, returning);
        return q;
    }
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (name, val) in row {
        cols.push(quoted(name));
        placeholders.push(q.placeholder(table, name, val.clone()));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){}",
        target,
        cols.join(", "),
        placeholders.join(", "),
        returning
    );
    q
}

/// Multi-row INSERT. Callers keep `rows.len() * columns.len()` under `MAX_PARAMS`.
pub fn insert_many(schema: &str, table: &TableSchema, columns: &[String], rows: &[Vec<Value>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let phs: Vec<String> = columns
            .iter()
            .zip(row.iter())
            .map(|(c, v)| q.placeholder(table, c, v.clone()))
            .collect();
        tuples.push(format!("({})", phs.join(", ")));
    }
    let cols: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified_table(schema, &table.name),
        cols.join(", "),
        tuples.join(", ")
    );
    q
}

pub fn update(schema: &str, table: &TableSchema, filter: &[Clause], values: &crate::value::Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (name, val) in values {
        let ph = q.placeholder(table, name, val.clone());
        sets.push(format!("{} = {}", quoted(name), ph));
    }
    let where_clause = where_clause(&mut q, table, filter);
    q.sql = format!(
        "UPDATE {} SET {}{}",
        qualified_table(schema, &table.name),
        sets.join(", "),
        where_clause
    );
    q
}

pub fn delete(schema: &str, table: &TableSchema, filter: &[Clause]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = where_clause(&mut q, table, filter);
    q.sql = format!("DELETE FROM {}{}", qualified_table(schema, &table.name), where_clause);
    q
}

fn column_ddl(c: &ColumnDef) -> String {
    let (ty, _) = ddl_type(&c.kind);
    let mut s = format!("{} {}", quoted(&c.name), ty);
    if c.primary {
        s.push_str(" PRIMARY KEY");
    } else {
        if !c.nullable {
            s.push_str(" NOT NULL");
        }
        if c.unique {
            s.push_str(" UNIQUE");
        }
    }
    if let Some(d) = &c.default {
        s.push_str(" DEFAULT ");
        s.push_str(&default_literal(d));
    }
    s
}

fn index_name(table: &str, column: &str) -> String {
    quoted(&format!("{}_{}_index", table, column))
}

/// CREATE TABLE plus one CREATE INDEX per indexed column, and the table comment.
pub fn create_table(schema: &str, def: &TableDef) -> Vec<String> {
    let target = qualified_table(schema, &def.name);
    let cols: Vec<String> = def.columns.iter().map(column_ddl).collect();
    let mut out = vec![format!("CREATE TABLE IF NOT EXISTS {} ({})", target, cols.join(", "))];
    for c in def.columns.iter().filter(|c| c.index && !c.primary && !c.unique) {
        out.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            index_name(&def.name, &c.name),
            target,
            quoted(&c.name)
        ));
    }
    if let Some(comment) = &def.comment {
        out.push(format!("COMMENT ON TABLE {} IS {}", target, default_literal(&Value::String(comment.clone()))));
    }
    out
}

/// ALTER TABLE statements for a diff: ADD COLUMN for new columns, type and null changes for drifted ones.
pub fn alter_table(schema: &str, table: &str, diff: &TableDiff) -> Vec<String> {
    let target = qualified_table(schema, table);
    let mut out = Vec::new();
    for c in &diff.add {
        out.push(format!("ALTER TABLE {} ADD COLUMN IF NOT EXISTS {}", target, column_ddl(c)));
        if c.index && !c.unique {
            out.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                index_name(table, &c.name),
                target,
                quoted(&c.name)
            ));
        }
    }
    for c in &diff.change {
        let col = quoted(&c.name);
        let ty = match &c.kind {
            ColumnKind::Id => "BIGINT".to_string(),
            other => ddl_type(other).0,
        };
        // An explicit cast to a bounded character type truncates; the implicit one rejects long values.
        if c.kind.max_length().is_some() {
            out.push(format!("ALTER TABLE {} ALTER COLUMN {} TYPE {}", target, col, ty));
        } else {
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
                target, col, ty, col, ty
            ));
        }
        let null = if c.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        out.push(format!("ALTER TABLE {} ALTER COLUMN {} {}", target, col, null));
    }
    out
}

pub fn drop_table_if_exists(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_table(schema, table))
}
