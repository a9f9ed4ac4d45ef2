//! MySQL statement construction.
//!
//! Identifiers are always backtick-quoted; values travel out-of-band as
//! positional `?` parameters. Two inputs are deliberately interpolated
//! verbatim: WHERE fragments and DDL column types/defaults. Callers of this
//! module are trusted with those.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{TranslateError, TranslateResult};

pub const DEFAULT_SELECT_LIMIT: u64 = 100;

/// A statement ready for the driver: SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn with_params(sql: String, params: Vec<Value>) -> Self {
        debug!(%sql, params = params.len(), "built statement");
        Self { sql, params }
    }

    pub fn kind(&self) -> StatementKind {
        StatementKind::classify(&self.sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    /// Only statements starting with `SELECT` (after trimming, any case) return rows.
    pub fn classify(sql: &str) -> Self {
        if sql.trim_start().to_ascii_uppercase().starts_with("SELECT") {
            StatementKind::Read
        } else {
            StatementKind::Write
        }
    }
}

/// One column of a `CREATE TABLE` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub default: Option<Value>,
}

impl ColumnDef {
    fn to_sql(&self) -> TranslateResult<String> {
        if self.data_type.trim().is_empty() {
            return Err(TranslateError::Empty("column type"));
        }
        let mut def = format!("{} {}", quote_ident(&self.name, "column")?, self.data_type);
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if self.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        if self.not_null {
            def.push_str(" NOT NULL");
        }
        if let Some(literal) = self.default.as_ref().and_then(default_literal) {
            def.push_str(" DEFAULT ");
            def.push_str(&literal);
        }
        Ok(def)
    }
}

fn default_literal(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Quote a MySQL identifier, doubling any embedded backtick.
///
/// `kind` names the identifier in the error message ("table", "column").
pub fn quote_ident(name: &str, kind: &'static str) -> TranslateResult<String> {
    if name.trim().is_empty() {
        return Err(TranslateError::EmptyIdentifier(kind));
    }
    if name.contains('\0') {
        return Err(TranslateError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

fn condition(filter: Option<&str>) -> Option<&str> {
    filter.map(str::trim).filter(|f| !f.is_empty())
}

fn require_condition(filter: Option<&str>) -> TranslateResult<&str> {
    condition(filter).ok_or(TranslateError::MissingCondition)
}

pub fn create_table(table: &str, columns: &[ColumnDef]) -> TranslateResult<Statement> {
    if columns.is_empty() {
        return Err(TranslateError::Empty("columns"));
    }
    let defs = columns
        .iter()
        .map(ColumnDef::to_sql)
        .collect::<TranslateResult<Vec<_>>>()?;
    let sql = format!(
        "CREATE TABLE {} ({})",
        quote_ident(table, "table")?,
        defs.join(", ")
    );
    Ok(Statement::with_params(sql, Vec::new()))
}

pub fn insert(table: &str, data: &Map<String, Value>) -> TranslateResult<Statement> {
    if data.is_empty() {
        return Err(TranslateError::Empty("data"));
    }
    let columns = data
        .keys()
        .map(|c| quote_ident(c, "column"))
        .collect::<TranslateResult<Vec<_>>>()?;
    let placeholders = vec!["?"; data.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table, "table")?,
        columns.join(", "),
        placeholders
    );
    Ok(Statement::with_params(sql, data.values().cloned().collect()))
}

/// `SELECT` with an optional free-text WHERE fragment. An empty column list
/// selects `*`; a literal `*` entry is never quoted.
pub fn select(
    table: &str,
    columns: &[String],
    filter: Option<&str>,
    limit: u64,
) -> TranslateResult<Statement> {
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| {
                if c == "*" {
                    Ok(c.clone())
                } else {
                    quote_ident(c, "column")
                }
            })
            .collect::<TranslateResult<Vec<_>>>()?
            .join(", ")
    };
    let mut sql = format!("SELECT {} FROM {}", projection, quote_ident(table, "table")?);
    if let Some(filter) = condition(filter) {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql.push_str(&format!(" LIMIT {}", limit));
    Ok(Statement::with_params(sql, Vec::new()))
}

pub fn update(
    table: &str,
    set: &Map<String, Value>,
    filter: Option<&str>,
) -> TranslateResult<Statement> {
    if set.is_empty() {
        return Err(TranslateError::Empty("SET clause"));
    }
    let filter = require_condition(filter)?;
    let assignments = set
        .keys()
        .map(|c| quote_ident(c, "column").map(|q| format!("{} = ?", q)))
        .collect::<TranslateResult<Vec<_>>>()?;
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table, "table")?,
        assignments.join(", "),
        filter
    );
    Ok(Statement::with_params(sql, set.values().cloned().collect()))
}

pub fn delete(table: &str, filter: Option<&str>) -> TranslateResult<Statement> {
    let filter = require_condition(filter)?;
    let sql = format!("DELETE FROM {} WHERE {}", quote_ident(table, "table")?, filter);
    Ok(Statement::with_params(sql, Vec::new()))
}

/// Raw statement, run verbatim.
pub fn raw(query: &str) -> TranslateResult<Statement> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TranslateError::Empty("query"));
    }
    Ok(Statement::new(query))
}

pub fn describe_table(table: &str) -> TranslateResult<Statement> {
    Ok(Statement::new(format!("DESCRIBE {}", quote_ident(table, "table")?)))
}

pub fn count_rows(table: &str) -> TranslateResult<Statement> {
    Ok(Statement::new(format!(
        "SELECT COUNT(*) AS row_count FROM {}",
        quote_ident(table, "table")?
    )))
}

pub fn list_tables() -> Statement {
    Statement::new("SHOW TABLES")
}

pub fn list_databases() -> Statement {
    Statement::new("SHOW DATABASES")
}

// Session introspection, one query each so a failure in one is easy to spot.
pub fn current_database() -> Statement {
    Statement::new("SELECT DATABASE() AS current_db")
}

pub fn current_user() -> Statement {
    Statement::new("SELECT USER() AS `current_user`")
}

pub fn server_version() -> Statement {
    Statement::new("SELECT VERSION() AS version")
}
