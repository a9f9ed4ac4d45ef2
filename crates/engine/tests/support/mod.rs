#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde_json::{Map, Value, json};
use tower::ServiceExt;

use dbconn_drivers::{
    Backend, BackendKind, CollectionStats, DocumentBackend, DocumentConnectOptions,
    DocumentWriteSummary, DriverError, DriverResult, ResultSet, Row, RowsAffected, SchemaScope,
    SqlConnectOptions, normalize,
};
use dbconn_translator::{DocumentRead, DocumentWrite, Statement};

pub const UNREACHABLE_HOST: &str = "unreachable.invalid";
pub const BROKEN_INTROSPECTION_DB: &str = "no_introspection";
pub const FAILING_TABLE: &str = "missing_table";
pub const WRONG_PASSWORD: &str = "wrong";

/// In-memory stand-in for MySQL. Understands just enough SQL to keep rows
/// per table and answer the introspection queries.
pub struct FakeSql {
    pub database: String,
    statements: Mutex<Vec<Statement>>,
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    alive: AtomicBool,
}

impl FakeSql {
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.statements.lock().unwrap().last().map(|s| s.sql.clone())
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    fn record(&self, statement: &Statement) -> DriverResult<()> {
        self.statements.lock().unwrap().push(statement.clone());
        if statement.sql.contains(FAILING_TABLE) {
            return Err(DriverError::Other(format!(
                "Table '{}.{}' doesn't exist",
                self.database, FAILING_TABLE
            )));
        }
        Ok(())
    }
}

fn first_ident(sql: &str) -> Option<String> {
    let start = sql.find('`')? + 1;
    let end = start + sql[start..].find('`')?;
    Some(sql[start..end].to_string())
}

fn one_row(key: &str, value: Value) -> ResultSet {
    let mut row = Map::new();
    row.insert(key.to_string(), value);
    vec![row]
}

/// `WHERE id = N`, the only condition the fake evaluates.
fn id_condition(sql: &str) -> Option<i64> {
    let (_, cond) = sql.split_once(" WHERE ")?;
    let cond = cond.split(" LIMIT ").next()?;
    let (lhs, rhs) = cond.split_once('=')?;
    if lhs.trim().trim_matches('`') != "id" {
        return None;
    }
    rhs.trim().parse().ok()
}

#[async_trait]
impl Backend for FakeSql {
    type Config = SqlConnectOptions;
    type Read = Statement;
    type Write = Statement;
    type Outcome = RowsAffected;
    type Identifier = u64;

    const KIND: BackendKind = BackendKind::Relational;

    async fn connect(config: &SqlConnectOptions) -> DriverResult<Self> {
        if config.host == UNREACHABLE_HOST {
            return Err(DriverError::Other(format!(
                "Can't connect to MySQL server on '{}:{}'",
                config.host, config.port
            )));
        }
        Ok(Self {
            database: config.database.clone(),
            statements: Mutex::new(Vec::new()),
            tables: Mutex::new(BTreeMap::new()),
            alive: AtomicBool::new(true),
        })
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn execute_read(&self, statement: Statement) -> DriverResult<ResultSet> {
        self.record(&statement)?;
        let sql = statement.sql.as_str();

        if sql.starts_with("SELECT DATABASE()")
            || sql.starts_with("SELECT USER()")
            || sql.starts_with("SELECT VERSION()")
        {
            if self.database == BROKEN_INTROSPECTION_DB {
                return Err(DriverError::Other("You have an error in your SQL syntax".into()));
            }
            return Ok(if sql.starts_with("SELECT DATABASE()") {
                one_row("current_db", json!(self.database))
            } else if sql.starts_with("SELECT USER()") {
                one_row("current_user", json!("root@localhost"))
            } else {
                one_row("version", json!("8.0.36"))
            });
        }
        if sql == "SHOW TABLES" {
            let tables = self.tables.lock().unwrap();
            let key = format!("Tables_in_{}", self.database);
            return Ok(tables
                .keys()
                .flat_map(|name| one_row(&key, json!(name)))
                .collect());
        }
        if sql == "SHOW DATABASES" {
            return Ok(["information_schema", self.database.as_str()]
                .into_iter()
                .flat_map(|name| one_row("Database", json!(name)))
                .collect());
        }
        if sql.starts_with("DESCRIBE") {
            let mut field = Map::new();
            field.insert("Field".into(), json!("id"));
            field.insert("Type".into(), json!("int"));
            field.insert("Null".into(), json!("NO"));
            field.insert("Key".into(), json!("PRI"));
            return Ok(vec![field]);
        }

        let table = first_ident(sql.split(" FROM ").nth(1).unwrap_or_default()).unwrap_or_default();
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(&table).cloned().unwrap_or_default();
        if sql.starts_with("SELECT COUNT(*)") {
            return Ok(one_row("row_count", json!(rows.len())));
        }
        let wanted = id_condition(sql);
        Ok(rows
            .into_iter()
            .filter(|row| wanted.is_none_or(|id| row.get("id") == Some(&json!(id))))
            .collect())
    }

    async fn execute_write(&self, statement: Statement) -> DriverResult<RowsAffected> {
        self.record(&statement)?;
        let sql = statement.sql.as_str();
        let mut tables = self.tables.lock().unwrap();

        if sql.starts_with("CREATE TABLE") {
            let table = first_ident(sql).unwrap_or_default();
            tables.entry(table).or_default();
            return Ok(RowsAffected::default());
        }
        if sql.starts_with("INSERT INTO") {
            let table = first_ident(sql).unwrap_or_default();
            let (_, rest) = sql.split_once(" (").unwrap_or_default();
            let columns = rest.split(')').next().unwrap_or_default();
            let rows = tables.entry(table).or_default();
            let id = rows.len() as u64 + 1;
            let mut row = Map::new();
            row.insert("id".into(), json!(id));
            for (column, value) in columns.split(", ").zip(statement.params.iter()) {
                row.insert(column.trim_matches('`').to_string(), value.clone());
            }
            rows.push(row);
            return Ok(RowsAffected {
                affected_rows: 1,
                last_insert_id: id,
            });
        }
        if sql.starts_with("DELETE FROM") {
            let table = first_ident(sql).unwrap_or_default();
            let wanted = id_condition(sql);
            let rows = tables.entry(table).or_default();
            let before = rows.len();
            rows.retain(|row| !wanted.is_none_or(|id| row.get("id") == Some(&json!(id))));
            return Ok(RowsAffected {
                affected_rows: (before - rows.len()) as u64,
                last_insert_id: 0,
            });
        }
        Ok(RowsAffected {
            affected_rows: 1,
            last_insert_id: 0,
        })
    }

    async fn describe_schema(&self, scope: SchemaScope) -> DriverResult<Vec<String>> {
        let statement = match scope {
            SchemaScope::Containers => Statement::new("SHOW TABLES"),
            SchemaScope::Databases => Statement::new("SHOW DATABASES"),
        };
        let rows = self.execute_read(statement).await?;
        Ok(normalize::first_column(rows))
    }

    fn normalize_identifier(id: u64) -> Value {
        Value::from(id)
    }
}

/// In-memory stand-in for one MongoDB collection. Filters match on
/// top-level equality only; `$set` is the only update operator.
pub struct FakeMongo {
    pub database: String,
    pub collection: String,
    docs: Mutex<Vec<Document>>,
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

#[async_trait]
impl Backend for FakeMongo {
    type Config = DocumentConnectOptions;
    type Read = DocumentRead;
    type Write = DocumentWrite;
    type Outcome = DocumentWriteSummary;
    type Identifier = Bson;

    const KIND: BackendKind = BackendKind::Document;

    async fn connect(config: &DocumentConnectOptions) -> DriverResult<Self> {
        if config.password == WRONG_PASSWORD {
            return Err(DriverError::Other("bad auth : authentication failed".into()));
        }
        Ok(Self {
            database: config.database.clone(),
            collection: config.collection.clone(),
            docs: Mutex::new(Vec::new()),
        })
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn execute_read(&self, query: DocumentRead) -> DriverResult<ResultSet> {
        let docs = self.docs.lock().unwrap();
        let found: Vec<Document> = match query {
            DocumentRead::Find { filter, limit } => docs
                .iter()
                .filter(|doc| matches(doc, &filter))
                .take(if limit > 0 { limit as usize } else { usize::MAX })
                .cloned()
                .collect(),
            DocumentRead::Aggregate { pipeline } => {
                let stage = pipeline
                    .iter()
                    .find_map(|stage| stage.get_document("$match").ok())
                    .cloned()
                    .unwrap_or_default();
                docs.iter().filter(|doc| matches(doc, &stage)).cloned().collect()
            }
        };
        Ok(normalize::documents(found))
    }

    async fn execute_write(&self, query: DocumentWrite) -> DriverResult<DocumentWriteSummary> {
        let mut docs = self.docs.lock().unwrap();
        match query {
            DocumentWrite::Insert { mut document } => {
                if !document.contains_key("_id") {
                    document.insert("_id", ObjectId::new());
                }
                let id = document.get("_id").cloned();
                docs.push(document);
                Ok(DocumentWriteSummary {
                    inserted_id: id,
                    ..Default::default()
                })
            }
            DocumentWrite::Update {
                filter,
                update,
                multiple,
            } => {
                let set = update.get_document("$set").cloned().unwrap_or_default();
                let mut summary = DocumentWriteSummary::default();
                for doc in docs.iter_mut().filter(|doc| matches(doc, &filter)) {
                    summary.matched_count += 1;
                    let before = doc.clone();
                    for (key, value) in set.iter() {
                        doc.insert(key.clone(), value.clone());
                    }
                    if *doc != before {
                        summary.modified_count += 1;
                    }
                    if !multiple {
                        break;
                    }
                }
                Ok(summary)
            }
            DocumentWrite::Delete { filter, multiple } => {
                let mut deleted = 0;
                docs.retain(|doc| {
                    let hit = matches(doc, &filter) && (multiple || deleted == 0);
                    if hit {
                        deleted += 1;
                    }
                    !hit
                });
                Ok(DocumentWriteSummary {
                    deleted_count: deleted,
                    ..Default::default()
                })
            }
        }
    }

    async fn describe_schema(&self, scope: SchemaScope) -> DriverResult<Vec<String>> {
        Ok(match scope {
            SchemaScope::Containers => vec![self.collection.clone()],
            SchemaScope::Databases => vec!["admin".to_string(), self.database.clone()],
        })
    }

    fn normalize_identifier(id: Bson) -> Value {
        normalize::bson_value(id)
    }
}

#[async_trait]
impl DocumentBackend for FakeMongo {
    async fn collection_stats(&self) -> DriverResult<CollectionStats> {
        let count = self.docs.lock().unwrap().len();
        Ok(CollectionStats {
            count: json!(count),
            size: json!(count * 32),
            avg_obj_size: json!(if count > 0 { 32 } else { 0 }),
            storage_size: json!(4096),
            indexes: json!(1),
        })
    }
}

pub async fn send_json(
    app: &axum::Router,
    method: Method,
    uri: &str,
    payload: Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request should build");
    send(app, request).await
}

pub async fn send_raw(app: &axum::Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request should build");
    send(app, request).await
}

pub async fn send_empty(app: &axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    if body.is_empty() {
        return (status, Value::Null);
    }

    let json = serde_json::from_slice::<Value>(&body).expect("body should be valid JSON");
    (status, json)
}
