//! The relational (MySQL) HTTP surface.
//!
//! Every handler follows the same order: session guard, payload
//! validation into a `RelationalOp`, then `execute`.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use dbconn_drivers::{SchemaScope, SqlBackend, SqlConnectOptions};
use dbconn_translator::sql::{self, DEFAULT_SELECT_LIMIT};
use dbconn_translator::{ColumnDef, Statement, StatementKind};

use crate::dispatch::Dispatcher;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::session::{Session, SessionInfo};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_DATABASE: &str = "testdb";

pub fn router<B: SqlBackend>(dispatcher: Dispatcher<B>) -> Router {
    Router::new()
        .route("/api/connect", post(connect::<B>))
        .route("/api/create-table", post(create_table::<B>))
        .route("/api/insert", post(insert::<B>))
        .route("/api/select", post(select::<B>))
        .route("/api/update", post(update::<B>))
        .route("/api/delete", post(delete::<B>))
        .route("/api/execute-query", post(execute_query::<B>))
        .route("/api/status", get(status::<B>))
        .route("/api/tables", get(tables::<B>))
        .route("/api/table-info", post(table_info::<B>))
        .route("/api/databases", get(databases::<B>))
        .with_state(dispatcher)
}

/// A validated relational request.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationalOp {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
    },
    Insert {
        table: String,
        data: Map<String, Value>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        filter: Option<String>,
        limit: u64,
    },
    Update {
        table: String,
        set: Map<String, Value>,
        filter: Option<String>,
    },
    Delete {
        table: String,
        filter: Option<String>,
    },
    ExecuteQuery {
        query: String,
    },
    TableInfo {
        table: String,
    },
    ListTables,
    ListDatabases,
}

pub trait IntoRelationalOp {
    fn into_op(self) -> ApiResult<RelationalOp>;
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty(map: Option<Map<String, Value>>) -> Option<Map<String, Value>> {
    map.filter(|m| !m.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn resolve(&self) -> ApiResult<u16> {
        let parsed = match self {
            PortValue::Number(n) => u16::try_from(*n).ok(),
            PortValue::Text(s) => s.trim().parse::<u16>().ok(),
        };
        parsed.ok_or_else(|| ApiError::validation("Port must be a valid number"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectPayload {
    pub host: Option<String>,
    pub port: Option<PortValue>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectPayload {
    /// Fill defaults. An explicitly empty username is rejected.
    pub fn into_options(self) -> ApiResult<SqlConnectOptions> {
        let username = self.username.unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        if username.is_empty() {
            return Err(ApiError::validation("Username is required"));
        }
        let port = match &self.port {
            Some(port) => port.resolve()?,
            None => DEFAULT_PORT,
        };
        Ok(SqlConnectOptions {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            username,
            password: self.password.unwrap_or_default(),
            database: self
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ColumnPayload {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub not_null: bool,
    pub default: Option<Value>,
}

impl From<ColumnPayload> for ColumnDef {
    fn from(col: ColumnPayload) -> Self {
        ColumnDef {
            name: col.name,
            data_type: col.data_type,
            primary_key: col.primary_key,
            auto_increment: col.auto_increment,
            not_null: col.not_null,
            default: col.default,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTablePayload {
    pub table_name: Option<String>,
    pub columns: Option<Vec<ColumnPayload>>,
}

impl IntoRelationalOp for CreateTablePayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        match (present(self.table_name), self.columns.filter(|c| !c.is_empty())) {
            (Some(table), Some(columns)) => Ok(RelationalOp::CreateTable {
                table,
                columns: columns.into_iter().map(ColumnDef::from).collect(),
            }),
            _ => Err(ApiError::validation("Table name and columns are required")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InsertPayload {
    pub table: Option<String>,
    pub data: Option<Map<String, Value>>,
}

impl IntoRelationalOp for InsertPayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        match (present(self.table), non_empty(self.data)) {
            (Some(table), Some(data)) => Ok(RelationalOp::Insert { table, data }),
            _ => Err(ApiError::validation("Table name and data are required")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectPayload {
    pub table: Option<String>,
    pub columns: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub limit: Option<u64>,
}

impl IntoRelationalOp for SelectPayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        let table = present(self.table).ok_or_else(|| ApiError::validation("Table name is required"))?;
        Ok(RelationalOp::Select {
            table,
            columns: self.columns.unwrap_or_default(),
            filter: self.filter,
            limit: self.limit.unwrap_or(DEFAULT_SELECT_LIMIT),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayload {
    pub table: Option<String>,
    pub set: Option<Map<String, Value>>,
    #[serde(rename = "where")]
    pub filter: Option<String>,
}

impl IntoRelationalOp for UpdatePayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        match (present(self.table), non_empty(self.set)) {
            (Some(table), Some(set)) => Ok(RelationalOp::Update {
                table,
                set,
                filter: self.filter,
            }),
            _ => Err(ApiError::validation("Table name and SET clause are required")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeletePayload {
    pub table: Option<String>,
    #[serde(rename = "where")]
    pub filter: Option<String>,
}

impl IntoRelationalOp for DeletePayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        let table = present(self.table).ok_or_else(|| ApiError::validation("Table name is required"))?;
        Ok(RelationalOp::Delete {
            table,
            filter: self.filter,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryPayload {
    pub query: Option<String>,
}

impl IntoRelationalOp for QueryPayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        let query = present(self.query).ok_or_else(|| ApiError::validation("Query is required"))?;
        Ok(RelationalOp::ExecuteQuery { query })
    }
}

#[derive(Debug, Deserialize)]
pub struct TablePayload {
    pub table: Option<String>,
}

impl IntoRelationalOp for TablePayload {
    fn into_op(self) -> ApiResult<RelationalOp> {
        let table = present(self.table).ok_or_else(|| ApiError::validation("Table name is required"))?;
        Ok(RelationalOp::TableInfo { table })
    }
}

/// Translate, run and shape one operation.
pub async fn execute<B: SqlBackend>(session: &Session<B>, op: RelationalOp) -> ApiResult<Value> {
    match op {
        RelationalOp::CreateTable { table, columns } => {
            let statement = sql::create_table(&table, &columns)?;
            let query = statement.sql.clone();
            session.write(statement).await?;
            Ok(json!({
                "success": true,
                "message": format!("Table {table} created successfully"),
                "query": query,
            }))
        }
        RelationalOp::Insert { table, data } => {
            let outcome = session.write(sql::insert(&table, &data)?).await?;
            Ok(json!({
                "success": true,
                "message": "Record inserted successfully",
                "inserted_id": B::normalize_identifier(outcome.last_insert_id),
                "affected_rows": outcome.affected_rows,
            }))
        }
        RelationalOp::Select {
            table,
            columns,
            filter,
            limit,
        } => {
            let statement = sql::select(&table, &columns, filter.as_deref(), limit)?;
            rows_reply(session, statement).await
        }
        RelationalOp::Update { table, set, filter } => {
            let statement = sql::update(&table, &set, filter.as_deref())?;
            write_reply(session, statement, "Records updated successfully").await
        }
        RelationalOp::Delete { table, filter } => {
            let statement = sql::delete(&table, filter.as_deref())?;
            write_reply(session, statement, "Records deleted successfully").await
        }
        RelationalOp::ExecuteQuery { query } => {
            let statement = sql::raw(&query)?;
            match statement.kind() {
                StatementKind::Read => rows_reply(session, statement).await,
                StatementKind::Write => {
                    write_reply(session, statement, "Query executed successfully").await
                }
            }
        }
        RelationalOp::TableInfo { table } => {
            let columns = session.read(sql::describe_table(&table)?).await?;
            let counted = session.read(sql::count_rows(&table)?).await?;
            let row_count = counted
                .first()
                .and_then(|row| row.get("row_count").cloned())
                .unwrap_or_else(|| Value::from(0));
            Ok(json!({
                "success": true,
                "table": table,
                "columns": columns,
                "row_count": row_count,
            }))
        }
        RelationalOp::ListTables => {
            let tables = session.describe(SchemaScope::Containers).await?;
            Ok(json!({ "success": true, "tables": tables }))
        }
        RelationalOp::ListDatabases => {
            let databases = session.describe(SchemaScope::Databases).await?;
            Ok(json!({ "success": true, "databases": databases }))
        }
    }
}

async fn rows_reply<B: SqlBackend>(session: &Session<B>, statement: Statement) -> ApiResult<Value> {
    let query = statement.sql.clone();
    let records = session.read(statement).await?;
    let count = records.len();
    Ok(json!({
        "success": true,
        "records": records,
        "count": count,
        "query": query,
    }))
}

async fn write_reply<B: SqlBackend>(
    session: &Session<B>,
    statement: Statement,
    message: &str,
) -> ApiResult<Value> {
    let query = statement.sql.clone();
    let outcome = session.write(statement).await?;
    Ok(json!({
        "success": true,
        "message": message,
        "affected_rows": outcome.affected_rows,
        "query": query,
    }))
}

async fn dispatch<B, P>(
    dispatcher: &Dispatcher<B>,
    payload: Result<ApiJson<P>, ApiError>,
) -> ApiResult<Json<Value>>
where
    B: SqlBackend,
    P: IntoRelationalOp,
{
    let session = dispatcher.session().await?;
    let ApiJson(payload) = payload?;
    let op = payload.into_op()?;
    execute(&session, op).await.map(Json)
}

async fn connect<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    ApiJson(payload): ApiJson<ConnectPayload>,
) -> ApiResult<Json<Value>> {
    let options = payload.into_options()?;
    let info = SessionInfo::relational(&options.host, options.port, &options.database);
    dispatcher
        .connect(&options, info)
        .await
        .map_err(|err| ApiError::backend(format!("MySQL connection error: {err}")))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Connected successfully to MySQL database: {}", options.database),
        "host": options.host,
        "port": options.port,
        "database": options.database,
    })))
}

async fn create_table<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<CreateTablePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn insert<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<InsertPayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn select<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<SelectPayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn update<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<UpdatePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn delete<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<DeletePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn execute_query<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<QueryPayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn table_info<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<TablePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn tables<B: SqlBackend>(State(dispatcher): State<Dispatcher<B>>) -> ApiResult<Json<Value>> {
    let session = dispatcher.session().await?;
    execute(&session, RelationalOp::ListTables).await.map(Json)
}

async fn databases<B: SqlBackend>(
    State(dispatcher): State<Dispatcher<B>>,
) -> ApiResult<Json<Value>> {
    let session = dispatcher.session().await?;
    execute(&session, RelationalOp::ListDatabases).await.map(Json)
}

const UNKNOWN_DATABASE: &str = "None";
const FALLBACK_USER: &str = "Connected User";
const FALLBACK_VERSION: &str = "MariaDB/MySQL";

/// Never fails: a dead session reports disconnected, and introspection
/// errors degrade to placeholders.
async fn status<B: SqlBackend>(State(dispatcher): State<Dispatcher<B>>) -> Json<Value> {
    let Some(session) = dispatcher.sessions().current().await else {
        return Json(json!({ "connected": false }));
    };
    if !session.backend.is_alive().await {
        debug!(database = %session.info.database, "session failed liveness check");
        return Json(json!({ "connected": false }));
    }

    let (current_db, current_user, version) = match introspect(&session).await {
        Ok(found) => found,
        Err(err) => {
            debug!(error = %err, "status introspection failed, using placeholders");
            let database = if session.info.database.is_empty() {
                UNKNOWN_DATABASE.to_string()
            } else {
                session.info.database.clone()
            };
            (database, FALLBACK_USER.to_string(), FALLBACK_VERSION.to_string())
        }
    };

    Json(json!({
        "connected": true,
        "database": session.info.database,
        "current_db": current_db,
        "current_user": current_user,
        "mysql_version": version,
    }))
}

async fn introspect<B: SqlBackend>(session: &Session<B>) -> ApiResult<(String, String, String)> {
    let current_db = scalar(session, sql::current_database(), "current_db")
        .await?
        .unwrap_or_else(|| UNKNOWN_DATABASE.to_string());
    let current_user = scalar(session, sql::current_user(), "current_user")
        .await?
        .unwrap_or_else(|| "Unknown".to_string());
    let version = scalar(session, sql::server_version(), "version")
        .await?
        .unwrap_or_else(|| "Unknown".to_string());
    Ok((current_db, current_user, version))
}

async fn scalar<B: SqlBackend>(
    session: &Session<B>,
    statement: Statement,
    column: &str,
) -> ApiResult<Option<String>> {
    let rows = session.backend.execute_read(statement).await?;
    Ok(rows.first().and_then(|row| match row.get(column) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }))
}
