use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlQueryResult};
use sqlx::{Connection, Executor, Pool};
use tracing::{debug, info};

use dbconn_translator::Statement;

use crate::error::DriverResult;
use crate::normalize;
use crate::{Backend, BackendKind, ResultSet, RowsAffected, SchemaScope, SqlConnectOptions};

/// MySQL / MariaDB over sqlx.
///
/// The pool is capped at one connection that never idles out, so it behaves
/// as a single session: `USE db` and other session state persist between
/// requests.
pub struct MySqlBackend {
    pool: Pool<MySql>,
}

impl MySqlBackend {
    pub fn pool(&self) -> &Pool<MySql> {
        &self.pool
    }
}

#[async_trait]
impl Backend for MySqlBackend {
    type Config = SqlConnectOptions;
    type Read = Statement;
    type Write = Statement;
    type Outcome = RowsAffected;
    type Identifier = u64;

    const KIND: BackendKind = BackendKind::Relational;

    async fn connect(config: &SqlConnectOptions) -> DriverResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password);
        if !config.database.is_empty() {
            options = options.database(&config.database);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        info!(host = %config.host, port = config.port, database = %config.database, "mysql session opened");
        Ok(Self { pool })
    }

    async fn is_alive(&self) -> bool {
        match self.pool.acquire().await {
            Ok(mut conn) => conn.ping().await.is_ok(),
            Err(_) => false,
        }
    }

    async fn execute_read(&self, statement: Statement) -> DriverResult<ResultSet> {
        let mut conn = self.pool.acquire().await?;
        let rows = if statement.params.is_empty() {
            (&mut *conn).fetch_all(statement.sql.as_str()).await?
        } else {
            bind_all(sqlx::query(&statement.sql), &statement.params)
                .fetch_all(&mut *conn)
                .await?
        };
        debug!(sql = %statement.sql, rows = rows.len(), "read");
        Ok(rows.iter().map(normalize::mysql_row).collect())
    }

    async fn execute_write(&self, statement: Statement) -> DriverResult<RowsAffected> {
        let mut tx = self.pool.begin().await?;
        let result: MySqlQueryResult = if statement.params.is_empty() {
            (&mut *tx).execute(statement.sql.as_str()).await?
        } else {
            bind_all(sqlx::query(&statement.sql), &statement.params)
                .execute(&mut *tx)
                .await?
        };
        tx.commit().await?;
        debug!(sql = %statement.sql, affected = result.rows_affected(), "write committed");
        Ok(RowsAffected {
            affected_rows: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn describe_schema(&self, scope: SchemaScope) -> DriverResult<Vec<String>> {
        let statement = match scope {
            SchemaScope::Containers => dbconn_translator::sql::list_tables(),
            SchemaScope::Databases => dbconn_translator::sql::list_databases(),
        };
        let rows = self.execute_read(statement).await?;
        Ok(normalize::first_column(rows))
    }

    fn normalize_identifier(id: u64) -> Value {
        Value::from(id)
    }
}

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

fn bind_all<'q>(mut q: MySqlQuery<'q>, params: &'q [Value]) -> MySqlQuery<'q> {
    for v in params {
        q = bind_mysql(q, v);
    }
    q
}

fn bind_mysql<'q>(q: MySqlQuery<'q>, v: &'q Value) -> MySqlQuery<'q> {
    match v {
        Value::Null => q.bind::<Option<String>>(None),
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u)
            } else {
                q.bind(n.as_f64())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // nested values are stored as their JSON text
        other => q.bind(other.to_string()),
    }
}
