//! Backend drivers behind one capability trait.
//!
//! `Backend` is what the dispatcher talks to; `MySqlBackend` (sqlx) and
//! `MongoBackend` (mongodb) are the two implementations. Each owns exactly
//! one live connection to its server.

pub mod error;
pub mod mongo;
pub mod mysql;
pub mod normalize;

use async_trait::async_trait;
use bson::Bson;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dbconn_translator::{DocumentRead, DocumentWrite, Statement};

pub use error::{DriverError, DriverResult};
pub use mongo::MongoBackend;
pub use mysql::MySqlBackend;

/// One row or document, field order preserved.
pub type Row = Map<String, Value>;

/// Fully materialized result of a read.
pub type ResultSet = Vec<Row>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Relational,
    Document,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Relational => f.write_str("relational"),
            BackendKind::Document => f.write_str("document"),
        }
    }
}

/// What `describe_schema` lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaScope {
    /// Tables, or collections of the current database.
    Containers,
    Databases,
}

#[derive(Debug, Clone)]
pub struct SqlConnectOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct DocumentConnectOptions {
    /// Server URI without credentials.
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowsAffected {
    pub affected_rows: u64,
    pub last_insert_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWriteSummary {
    pub inserted_id: Option<Bson>,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    pub count: Value,
    pub size: Value,
    #[serde(rename = "avgObjSize")]
    pub avg_obj_size: Value,
    #[serde(rename = "storageSize")]
    pub storage_size: Value,
    pub indexes: Value,
}

#[async_trait]
pub trait Backend: Send + Sync + Sized + 'static {
    type Config: Send + Sync + 'static;
    /// Translated read query (QuerySpec for reads).
    type Read: Send + 'static;
    /// Translated write query (QuerySpec for writes).
    type Write: Send + 'static;
    type Outcome: Send + 'static;
    /// Native identifier type assigned by the backend on insert.
    type Identifier: Send;

    const KIND: BackendKind;

    /// One attempt, no retry. Errors carry the driver's text.
    async fn connect(config: &Self::Config) -> DriverResult<Self>;

    async fn is_alive(&self) -> bool;

    async fn execute_read(&self, query: Self::Read) -> DriverResult<ResultSet>;

    /// Runs and commits a single write.
    async fn execute_write(&self, query: Self::Write) -> DriverResult<Self::Outcome>;

    async fn describe_schema(&self, scope: SchemaScope) -> DriverResult<Vec<String>>;

    /// JSON form of a backend identifier. Must be idempotent on already
    /// normalized values.
    fn normalize_identifier(id: Self::Identifier) -> Value;
}

/// Backends speaking SQL statements.
pub trait SqlBackend:
    Backend<
        Config = SqlConnectOptions,
        Read = Statement,
        Write = Statement,
        Outcome = RowsAffected,
        Identifier = u64,
    >
{
}

impl<T> SqlBackend for T where
    T: Backend<
            Config = SqlConnectOptions,
            Read = Statement,
            Write = Statement,
            Outcome = RowsAffected,
            Identifier = u64,
        >
{
}

/// Backends speaking document filters, bound to one collection.
#[async_trait]
pub trait DocumentBackend:
    Backend<
        Config = DocumentConnectOptions,
        Read = DocumentRead,
        Write = DocumentWrite,
        Outcome = DocumentWriteSummary,
        Identifier = Bson,
    >
{
    async fn collection_stats(&self) -> DriverResult<CollectionStats>;
}
