//! The document (MongoDB) HTTP surface.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use dbconn_drivers::{DocumentBackend, DocumentConnectOptions, SchemaScope};
use dbconn_translator::document::{self, DEFAULT_READ_LIMIT};

use crate::dispatch::{ConnectSettings, Dispatcher};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::session::{Session, SessionInfo};

pub const DEFAULT_DATABASE: &str = "dbmsl";
pub const DEFAULT_COLLECTION: &str = "users";

pub fn router<B: DocumentBackend>(dispatcher: Dispatcher<B>) -> Router {
    Router::new()
        .route("/api/connect", post(connect::<B>))
        .route("/api/create", post(create::<B>))
        .route("/api/read", post(read::<B>))
        .route("/api/update", post(update::<B>))
        .route("/api/delete", post(delete::<B>))
        .route("/api/aggregate", post(aggregate::<B>))
        .route("/api/status", get(status::<B>))
        .route("/api/collections", get(collections::<B>))
        .route("/api/stats", get(stats::<B>))
        .with_state(dispatcher)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    Create {
        document: Map<String, Value>,
    },
    Read {
        filter: Map<String, Value>,
        limit: i64,
    },
    Update {
        filter: Map<String, Value>,
        update: Map<String, Value>,
        multiple: bool,
    },
    Delete {
        filter: Map<String, Value>,
        multiple: bool,
    },
    Aggregate {
        pipeline: Vec<Value>,
    },
    ListCollections,
    Stats,
}

pub trait IntoDocumentOp {
    fn into_op(self) -> ApiResult<DocumentOp>;
}

fn non_empty(map: Option<Map<String, Value>>) -> Option<Map<String, Value>> {
    map.filter(|m| !m.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectPayload {
    pub password: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
}

impl ConnectPayload {
    /// The server URI and username come from configuration; the request
    /// supplies the password and the target database/collection.
    pub fn into_options(self, settings: &ConnectSettings) -> ApiResult<DocumentConnectOptions> {
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::validation("Password is required"))?;
        Ok(DocumentConnectOptions {
            uri: settings.mongo_uri.clone(),
            username: settings.mongo_username.clone(),
            password,
            database: self
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            collection: self
                .collection
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePayload {
    pub document: Option<Map<String, Value>>,
}

impl IntoDocumentOp for CreatePayload {
    fn into_op(self) -> ApiResult<DocumentOp> {
        let document =
            non_empty(self.document).ok_or_else(|| ApiError::validation("Document data is required"))?;
        Ok(DocumentOp::Create { document })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadPayload {
    pub filter: Option<Map<String, Value>>,
    pub limit: Option<i64>,
}

impl IntoDocumentOp for ReadPayload {
    fn into_op(self) -> ApiResult<DocumentOp> {
        Ok(DocumentOp::Read {
            filter: self.filter.unwrap_or_default(),
            limit: self.limit.unwrap_or(DEFAULT_READ_LIMIT),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayload {
    pub filter: Option<Map<String, Value>>,
    pub update: Option<Map<String, Value>>,
    #[serde(default)]
    pub multiple: bool,
}

impl IntoDocumentOp for UpdatePayload {
    fn into_op(self) -> ApiResult<DocumentOp> {
        match (non_empty(self.filter), non_empty(self.update)) {
            (Some(filter), Some(update)) => Ok(DocumentOp::Update {
                filter,
                update,
                multiple: self.multiple,
            }),
            _ => Err(ApiError::validation("Filter and update data are required")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeletePayload {
    pub filter: Option<Map<String, Value>>,
    #[serde(default)]
    pub multiple: bool,
}

impl IntoDocumentOp for DeletePayload {
    fn into_op(self) -> ApiResult<DocumentOp> {
        let filter = non_empty(self.filter).ok_or_else(|| ApiError::validation("Filter is required"))?;
        Ok(DocumentOp::Delete {
            filter,
            multiple: self.multiple,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AggregatePayload {
    pub pipeline: Option<Vec<Value>>,
}

impl IntoDocumentOp for AggregatePayload {
    fn into_op(self) -> ApiResult<DocumentOp> {
        let pipeline = self
            .pipeline
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::validation("Pipeline is required"))?;
        Ok(DocumentOp::Aggregate { pipeline })
    }
}

pub async fn execute<B: DocumentBackend>(session: &Session<B>, op: DocumentOp) -> ApiResult<Value> {
    match op {
        DocumentOp::Create { document } => {
            let outcome = session.write(document::insert(&document)?).await?;
            Ok(json!({
                "success": true,
                "message": "Document created successfully",
                "inserted_id": outcome.inserted_id.map(B::normalize_identifier),
                "acknowledged": true,
            }))
        }
        DocumentOp::Read { filter, limit } => {
            let documents = session.read(document::find(&filter, limit)?).await?;
            let count = documents.len();
            Ok(json!({
                "success": true,
                "documents": documents,
                "count": count,
                "filter": filter,
                "limit": limit,
            }))
        }
        DocumentOp::Update {
            filter,
            update,
            multiple,
        } => {
            let outcome = session
                .write(document::update(&filter, &update, multiple)?)
                .await?;
            Ok(json!({
                "success": true,
                "message": "Update completed",
                "matched_count": outcome.matched_count,
                "modified_count": outcome.modified_count,
                "acknowledged": true,
            }))
        }
        DocumentOp::Delete { filter, multiple } => {
            let outcome = session.write(document::delete(&filter, multiple)?).await?;
            Ok(json!({
                "success": true,
                "message": "Delete completed",
                "deleted_count": outcome.deleted_count,
                "acknowledged": true,
            }))
        }
        DocumentOp::Aggregate { pipeline } => {
            let results = session.read(document::aggregate(&pipeline)?).await?;
            let count = results.len();
            Ok(json!({
                "success": true,
                "results": results,
                "count": count,
                "pipeline": pipeline,
            }))
        }
        DocumentOp::ListCollections => {
            let collections = session.describe(SchemaScope::Containers).await?;
            Ok(json!({ "success": true, "collections": collections }))
        }
        DocumentOp::Stats => {
            let stats = session.backend.collection_stats().await?;
            Ok(json!({ "success": true, "stats": stats }))
        }
    }
}

async fn dispatch<B, P>(
    dispatcher: &Dispatcher<B>,
    payload: Result<ApiJson<P>, ApiError>,
) -> ApiResult<Json<Value>>
where
    B: DocumentBackend,
    P: IntoDocumentOp,
{
    let session = dispatcher.session().await?;
    let ApiJson(payload) = payload?;
    let op = payload.into_op()?;
    execute(&session, op).await.map(Json)
}

async fn connect<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    ApiJson(payload): ApiJson<ConnectPayload>,
) -> ApiResult<Json<Value>> {
    let options = payload.into_options(dispatcher.settings())?;
    let info = SessionInfo::document(&options.database, &options.collection);
    dispatcher.connect(&options, info).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Connected successfully",
        "database": options.database,
        "collection": options.collection,
    })))
}

async fn create<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<CreatePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn read<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<ReadPayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn update<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<UpdatePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn delete<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<DeletePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn aggregate<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
    payload: Result<ApiJson<AggregatePayload>, ApiError>,
) -> ApiResult<Json<Value>> {
    dispatch(&dispatcher, payload).await
}

async fn collections<B: DocumentBackend>(
    State(dispatcher): State<Dispatcher<B>>,
) -> ApiResult<Json<Value>> {
    let session = dispatcher.session().await?;
    execute(&session, DocumentOp::ListCollections).await.map(Json)
}

async fn stats<B: DocumentBackend>(State(dispatcher): State<Dispatcher<B>>) -> ApiResult<Json<Value>> {
    let session = dispatcher.session().await?;
    execute(&session, DocumentOp::Stats).await.map(Json)
}

async fn status<B: DocumentBackend>(State(dispatcher): State<Dispatcher<B>>) -> Json<Value> {
    match dispatcher.sessions().current().await {
        Some(session) => Json(json!({
            "connected": true,
            "database": session.info.database,
            "collection": session.info.collection,
        })),
        None => Json(json!({ "connected": false })),
    }
}
