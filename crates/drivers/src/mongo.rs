
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Collection, Database};
use serde_json::Value;
use tracing::{debug, info};

use dbconn_translator::{DocumentRead, DocumentWrite};

use crate::error::DriverResult;
use crate::normalize;
use crate::{
    Backend, BackendKind, CollectionStats, DocumentBackend, DocumentConnectOptions,
    DocumentWriteSummary, ResultSet, SchemaScope,
};

/// MongoDB over the official driver, bound to one database and collection
/// for the life of the session.
pub struct MongoBackend {
    client: Client,
    database: Database,
    collection: Collection<Document>,
}

/// Driver options for a session: the URI as given plus credentials. Timeouts
/// stay at the driver defaults.
async fn client_options(config: &DocumentConnectOptions) -> DriverResult<ClientOptions> {
    let mut options = ClientOptions::parse(config.uri.as_str()).await?;
    options.credential = Some(
        Credential::builder()
            .username(config.username.clone())
            .password(config.password.clone())
            .build(),
    );
    options.app_name = Some("dbconn".to_string());
    Ok(options)
}

impl MongoBackend {
    async fn ping(&self) -> DriverResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for MongoBackend {
    type Config = DocumentConnectOptions;
    type Read = DocumentRead;
    type Write = DocumentWrite;
    type Outcome = DocumentWriteSummary;
    type Identifier = Bson;

    const KIND: BackendKind = BackendKind::Document;

    async fn connect(config: &DocumentConnectOptions) -> DriverResult<Self> {
        let client = Client::with_options(client_options(config).await?)?;
        let database = client.database(&config.database);
        let collection = database.collection::<Document>(&config.collection);
        let backend = Self {
            client,
            database,
            collection,
        };
        // the driver connects lazily; force a round trip so bad credentials fail here
        backend.ping().await?;
        info!(uri = %config.uri, database = %config.database, collection = %config.collection, "mongodb session opened");
        Ok(backend)
    }

    async fn is_alive(&self) -> bool {
        self.ping().await.is_ok()
    }

    async fn execute_read(&self, query: DocumentRead) -> DriverResult<ResultSet> {
        let docs: Vec<Document> = match query {
            DocumentRead::Find { filter, limit } => {
                self.collection
                    .find(filter)
                    .limit(limit)
                    .await?
                    .try_collect()
                    .await?
            }
            DocumentRead::Aggregate { pipeline } => {
                self.collection
                    .aggregate(pipeline)
                    .await?
                    .try_collect()
                    .await?
            }
        };
        debug!(collection = %self.collection.name(), docs = docs.len(), "read");
        Ok(normalize::documents(docs))
    }

    async fn execute_write(&self, query: DocumentWrite) -> DriverResult<DocumentWriteSummary> {
        let summary = match query {
            DocumentWrite::Insert { document } => {
                let result = self.collection.insert_one(document).await?;
                DocumentWriteSummary {
                    inserted_id: Some(result.inserted_id),
                    ..Default::default()
                }
            }
            DocumentWrite::Update {
                filter,
                update,
                multiple,
            } => {
                let result = if multiple {
                    self.collection.update_many(filter, update).await?
                } else {
                    self.collection.update_one(filter, update).await?
                };
                DocumentWriteSummary {
                    matched_count: result.matched_count,
                    modified_count: result.modified_count,
                    ..Default::default()
                }
            }
            DocumentWrite::Delete { filter, multiple } => {
                let result = if multiple {
                    self.collection.delete_many(filter).await?
                } else {
                    self.collection.delete_one(filter).await?
                };
                DocumentWriteSummary {
                    deleted_count: result.deleted_count,
                    ..Default::default()
                }
            }
        };
        debug!(collection = %self.collection.name(), ?summary, "write acknowledged");
        Ok(summary)
    }

    async fn describe_schema(&self, scope: SchemaScope) -> DriverResult<Vec<String>> {
        let names = match scope {
            SchemaScope::Containers => self.database.list_collection_names().await?,
            SchemaScope::Databases => self.client.list_database_names().await?,
        };
        Ok(names)
    }

    fn normalize_identifier(id: Bson) -> Value {
        normalize::bson_value(id)
    }
}

#[async_trait]
impl DocumentBackend for MongoBackend {
    async fn collection_stats(&self) -> DriverResult<CollectionStats> {
        let stats = self
            .database
            .run_command(doc! { "collStats": self.collection.name() })
            .await?;
        Ok(stats_from_document(&stats))
    }
}

fn stats_from_document(stats: &Document) -> CollectionStats {
    let field = |key: &str| {
        stats
            .get(key)
            .cloned()
            .map(normalize::bson_value)
            .unwrap_or_else(|| Value::from(0))
    };
    CollectionStats {
        count: field("count"),
        size: field("size"),
        avg_obj_size: field("avgObjSize"),
        storage_size: field("storageSize"),
        indexes: field("nindexes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats_fields_default_to_zero() {
        let stats = stats_from_document(&doc! { "count": 3_i32, "size": 120_i64, "nindexes": 1_i32 });
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            json!({ "count": 3, "size": 120, "avgObjSize": 0, "storageSize": 0, "indexes": 1 })
        );
    }

    #[tokio::test]
    async fn client_options_keep_driver_timeouts() {
        let config = DocumentConnectOptions {
            uri: "mongodb://localhost:27017".into(),
            username: "admin".into(),
            password: "secret".into(),
            database: "dbmsl".into(),
            collection: "users".into(),
        };
        let options = client_options(&config).await.unwrap();
        assert_eq!(options.server_selection_timeout, None);
        assert_eq!(options.connect_timeout, None);
        assert_eq!(options.app_name.as_deref(), Some("dbconn"));
        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("admin"));
        assert_eq!(credential.password.as_deref(), Some("secret"));
    }
}
