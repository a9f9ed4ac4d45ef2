//! The single live backend session.
//!
//! A `SessionSlot` holds at most one `Session`. Handlers clone the `Arc` out
//! of the slot and release the lock before touching the backend, so a
//! reconnect never waits for in-flight operations: they finish on the
//! session they started with, which is dropped once the last of them
//! completes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use dbconn_drivers::{Backend, BackendKind, ResultSet, SchemaScope};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub kind: BackendKind,
    pub database: String,
    /// Document sessions only.
    pub collection: Option<String>,
    /// Relational sessions only.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    pub fn relational(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            kind: BackendKind::Relational,
            database: database.into(),
            collection: None,
            host: Some(host.into()),
            port: Some(port),
            connected_at: Utc::now(),
        }
    }

    pub fn document(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            kind: BackendKind::Document,
            database: database.into(),
            collection: Some(collection.into()),
            host: None,
            port: None,
            connected_at: Utc::now(),
        }
    }
}

pub struct Session<B> {
    pub backend: B,
    pub info: SessionInfo,
}

impl<B: Backend> Session<B> {
    pub async fn read(&self, query: B::Read) -> ApiResult<ResultSet> {
        self.backend.execute_read(query).await.map_err(|err| {
            warn!(backend = %B::KIND, error = %err, "read failed");
            ApiError::from(err)
        })
    }

    pub async fn write(&self, query: B::Write) -> ApiResult<B::Outcome> {
        self.backend.execute_write(query).await.map_err(|err| {
            warn!(backend = %B::KIND, error = %err, "write failed");
            ApiError::from(err)
        })
    }

    pub async fn describe(&self, scope: SchemaScope) -> ApiResult<Vec<String>> {
        self.backend.describe_schema(scope).await.map_err(|err| {
            warn!(backend = %B::KIND, ?scope, error = %err, "schema listing failed");
            ApiError::from(err)
        })
    }
}

pub struct SessionSlot<B> {
    inner: RwLock<Option<Arc<Session<B>>>>,
}

impl<B> Default for SessionSlot<B> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<B> SessionSlot<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<Session<B>>> {
        self.inner.read().await.clone()
    }

    /// Install `session`, returning the one it displaced. Does not wait for
    /// operations still running on the previous session.
    pub async fn replace(&self, session: Arc<Session<B>>) -> Option<Arc<Session<B>>> {
        let previous = self.inner.write().await.replace(session.clone());
        match &previous {
            Some(old) => info!(
                database = %session.info.database,
                previous = %old.info.database,
                previous_since = %old.info.connected_at,
                "session replaced"
            ),
            None => info!(database = %session.info.database, "session established"),
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_keeps_outstanding_handles_alive() {
        let slot = SessionSlot::<u8>::new();
        assert!(slot.current().await.is_none());

        slot.replace(Arc::new(Session {
            backend: 1,
            info: SessionInfo::document("a", "users"),
        }))
        .await;
        let held = slot.current().await.unwrap();

        let previous = slot
            .replace(Arc::new(Session {
                backend: 2,
                info: SessionInfo::document("b", "users"),
            }))
            .await
            .unwrap();

        assert_eq!(previous.backend, 1);
        assert_eq!(held.backend, 1);
        assert_eq!(held.info.database, "a");
        assert_eq!(slot.current().await.unwrap().info.database, "b");
    }
}
