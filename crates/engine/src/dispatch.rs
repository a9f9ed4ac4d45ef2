use std::sync::Arc;

use tracing::warn;

use dbconn_drivers::{Backend, DriverError};

use crate::error::{ApiError, ApiResult};
use crate::session::{Session, SessionInfo, SessionSlot};

/// Connection values the document surface takes from configuration rather
/// than from the request.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub mongo_uri: String,
    pub mongo_username: String,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            mongo_uri: crate::config::DEFAULT_MONGO_URI.to_string(),
            mongo_username: crate::config::DEFAULT_MONGO_USERNAME.to_string(),
        }
    }
}

/// Router state shared by every handler of one surface.
pub struct Dispatcher<B> {
    sessions: Arc<SessionSlot<B>>,
    settings: Arc<ConnectSettings>,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(settings: ConnectSettings) -> Self {
        Self {
            sessions: Arc::new(SessionSlot::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &ConnectSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionSlot<B> {
        &self.sessions
    }

    /// The live session, or `NotConnected`. Checked before any payload
    /// validation.
    pub async fn session(&self) -> ApiResult<Arc<Session<B>>> {
        self.sessions.current().await.ok_or(ApiError::NotConnected)
    }

    /// One connection attempt. The slot is only touched on success.
    pub async fn connect(
        &self,
        config: &B::Config,
        info: SessionInfo,
    ) -> Result<Arc<Session<B>>, DriverError> {
        let backend = B::connect(config).await.map_err(|err| {
            warn!(backend = %B::KIND, database = %info.database, error = %err, "connect failed");
            err
        })?;
        let session = Arc::new(Session { backend, info });
        self.sessions.replace(Arc::clone(&session)).await;
        Ok(session)
    }
}
