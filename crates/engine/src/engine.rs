use axum::Router;
use tracing::info;

use dbconn_drivers::{BackendKind, MongoBackend, MySqlBackend};

use crate::config::EngineConfig;
use crate::dispatch::{ConnectSettings, Dispatcher};
use crate::error::EngineError;
use crate::http::{self, HttpServer};
use crate::{document, relational};

pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The full application for the configured backend, layers included.
    pub fn router(&self) -> Result<Router, EngineError> {
        let settings = ConnectSettings {
            mongo_uri: self.config.mongo_uri.clone(),
            mongo_username: self.config.mongo_username.clone(),
        };
        let routes = match self.config.backend {
            BackendKind::Relational => {
                relational::router(Dispatcher::<MySqlBackend>::new(settings))
            }
            BackendKind::Document => document::router(Dispatcher::<MongoBackend>::new(settings)),
        };
        http::layered(routes, &self.config.http())
    }

    pub async fn run(self) -> Result<(), EngineError> {
        let router = self.router()?;
        info!(backend = %self.config.backend, address = %self.config.addr(), "starting dbconn");
        HttpServer::new(router, self.config.http()).start().await
    }
}
