use std::env;

use thiserror::Error;

use dbconn_drivers::BackendKind;

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGO_USERNAME: &str = "admin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be one of: relational, document (got {value:?})")]
    Backend { var: &'static str, value: String },

    #[error("{var} must be a valid port number (got {value:?})")]
    Port { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub host: String,
    /// `None` picks the backend's conventional port.
    pub port: Option<u16>,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub mongo_uri: String,
    pub mongo_username: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Relational,
            host: "127.0.0.1".to_string(),
            port: None,
            cors_origins: Vec::new(),
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            mongo_username: DEFAULT_MONGO_USERNAME.to_string(),
        }
    }
}

pub fn default_port(backend: BackendKind) -> u16 {
    match backend {
        BackendKind::Relational => 5001,
        BackendKind::Document => 5000,
    }
}

pub fn parse_backend(raw: &str) -> Option<BackendKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "relational" | "mysql" | "sql" => Some(BackendKind::Relational),
        "document" | "mongodb" | "mongo" => Some(BackendKind::Document),
        _ => None,
    }
}

impl EngineConfig {
    /// Defaults overlaid with `DBCONN_*` variables, after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(value) = lookup("DBCONN_BACKEND") {
            cfg.backend = parse_backend(&value).ok_or(ConfigError::Backend {
                var: "DBCONN_BACKEND",
                value,
            })?;
        }
        if let Some(host) = lookup("DBCONN_HOST").filter(|h| !h.trim().is_empty()) {
            cfg.host = host;
        }
        if let Some(value) = lookup("DBCONN_PORT") {
            let port = value.trim().parse::<u16>().map_err(|_| ConfigError::Port {
                var: "DBCONN_PORT",
                value: value.clone(),
            })?;
            cfg.port = Some(port);
        }
        if let Some(origins) = lookup("DBCONN_CORS_ORIGINS") {
            cfg.cors_origins = split_origins(&origins);
        }
        if let Some(uri) = lookup("DBCONN_MONGO_URI").filter(|u| !u.trim().is_empty()) {
            cfg.mongo_uri = uri;
        }
        if let Some(user) = lookup("DBCONN_MONGO_USERNAME").filter(|u| !u.trim().is_empty()) {
            cfg.mongo_username = user;
        }
        Ok(cfg)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| default_port(self.backend))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    pub fn set_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn set_addr(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = Some(port);
        self
    }

    pub fn set_cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cors_origins = origins
            .into_iter()
            .flat_map(|o| split_origins(o.as_ref()))
            .collect();
        self
    }

    pub fn http(&self) -> HttpServerConfig {
        self.into()
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl HttpServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&EngineConfig> for HttpServerConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port(),
            cors_origins: cfg.cors_origins.clone(),
        }
    }
}
