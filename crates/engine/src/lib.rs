//! HTTP/JSON surface over a single relational or document database session.

pub mod config;
pub mod dispatch;
pub mod document;
pub mod engine;
pub mod error;
pub mod http;
pub mod relational;
pub mod session;

pub use config::{ConfigError, EngineConfig};
pub use dispatch::{ConnectSettings, Dispatcher};
pub use engine::Engine;
pub use error::{ApiError, ApiResult, EngineError};
pub use session::{Session, SessionInfo, SessionSlot};
