//! Request-to-query translation for the relational (MySQL) and document
//! (MongoDB) surfaces. Pure functions only; nothing here touches a driver.

pub mod document;
pub mod error;
pub mod sql;

pub use document::{DocumentRead, DocumentWrite};
pub use error::{TranslateError, TranslateResult};
pub use sql::{ColumnDef, Statement, StatementKind};
