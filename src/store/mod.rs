//! Persistence layer: libSQL-backed storage for accounts, profiles and listings.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, StoredProfile};
