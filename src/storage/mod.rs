//! Backend collaborators: relational database and object storage contracts,
//! plus the in-process and direct-Postgres implementations.

pub mod database;
pub mod error;
pub mod memory;
pub mod objects;
pub mod postgres;

pub use database::{Database, Filter, Order, Row, SelectQuery, SelectResult};
pub use error::BackendError;
pub use objects::ObjectStorage;
