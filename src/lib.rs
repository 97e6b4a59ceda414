pub mod app;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{AuthService, ListController, ResourceService, RowActionHandler, ServiceError};
pub use domain::notice::Notice;
pub use domain::resource::{ResourceRegistry, ResourceSpec};
pub use infra::backend::{Backend, MemoryBackend};
pub use storage::BackendError;
