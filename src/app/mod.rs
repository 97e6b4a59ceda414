pub mod auth_service;
pub mod error;
pub mod list_controller;
pub mod resource_service;
pub mod row_actions;

pub use auth_service::{authorize, Access, AuthService, RecoveryInput};
pub use error::ServiceError;
pub use list_controller::{ListController, LoadState};
pub use resource_service::{ActionOutcome, ListParams, Page, ResourceRow, ResourceService};
pub use row_actions::RowActionHandler;
