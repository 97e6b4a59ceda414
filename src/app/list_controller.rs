//! Paged, searchable view over one resource.

use crate::app::error::ServiceError;
use crate::app::resource_service::{list_failure_notice, ListParams, Page, ResourceRow, ResourceService};
use crate::domain::notice::Notice;
use crate::domain::resource::ResourceSpec;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Success,
    Error,
}

pub struct ListController {
    service: ResourceService,
    spec: Arc<ResourceSpec>,
    params: ListParams,
    state: LoadState,
    page: Page,
    notice: Option<Notice>,
}

impl ListController {
    pub fn new(service: ResourceService, spec: Arc<ResourceSpec>) -> Self {
        let params = ListParams::default();
        Self {
            service,
            spec,
            page: Page::empty(&params),
            params,
            state: LoadState::Idle,
            notice: None,
        }
    }

    /// Scopes the list to one parent record (applications of a job).
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.params.parent_id = Some(parent_id.into());
        self
    }

    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn params(&self) -> &ListParams {
        &self.params
    }

    pub fn rows(&self) -> &[ResourceRow] {
        &self.page.rows
    }

    pub fn total(&self) -> u64 {
        self.page.total
    }

    pub fn page_count(&self) -> u64 {
        self.page.page_count()
    }

    /// Notice from the last failed fetch, if not yet taken.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Fetches the current page and returns how it ended (`Success` or
    /// `Error`); the controller itself settles back to `Idle`. A failure
    /// clears the rows and records a notice; it is never returned as an error.
    pub async fn refresh(&mut self) -> LoadState {
        self.state = LoadState::Loading;
        let outcome = match self.service.list(&self.spec, &self.params).await {
            Ok(page) => {
                debug!(resource = self.spec.key, rows = page.rows.len(), total = page.total, "page loaded");
                self.page = page;
                LoadState::Success
            }
            Err(e) => {
                self.page = Page::empty(&self.params);
                self.notice = Some(match e {
                    ServiceError::Backend(_) => list_failure_notice(&self.spec),
                    other => other.notice(),
                });
                LoadState::Error
            }
        };
        self.state = LoadState::Idle;
        outcome
    }

    pub async fn set_page(&mut self, page: u64) -> LoadState {
        self.params.page = page;
        self.refresh().await
    }

    pub async fn set_page_size(&mut self, page_size: u64) -> LoadState {
        self.params.page_size = page_size;
        self.params.page = 1;
        self.refresh().await
    }

    pub async fn set_search(&mut self, search: impl Into<String>) -> LoadState {
        self.params.search = Some(search.into());
        self.params.page = 1;
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form::{CreateInput, FormInput, FormValues};
    use crate::domain::resource::{catalog, tables};
    use crate::storage::memory::{MemoryDatabase, MemoryObjectStorage};

    async fn seeded(n: usize) -> (Arc<MemoryDatabase>, ListController) {
        let db = Arc::new(MemoryDatabase::new());
        let service = ResourceService::new(db.clone(), Arc::new(MemoryObjectStorage::new("AISPPUR")));
        let spec = Arc::new(catalog::faculty_staff());
        for i in 0..n {
            let values: FormValues = [
                ("name", format!("Teacher {}", i)),
                ("designation", "PGT".to_string()),
                ("category", "Teaching".to_string()),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
            service
                .submit(
                    &spec,
                    FormInput::Create(CreateInput {
                        values,
                        ..CreateInput::default()
                    }),
                )
                .await
                .unwrap();
        }
        (db, ListController::new(service, spec))
    }

    #[tokio::test]
    async fn pages_cover_the_whole_table() {
        let (_db, mut list) = seeded(23).await;
        assert_eq!(list.state(), LoadState::Idle);
        list.set_page_size(10).await;
        assert_eq!(list.page_count(), 3);

        let mut seen = 0;
        for page in 1..=list.page_count() {
            assert_eq!(list.set_page(page).await, LoadState::Success);
            assert!(list.rows().len() <= 10);
            seen += list.rows().len() as u64;
        }
        assert_eq!(seen, list.total());
        assert_eq!(list.rows().last().unwrap().get("name").unwrap(), "Teacher 0");
    }

    #[tokio::test]
    async fn search_resets_to_first_page() {
        let (_db, mut list) = seeded(12).await;
        list.set_page(2).await;
        list.set_search("  teacher 1 ").await;
        assert_eq!(list.params().page, 1);
        // "Teacher 1", "Teacher 10", "Teacher 11"
        assert_eq!(list.total(), 3);

        assert_eq!(list.set_search("nobody").await, LoadState::Success);
        assert_eq!(list.state(), LoadState::Idle);
        assert!(list.rows().is_empty());
        assert_eq!(list.total(), 0);
    }

    #[tokio::test]
    async fn failure_clears_rows_and_leaves_a_notice() {
        let (db, mut list) = seeded(3).await;
        list.refresh().await;
        assert_eq!(list.rows().len(), 3);

        db.fail_table(tables::FACULTY_STAFF, true).await;
        assert_eq!(list.refresh().await, LoadState::Error);
        assert_eq!(list.state(), LoadState::Idle);
        assert!(list.rows().is_empty());
        assert_eq!(list.total(), 0);
        let notice = list.take_notice().unwrap();
        assert_eq!(notice.message, "Failed to fetch staff");
        assert!(list.take_notice().is_none());
    }
}
