//! The generic resource engine.
//!
//! One service drives every back-office table. Each call is parameterized by a
//! `ResourceSpec` (fields, table, storage folder, status/visibility columns),
//! so the nine admin screens share one list/edit/delete implementation.
//!
//! Row mutations are authoritative. Storage cleanup runs alongside them and
//! never fails the surrounding call.

use crate::app::error::ServiceError;
use crate::domain::confirm::RowAction;
use crate::domain::files::{DeleteReport, FileLifecycle};
use crate::domain::form::{
    validate_appended_files, AttachmentChange, CreateInput, EditInput, FormInput, FormValues,
    UploadedFile,
};
use crate::domain::notice::Notice;
use crate::domain::resource::{AttachmentSpec, ResourceSpec, VISIBILITY_COLUMN};
use crate::infra::backend::Backend;
use crate::storage::database::{json_as_text, Database, Filter, Order, Row, SelectQuery};
use crate::storage::error::BackendError;
use crate::storage::objects::ObjectStorage;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

const ID: &str = "id";
const CREATED_AT: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    /// 1-based.
    pub page: u64,
    pub page_size: u64,
    pub search: Option<String>,
    /// Required for parent-scoped resources.
    pub parent_id: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            parent_id: None,
        }
    }
}

impl ListParams {
    pub fn page(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Trimmed search text, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Inclusive row range of the page; `None` when the offset is past any
    /// row a backend can address (bigint offsets).
    pub fn row_range(&self) -> Option<(u64, u64)> {
        let from = self.page.checked_sub(1)?.checked_mul(self.page_size)?;
        let to = from.checked_add(self.page_size.checked_sub(1)?)?;
        (to <= i64::MAX as u64).then_some((from, to))
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.page == 0 {
            return Err(ServiceError::invalid("page must be 1 or greater"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ServiceError::invalid(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}

/// A stored record, exactly as the backend returned it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceRow(pub Row);

impl ResourceRow {
    pub fn id(&self) -> Option<String> {
        row_id(&self.0)
    }

    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    /// Attachment URLs in stored order.
    pub fn attachments(&self, spec: &ResourceSpec) -> Vec<String> {
        spec.attachment
            .as_ref()
            .map(|att| attachment_urls(att, &self.0))
            .unwrap_or_default()
    }

    /// Form values for edit mode. Null columns prefill as empty strings.
    pub fn form_values(&self, spec: &ResourceSpec) -> FormValues {
        spec.fields
            .iter()
            .map(|f| {
                let value = self.0.get(f.name).map(json_as_text).unwrap_or_default();
                (f.name.to_string(), value)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<ResourceRow>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl Page {
    pub fn empty(params: &ListParams) -> Self {
        Self {
            rows: Vec::new(),
            total: 0,
            page: params.page,
            page_size: params.page_size,
        }
    }

    /// Never less than one, so an empty table still renders page 1 of 1.
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 1;
        }
        self.total.div_ceil(self.page_size).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Deleted {
        ids: Vec<String>,
        files: DeleteReport,
    },
    VisibilityChanged {
        id: String,
        visible: bool,
    },
    StatusChanged {
        id: String,
        status: String,
    },
    AttachmentRemoved {
        id: String,
        remaining: usize,
        file_removed: bool,
    },
}

impl ActionOutcome {
    pub fn notice(&self, label: &str) -> Notice {
        match self {
            ActionOutcome::Deleted { ids, .. } if ids.len() > 1 => {
                Notice::success(format!("{} records deleted successfully", ids.len()))
            }
            ActionOutcome::Deleted { .. } => Notice::success(format!("{} deleted successfully", label)),
            ActionOutcome::VisibilityChanged { visible: true, .. } => {
                Notice::success(format!("{} is now visible", label))
            }
            ActionOutcome::VisibilityChanged { visible: false, .. } => {
                Notice::success(format!("{} is now hidden", label))
            }
            ActionOutcome::StatusChanged { status, .. } => {
                Notice::success(format!("{} marked as {}", label, status))
            }
            ActionOutcome::AttachmentRemoved { .. } => Notice::success("Image deleted successfully"),
        }
    }
}

pub fn saved_notice(spec: &ResourceSpec, edited: bool) -> Notice {
    let verb = if edited { "updated" } else { "created" };
    Notice::success(format!("{} {} successfully", spec.label, verb))
}

pub fn list_failure_notice(spec: &ResourceSpec) -> Notice {
    Notice::error(format!("Failed to fetch {}", spec.plural))
}

fn row_id(row: &Row) -> Option<String> {
    row.get(ID)
        .filter(|v| !v.is_null())
        .map(json_as_text)
        .filter(|s| !s.is_empty())
}

fn attachment_urls(att: &AttachmentSpec, row: &Row) -> Vec<String> {
    match row.get(att.column) {
        Some(JsonValue::String(url)) if !url.trim().is_empty() => vec![url.clone()],
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Column value for a set of URLs: a list for multi-file resources, the
/// single URL (or null) otherwise.
fn attachment_value(att: &AttachmentSpec, urls: &[String]) -> JsonValue {
    if att.is_multiple() {
        JsonValue::from(urls.to_vec())
    } else {
        urls.first()
            .map(|u| JsonValue::from(u.as_str()))
            .unwrap_or(JsonValue::Null)
    }
}

fn id_filter(id: &str) -> Filter {
    Filter::Eq(ID.to_string(), JsonValue::from(id))
}

/// Resolved attachment side of an edit.
#[derive(Default)]
struct AttachmentPlan {
    value: Option<JsonValue>,
    uploaded: Vec<String>,
    superseded: Vec<String>,
}

#[derive(Clone)]
pub struct ResourceService {
    db: Arc<dyn Database>,
    files: FileLifecycle,
}

impl ResourceService {
    pub fn new(db: Arc<dyn Database>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            db,
            files: FileLifecycle::new(storage),
        }
    }

    pub fn from_backend(backend: &Backend) -> Self {
        Self::new(backend.db.clone(), backend.storage.clone())
    }

    pub fn files(&self) -> &FileLifecycle {
        &self.files
    }

    /// One page of rows, newest first, plus the total matching count.
    pub async fn list(&self, spec: &ResourceSpec, params: &ListParams) -> Result<Page, ServiceError> {
        params.check()?;
        // Unaddressable pages still report the total, with no rows.
        let (range, past_end) = match params.row_range() {
            Some(range) => (range, false),
            None => ((0, 0), true),
        };
        let mut query = SelectQuery::all()
            .order(Order::desc(CREATED_AT))
            .order(Order::desc(ID))
            .range(range.0, range.1)
            .with_count();
        if past_end {
            query = query.columns(&[ID]);
        }

        if let Some(parent) = &spec.parent {
            let parent_id = params
                .parent_id
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ServiceError::invalid(format!("parent_id is required to list {}", spec.plural))
                })?;
            query = query.eq(parent.column, parent_id);
        }
        if let Some(term) = params.search_term() {
            query = query.any_ilike(&spec.search_columns(), term);
        }

        let result = self.db.select(spec.table, &query).await.map_err(|e| {
            warn!(resource = spec.key, error = %e, "list fetch failed");
            e
        })?;
        let total = result.count.unwrap_or(result.rows.len() as u64);
        let rows = if past_end { Vec::new() } else { result.rows };
        Ok(Page {
            rows: rows.into_iter().map(ResourceRow).collect(),
            total,
            page: params.page,
            page_size: params.page_size,
        })
    }

    pub async fn get(&self, spec: &ResourceSpec, id: &str) -> Result<ResourceRow, ServiceError> {
        let query = SelectQuery::all().eq(ID, id.trim()).range(0, 0);
        let result = self.db.select(spec.table, &query).await?;
        result
            .rows
            .into_iter()
            .next()
            .map(ResourceRow)
            .ok_or_else(|| ServiceError::NotFound(spec.label.to_string()))
    }

    /// Create or edit, depending on the input variant.
    pub async fn submit(&self, spec: &ResourceSpec, input: FormInput) -> Result<ResourceRow, ServiceError> {
        match input {
            FormInput::Create(input) => self.create(spec, input).await,
            FormInput::Edit(input) => self.edit(spec, input).await,
        }
    }

    /// Adds files after the stored ones on a multi-file record.
    pub async fn append_attachments(
        &self,
        spec: &ResourceSpec,
        id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<ResourceRow, ServiceError> {
        validate_appended_files(spec, &files).map_err(ServiceError::Validation)?;
        let existing = self.get(spec, id).await?;
        let plan = self
            .plan_attachment(spec, &existing, &AttachmentChange::Append(files))
            .await?;
        self.commit_edit(spec, id, Row::new(), plan).await
    }

    /// Executes a confirmed row action. Exactly one row mutation per call.
    pub async fn perform(&self, spec: &ResourceSpec, action: RowAction) -> Result<ActionOutcome, ServiceError> {
        match action {
            RowAction::Delete { id } => self.delete_rows(spec, vec![id]).await,
            RowAction::BulkDelete { ids } => {
                if ids.is_empty() {
                    return Err(ServiceError::invalid("No rows selected"));
                }
                self.delete_rows(spec, ids).await
            }
            RowAction::SetVisibility { id, visible } => {
                if !spec.visibility {
                    return Err(ServiceError::invalid(format!(
                        "{} records have no visibility setting",
                        spec.label
                    )));
                }
                let mut patch = Row::new();
                patch.insert(VISIBILITY_COLUMN.to_string(), JsonValue::from(visible));
                self.update_one(spec, &id, patch).await?;
                info!(resource = spec.key, id = %id, visible, "visibility changed");
                Ok(ActionOutcome::VisibilityChanged { id, visible })
            }
            RowAction::SetStatus { id, status, notes } => {
                let Some(st) = &spec.status else {
                    return Err(ServiceError::invalid(format!("{} records have no status", spec.label)));
                };
                if !st.values.contains(&status.as_str()) {
                    return Err(ServiceError::field(st.column, "Please select a valid status"));
                }
                let mut patch = Row::new();
                patch.insert(st.column.to_string(), JsonValue::from(status.as_str()));
                if let (Some(column), Some(notes)) = (st.notes_column, notes) {
                    let notes = notes.trim();
                    let value = if notes.is_empty() {
                        JsonValue::Null
                    } else {
                        JsonValue::from(notes)
                    };
                    patch.insert(column.to_string(), value);
                }
                self.update_one(spec, &id, patch).await?;
                info!(resource = spec.key, id = %id, status = %status, "status changed");
                Ok(ActionOutcome::StatusChanged { id, status })
            }
            RowAction::RemoveAttachment { id, index } => {
                let att = match &spec.attachment {
                    Some(att) if att.is_multiple() => att,
                    _ => {
                        return Err(ServiceError::invalid(format!(
                            "{} records have no image list",
                            spec.label
                        )))
                    }
                };
                let existing = self.get(spec, &id).await?;
                let mut urls = attachment_urls(att, &existing.0);
                if index >= urls.len() {
                    return Err(ServiceError::invalid(format!("No image at position {}", index)));
                }
                let removed = urls.remove(index);

                let mut patch = Row::new();
                patch.insert(att.column.to_string(), attachment_value(att, &urls));
                self.update_one(spec, &id, patch).await?;
                let file_removed = self.files.delete_by_url(&removed).await;
                Ok(ActionOutcome::AttachmentRemoved {
                    id,
                    remaining: urls.len(),
                    file_removed,
                })
            }
        }
    }

    async fn create(&self, spec: &ResourceSpec, input: CreateInput) -> Result<ResourceRow, ServiceError> {
        let mut row = input.validate(spec).map_err(ServiceError::Validation)?;

        if let Some(parent) = &spec.parent {
            let parent_id = row.get(parent.column).map(json_as_text).unwrap_or_default();
            let query = SelectQuery::all().columns(&[ID]).eq(ID, parent_id).range(0, 0);
            if self.db.select(parent.parent_table, &query).await?.rows.is_empty() {
                return Err(ServiceError::NotFound("Parent record".to_string()));
            }
        }

        let mut uploaded = Vec::new();
        if let Some(att) = &spec.attachment {
            if !input.files.is_empty() {
                uploaded = self.files.upload_all(att.folder, &input.files).await?;
            }
            row.insert(att.column.to_string(), attachment_value(att, &uploaded));
        }
        if let Some(st) = &spec.status {
            let unset = row.get(st.column).map_or(true, JsonValue::is_null);
            if unset {
                row.insert(st.column.to_string(), JsonValue::from(st.initial));
            }
        }
        if spec.visibility {
            row.entry(VISIBILITY_COLUMN.to_string())
                .or_insert(JsonValue::Bool(true));
        }

        match self.insert_row(spec, row).await {
            Ok(stored) => {
                info!(resource = spec.key, id = ?row_id(&stored), files = uploaded.len(), "record created");
                Ok(ResourceRow(stored))
            }
            Err(e) => {
                if !uploaded.is_empty() {
                    self.files.delete_many(&uploaded).await;
                }
                Err(e.into())
            }
        }
    }

    /// Display codes are `prefix + (base + existing rows)`. Two concurrent
    /// creates can compute the same code.
    async fn insert_row(&self, spec: &ResourceSpec, mut row: Row) -> Result<Row, BackendError> {
        if let Some(code) = &spec.display_code {
            let query = SelectQuery::all().columns(&[ID]).range(0, 0).with_count();
            let result = self.db.select(spec.table, &query).await?;
            let existing = result.count.unwrap_or(result.rows.len() as u64);
            row.insert(code.column.to_string(), JsonValue::from(code.render(existing)));
        }
        self.db.insert(spec.table, row).await
    }

    async fn edit(&self, spec: &ResourceSpec, input: EditInput) -> Result<ResourceRow, ServiceError> {
        let patch = input.validate(spec).map_err(ServiceError::Validation)?;
        let existing = self.get(spec, &input.id).await?;
        let plan = self.plan_attachment(spec, &existing, &input.attachment).await?;
        self.commit_edit(spec, &input.id, patch, plan).await
    }

    /// Uploads new files and works out the new column value and which stored
    /// files it supersedes.
    async fn plan_attachment(
        &self,
        spec: &ResourceSpec,
        existing: &ResourceRow,
        change: &AttachmentChange,
    ) -> Result<AttachmentPlan, BackendError> {
        let Some(att) = &spec.attachment else {
            return Ok(AttachmentPlan::default());
        };
        let current = attachment_urls(att, &existing.0);
        let plan = match change {
            AttachmentChange::Keep => AttachmentPlan::default(),
            AttachmentChange::Replace(files) => {
                let uploaded = self.files.upload_all(att.folder, files).await?;
                AttachmentPlan {
                    value: Some(attachment_value(att, &uploaded)),
                    uploaded,
                    superseded: current,
                }
            }
            AttachmentChange::Append(files) => {
                let uploaded = self.files.upload_all(att.folder, files).await?;
                let mut all = current;
                all.extend(uploaded.iter().cloned());
                AttachmentPlan {
                    value: Some(attachment_value(att, &all)),
                    uploaded,
                    superseded: Vec::new(),
                }
            }
            AttachmentChange::Remove => AttachmentPlan {
                value: Some(attachment_value(att, &[])),
                uploaded: Vec::new(),
                superseded: current,
            },
        };
        Ok(plan)
    }

    /// Superseded files go first (best effort), then the single row update.
    /// A failed update removes the files this edit uploaded.
    async fn commit_edit(
        &self,
        spec: &ResourceSpec,
        id: &str,
        mut patch: Row,
        plan: AttachmentPlan,
    ) -> Result<ResourceRow, ServiceError> {
        if let (Some(att), Some(value)) = (&spec.attachment, plan.value) {
            patch.insert(att.column.to_string(), value);
        }
        if !plan.superseded.is_empty() {
            self.files.delete_many(&plan.superseded).await;
        }

        match self.update_one(spec, id, patch).await {
            Ok(row) => {
                info!(resource = spec.key, id = %id, files = plan.uploaded.len(), "record updated");
                Ok(row)
            }
            Err(e) => {
                if !plan.uploaded.is_empty() {
                    self.files.delete_many(&plan.uploaded).await;
                }
                Err(e)
            }
        }
    }

    async fn update_one(&self, spec: &ResourceSpec, id: &str, patch: Row) -> Result<ResourceRow, ServiceError> {
        let rows = self.db.update(spec.table, &[id_filter(id)], patch).await?;
        rows.into_iter()
            .next()
            .map(ResourceRow)
            .ok_or_else(|| ServiceError::NotFound(spec.label.to_string()))
    }

    /// Attachment URLs are read first, then the row(s) deleted, then the
    /// files removed in one batch.
    async fn delete_rows(&self, spec: &ResourceSpec, ids: Vec<String>) -> Result<ActionOutcome, ServiceError> {
        let filter = match ids.as_slice() {
            [one] => id_filter(one),
            _ => Filter::In(
                ID.to_string(),
                ids.iter().map(|id| JsonValue::from(id.as_str())).collect(),
            ),
        };

        let mut urls = Vec::new();
        if let Some(att) = &spec.attachment {
            let query = SelectQuery {
                columns: vec![ID.to_string(), att.column.to_string()],
                filters: vec![filter.clone()],
                ..SelectQuery::default()
            };
            for row in self.db.select(spec.table, &query).await?.rows {
                urls.extend(attachment_urls(att, &row));
            }
        }

        let deleted = self.db.delete(spec.table, &[filter]).await?;
        if deleted.is_empty() {
            return Err(ServiceError::NotFound(spec.label.to_string()));
        }
        let deleted_ids: Vec<String> = deleted.iter().filter_map(row_id).collect();
        info!(resource = spec.key, count = deleted_ids.len(), "records deleted");

        let files = self.files.delete_many(&urls).await;
        Ok(ActionOutcome::Deleted {
            ids: deleted_ids,
            files,
        })
    }
}
