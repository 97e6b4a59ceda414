use crate::app::resource_service::{list_failure_notice, saved_notice, DEFAULT_PAGE_SIZE};
use crate::app::{Access, ListParams, Page, ServiceError};
use crate::domain::form::FormInput;
use crate::domain::notice::Notice;
use crate::domain::resource::ResourceSpec;
use crate::transport::http::handlers::common::{resolve_for, FormSubmission};
use crate::transport::http::types::{
    error_response, ok_response, status_for, ApiResponse, AppState, ListQuery, PageResponse,
    ResourceDescriptor, Session,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use tracing::warn;

fn page_response(page: Page) -> PageResponse {
    let page_count = page.page_count();
    PageResponse {
        rows: page.rows.into_iter().map(|r| r.0.into()).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        page_count,
    }
}

#[utoipa::path(
    get,
    path = "/api/resources",
    responses(
        (status = 200, description = "Descriptors (fields, choices, file policy) for every resource", body = ApiResponse),
        (status = 401, description = "No valid session", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_resources_handler(State(state): State<AppState>) -> Response {
    let descriptors: Vec<ResourceDescriptor> = state
        .registry
        .list()
        .iter()
        .map(|spec| ResourceDescriptor::from(spec.as_ref()))
        .collect();
    ok_response(StatusCode::OK, &descriptors, None)
}

#[utoipa::path(
    get,
    path = "/api/resources/{resource}",
    params(
        ("resource" = String, Path, description = "Resource key (e.g. jobs, faculty-staff)"),
        ListQuery
    ),
    responses(
        (status = 200, description = "One page of rows, newest first", body = ApiResponse),
        (status = 400, description = "Invalid paging or missing parent_id", body = ApiResponse),
        (status = 403, description = "Role does not allow this resource", body = ApiResponse),
        (status = 404, description = "Unknown resource", body = ApiResponse),
        (status = 502, description = "Backend read failed; empty page with an error notice", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(resource): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let spec = match resolve_for(&state, &session, &resource, Access::Read) {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    let params = ListParams {
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        search: query.search,
        parent_id: query.parent_id,
    };

    match state.resources.list(&spec, &params).await {
        Ok(page) => ok_response(StatusCode::OK, &page_response(page), None),
        Err(e @ ServiceError::Backend(_)) => list_failure(&spec, &params, e),
        Err(e) => error_response(e),
    }
}

/// Read failures render as an empty page plus a notice.
fn list_failure(spec: &ResourceSpec, params: &ListParams, err: ServiceError) -> Response {
    warn!(resource = spec.key, error = %err, "list request failed");
    let empty = page_response(Page::empty(params));
    let data = serde_json::to_value(&empty).ok();
    (
        status_for(&err),
        Json(ApiResponse::fail(
            err.to_string(),
            data,
            Some(list_failure_notice(spec)),
        )),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/resources/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Resource key"),
        ("id" = String, Path, description = "Row id")
    ),
    responses(
        (status = 200, description = "The stored row (edit-mode prefill)", body = ApiResponse),
        (status = 404, description = "Unknown resource or row", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((resource, id)): Path<(String, String)>,
) -> Response {
    let spec = match resolve_for(&state, &session, &resource, Access::Read) {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    match state.resources.get(&spec, &id).await {
        Ok(row) => ok_response(StatusCode::OK, &row, None),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/resources/{resource}",
    params(("resource" = String, Path, description = "Resource key")),
    request_body(content = String, content_type = "multipart/form-data", description = "multipart/form-data (fields plus `file`/`files` parts) or a flat JSON object; `parent_id` for job applications"),
    responses(
        (status = 201, description = "Row created", body = ApiResponse),
        (status = 400, description = "Validation failed; `data.errors` maps field to message", body = ApiResponse),
        (status = 403, description = "Role cannot create", body = ApiResponse),
        (status = 502, description = "Upload or insert rejected by the backend", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(resource): Path<String>,
    form: FormSubmission,
) -> Response {
    let spec = match resolve_for(&state, &session, &resource, Access::Create) {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    let input = FormInput::from_target(&spec, None, form.values, form.files, None, form.parent_id);
    match state.resources.submit(&spec, input).await {
        Ok(row) => ok_response(StatusCode::CREATED, &row, Some(saved_notice(&spec, false))),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    put,
    path = "/api/resources/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Resource key"),
        ("id" = String, Path, description = "Row id")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "Same shape as create; `attachment_mode` = keep|replace|append|remove"),
    responses(
        (status = 200, description = "Row updated", body = ApiResponse),
        (status = 400, description = "Validation failed", body = ApiResponse),
        (status = 403, description = "Role cannot edit", body = ApiResponse),
        (status = 404, description = "Unknown resource or row", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((resource, id)): Path<(String, String)>,
    form: FormSubmission,
) -> Response {
    let spec = match resolve_for(&state, &session, &resource, Access::Edit) {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    let mode = match form.mode() {
        Ok(mode) => mode,
        Err(e) => return error_response(e),
    };
    if id.trim().is_empty() {
        return error_response(ServiceError::invalid("A row id is required"));
    }
    let input = FormInput::from_target(&spec, Some(&id), form.values, form.files, mode, None);
    match state.resources.submit(&spec, input).await {
        Ok(row) => ok_response(StatusCode::OK, &row, Some(saved_notice(&spec, true))),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/resources/{resource}/{id}/attachments",
    params(
        ("resource" = String, Path, description = "Resource key (multi-file resources only)"),
        ("id" = String, Path, description = "Row id")
    ),
    request_body(content = String, content_type = "multipart/form-data", description = "multipart/form-data with one or more `files` parts"),
    responses(
        (status = 200, description = "Files appended", body = ApiResponse),
        (status = 400, description = "No files, wrong type or too large", body = ApiResponse),
        (status = 404, description = "Unknown resource or row", body = ApiResponse)
    ),
    security(("bearer" = []))
)]
pub async fn append_attachments_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((resource, id)): Path<(String, String)>,
    form: FormSubmission,
) -> Response {
    let spec = match resolve_for(&state, &session, &resource, Access::Edit) {
        Ok(spec) => spec,
        Err(resp) => return resp,
    };
    let count = form.files.len();
    match state.resources.append_attachments(&spec, &id, form.files).await {
        Ok(row) => ok_response(
            StatusCode::OK,
            &row,
            Some(Notice::success(format!("{} file(s) added successfully", count))),
        ),
        Err(e) => error_response(e),
    }
}
