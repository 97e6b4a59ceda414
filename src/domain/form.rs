//! Create/edit form input and its validation.
//!
//! The create and edit paths are separate input types; a caller picks one
//! explicitly (or lets `FormInput::from_target` pick based on whether an
//! identifier is present). Validation never touches the backend.

use crate::domain::resource::{AttachmentSpec, FieldKind, FieldSpec, ResourceSpec};
use crate::storage::database::Row;
use axum::body::Bytes;
use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use validator::ValidateEmail;

/// Error key for single-file attachments.
pub const FILE_KEY: &str = "file";
/// Error key for multi-file attachments.
pub const FILES_KEY: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    /// Falls back to guessing the type from the file name when the client
    /// sent none (or only the generic octet-stream type).
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, data: Bytes) -> Self {
        let file_name = file_name.into();
        let content_type = match content_type.map(str::trim) {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
            _ => mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        Self {
            file_name,
            content_type,
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// What an edit does to the stored attachment(s).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AttachmentChange {
    #[default]
    Keep,
    /// New file(s) supersede the stored ones.
    Replace(Vec<UploadedFile>),
    /// New files are added after the stored ones (multi-file resources).
    Append(Vec<UploadedFile>),
    /// Stored attachment(s) are dropped without a replacement.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentMode {
    Keep,
    Replace,
    Append,
    Remove,
}

impl AttachmentMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Some(AttachmentMode::Keep),
            "replace" => Some(AttachmentMode::Replace),
            "append" => Some(AttachmentMode::Append),
            "remove" => Some(AttachmentMode::Remove),
            _ => None,
        }
    }
}

/// Raw submitted text values keyed by field name.
pub type FormValues = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct CreateInput {
    pub values: FormValues,
    pub files: Vec<UploadedFile>,
    /// Parent record for parent-scoped resources.
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EditInput {
    pub id: String,
    pub values: FormValues,
    pub attachment: AttachmentChange,
}

#[derive(Debug, Clone)]
pub enum FormInput {
    Create(CreateInput),
    Edit(EditInput),
}

impl FormInput {
    /// Create when `target` is `None` (or blank), edit otherwise.
    ///
    /// Without an explicit mode, uploaded files on an edit replace the stored
    /// attachment. On single-file resources `Append` is treated as `Replace`.
    pub fn from_target(
        spec: &ResourceSpec,
        target: Option<&str>,
        values: FormValues,
        files: Vec<UploadedFile>,
        mode: Option<AttachmentMode>,
        parent_id: Option<String>,
    ) -> Self {
        let id = target.map(str::trim).filter(|id| !id.is_empty());
        let Some(id) = id else {
            return FormInput::Create(CreateInput {
                values,
                files,
                parent_id,
            });
        };

        let multiple = spec.attachment.as_ref().map(|a| a.is_multiple()).unwrap_or(false);
        let mode = mode.unwrap_or(if files.is_empty() {
            AttachmentMode::Keep
        } else {
            AttachmentMode::Replace
        });
        let attachment = match mode {
            AttachmentMode::Remove => AttachmentChange::Remove,
            _ if files.is_empty() => AttachmentChange::Keep,
            AttachmentMode::Keep => AttachmentChange::Keep,
            AttachmentMode::Append if multiple => AttachmentChange::Append(files),
            AttachmentMode::Append | AttachmentMode::Replace => AttachmentChange::Replace(files),
        };

        FormInput::Edit(EditInput {
            id: id.to_string(),
            values,
            attachment,
        })
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, FormInput::Edit(_))
    }
}

/// Field name -> message. Only the first message per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// First message, for a one-line summary.
    pub fn first(&self) -> Option<&str> {
        self.0.values().next().map(String::as_str)
    }
}

fn is_valid_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Checks one non-empty value against its field kind.
fn check_value(field: &FieldSpec, value: &str) -> Result<(), String> {
    let invalid = || {
        field
            .invalid_message
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} is invalid", field.label))
    };
    match field.kind {
        FieldKind::Text | FieldKind::LongText => Ok(()),
        FieldKind::Email if value.validate_email() => Ok(()),
        FieldKind::Date if is_valid_date(value) => Ok(()),
        FieldKind::Choice if field.choices.contains(&value) => Ok(()),
        _ => Err(invalid()),
    }
}

fn file_key(att: &AttachmentSpec) -> &'static str {
    if att.is_multiple() {
        FILES_KEY
    } else {
        FILE_KEY
    }
}

fn check_files(spec: &ResourceSpec, files: &[UploadedFile], errors: &mut ValidationErrors) {
    if files.is_empty() {
        return;
    }
    let Some(att) = &spec.attachment else {
        errors.add(FILE_KEY, format!("{} records do not take attachments", spec.label));
        return;
    };
    let key = file_key(att);
    if !att.is_multiple() && files.len() > 1 {
        errors.add(key, "Only one file can be uploaded");
        return;
    }
    for f in files {
        if !att.policy.accepts(&f.content_type) {
            errors.add(key, att.policy.type_message);
        } else if f.size() > att.policy.max_bytes {
            errors.add(key, att.policy.size_message);
        }
    }
}

/// File-only validation for appending to an existing multi-file record.
pub fn validate_appended_files(
    spec: &ResourceSpec,
    files: &[UploadedFile],
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    match &spec.attachment {
        None => errors.add(FILE_KEY, format!("{} records do not take attachments", spec.label)),
        Some(att) if !att.is_multiple() => {
            errors.add(FILE_KEY, format!("{} records hold a single file", spec.label))
        }
        Some(_) if files.is_empty() => errors.add(FILES_KEY, "Select at least one file"),
        Some(_) => check_files(spec, files, &mut errors),
    }
    errors.into_result(())
}

impl CreateInput {
    /// Validates every field and file; returns the column values to insert
    /// (empty optional fields become `null`).
    pub fn validate(&self, spec: &ResourceSpec) -> Result<Row, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut row = Row::new();

        for field in &spec.fields {
            let value = self.values.get(field.name).map(|v| v.trim()).unwrap_or("");
            if value.is_empty() {
                match field.required {
                    Some(msg) => errors.add(field.name, msg),
                    None => {
                        row.insert(field.name.to_string(), JsonValue::Null);
                    }
                }
                continue;
            }
            match check_value(field, value) {
                Ok(()) => {
                    row.insert(field.name.to_string(), JsonValue::from(value));
                }
                Err(msg) => errors.add(field.name, msg),
            }
        }

        if let Some(att) = &spec.attachment {
            if let (Some(msg), true) = (att.required_on_create, self.files.is_empty()) {
                errors.add(file_key(att), msg);
            }
        }
        check_files(spec, &self.files, &mut errors);

        if let Some(parent) = &spec.parent {
            match self.parent_id.as_deref().map(str::trim) {
                Some(p) if !p.is_empty() => {
                    row.insert(parent.column.to_string(), JsonValue::from(p));
                }
                _ => errors.add(parent.column, "A parent record is required"),
            }
        }

        errors.into_result(row)
    }
}

impl EditInput {
    /// Validates the submitted fields; returns the column patch.
    ///
    /// Required fields must be present and non-empty. Optional fields that
    /// were not submitted are left untouched; submitted-but-empty ones are
    /// cleared.
    pub fn validate(&self, spec: &ResourceSpec) -> Result<Row, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut patch = Row::new();

        for field in &spec.fields {
            let Some(raw) = self.values.get(field.name) else {
                if let Some(msg) = field.required {
                    errors.add(field.name, msg);
                }
                continue;
            };
            let value = raw.trim();
            if value.is_empty() {
                match field.required {
                    Some(msg) => errors.add(field.name, msg),
                    None => {
                        patch.insert(field.name.to_string(), JsonValue::Null);
                    }
                }
                continue;
            }
            match check_value(field, value) {
                Ok(()) => {
                    patch.insert(field.name.to_string(), JsonValue::from(value));
                }
                Err(msg) => errors.add(field.name, msg),
            }
        }

        match &self.attachment {
            AttachmentChange::Keep => {}
            AttachmentChange::Replace(files) | AttachmentChange::Append(files) => {
                check_files(spec, files, &mut errors)
            }
            AttachmentChange::Remove => match &spec.attachment {
                Some(att) => {
                    if let Some(msg) = att.required_on_create {
                        errors.add(file_key(att), msg);
                    }
                }
                None => errors.add(FILE_KEY, format!("{} records do not take attachments", spec.label)),
            },
        }

        errors.into_result(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::catalog;

    fn values(pairs: &[(&str, &str)]) -> FormValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn pdf(bytes: usize) -> UploadedFile {
        UploadedFile::new("doc.pdf", Some("application/pdf"), Bytes::from(vec![0u8; bytes]))
    }

    #[test]
    fn staff_name_is_required() {
        let spec = catalog::faculty_staff();
        let input = CreateInput {
            values: values(&[("designation", "Teacher"), ("category", "Teaching")]),
            ..CreateInput::default()
        };
        let errors = input.validate(&spec).unwrap_err();
        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn choice_and_email_messages() {
        let spec = catalog::users_roles();
        let input = CreateInput {
            values: values(&[
                ("name", "A"),
                ("email", "not-an-email"),
                ("role", "Teacher"),
                ("department", "Primary"),
                ("access_level", "Root"),
            ]),
            ..CreateInput::default()
        };
        let errors = input.validate(&spec).unwrap_err();
        assert_eq!(errors.get("email"), Some("Invalid email"));
        assert_eq!(errors.get("access_level"), Some("Please select a valid access level"));
    }

    #[test]
    fn pdf_policy_checks_type_then_size() {
        let spec = catalog::mandatory_disclosure();
        let base = values(&[("title", "Fees")]);

        let missing = CreateInput {
            values: base.clone(),
            ..CreateInput::default()
        };
        assert_eq!(
            missing.validate(&spec).unwrap_err().get(FILE_KEY),
            Some("A PDF file is required")
        );

        let png = CreateInput {
            values: base.clone(),
            files: vec![UploadedFile::new("a.png", None, Bytes::from_static(b"x"))],
            parent_id: None,
        };
        assert_eq!(
            png.validate(&spec).unwrap_err().get(FILE_KEY),
            Some("Only PDF files are allowed")
        );

        let big = CreateInput {
            values: base.clone(),
            files: vec![pdf(10 * 1024 * 1024 + 1)],
            parent_id: None,
        };
        assert_eq!(
            big.validate(&spec).unwrap_err().get(FILE_KEY),
            Some("File size should be less than 10 MB")
        );

        let ok = CreateInput {
            values: base,
            files: vec![pdf(2 * 1024 * 1024)],
            parent_id: None,
        };
        let row = ok.validate(&spec).unwrap();
        assert_eq!(row["title"], "Fees");
        assert!(row["description"].is_null());
    }

    #[test]
    fn content_type_is_guessed_from_name() {
        let f = UploadedFile::new("report.pdf", Some("application/octet-stream"), Bytes::new());
        assert_eq!(f.content_type, "application/pdf");
        let g = UploadedFile::new("photo.jpg", None, Bytes::new());
        assert_eq!(g.content_type, "image/jpeg");
    }

    #[test]
    fn mode_follows_identifier() {
        let spec = catalog::photo_gallery();
        let create = FormInput::from_target(&spec, None, FormValues::new(), vec![], None, None);
        assert!(!create.is_edit());
        let blank = FormInput::from_target(&spec, Some("  "), FormValues::new(), vec![], None, None);
        assert!(!blank.is_edit());

        let img = UploadedFile::new("a.png", None, Bytes::from_static(b"x"));
        match FormInput::from_target(
            &spec,
            Some("3"),
            FormValues::new(),
            vec![img.clone()],
            Some(AttachmentMode::Append),
            None,
        ) {
            FormInput::Edit(e) => assert_eq!(e.attachment, AttachmentChange::Append(vec![img])),
            other => panic!("expected edit, got {:?}", other),
        }
    }

    #[test]
    fn edit_leaves_absent_optional_fields_alone() {
        let spec = catalog::jobs();
        let input = EditInput {
            id: "1".into(),
            values: values(&[
                ("title", "Math Teacher"),
                ("department", "Science"),
                ("subject", "Math"),
                ("last_date_to_apply", "2025-01-31"),
                ("job_type", "Regular"),
            ]),
            attachment: AttachmentChange::Keep,
        };
        let patch = input.validate(&spec).unwrap();
        assert!(!patch.contains_key("description"));
        assert_eq!(patch["job_type"], "Regular");
    }

    #[test]
    fn removing_a_required_attachment_is_refused() {
        let spec = catalog::latest_updates();
        let input = EditInput {
            id: "1".into(),
            values: values(&[("title", "Exam dates")]),
            attachment: AttachmentChange::Remove,
        };
        assert_eq!(
            input.validate(&spec).unwrap_err().get(FILE_KEY),
            Some("A PDF file is required")
        );
    }
}
