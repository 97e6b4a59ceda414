//! Declarative description of a back-office resource.
//!
//! One `ResourceSpec` per screen drives the generic engine: which table to
//! query, which columns the free-text search covers, how the form validates,
//! where attachments live in the bucket and which row actions apply.

pub mod catalog;
pub mod registry;
pub mod tables;

pub use registry::ResourceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Email,
    /// `YYYY-MM-DD`.
    Date,
    /// One of `FieldSpec::choices`.
    Choice,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::LongText => "long_text",
            FieldKind::Email => "email",
            FieldKind::Date => "date",
            FieldKind::Choice => "choice",
        }
    }
}

/// A form field. `name` is both the form key and the column name.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Message shown when the field is empty; `None` makes it optional.
    pub required: Option<&'static str>,
    pub choices: &'static [&'static str],
    pub invalid_message: Option<&'static str>,
}

impl FieldSpec {
    fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: None,
            choices: &[],
            invalid_message: None,
        }
    }

    pub fn text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn long_text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::LongText)
    }

    pub fn email(name: &'static str, label: &'static str) -> Self {
        let mut f = Self::new(name, label, FieldKind::Email);
        f.invalid_message = Some("Invalid email");
        f
    }

    pub fn date(name: &'static str, label: &'static str) -> Self {
        let mut f = Self::new(name, label, FieldKind::Date);
        f.invalid_message = Some("Please enter a valid date");
        f
    }

    pub fn choice(
        name: &'static str,
        label: &'static str,
        choices: &'static [&'static str],
        invalid: &'static str,
    ) -> Self {
        let mut f = Self::new(name, label, FieldKind::Choice);
        f.choices = choices;
        f.invalid_message = Some(invalid);
        f
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }
}

/// Content-type acceptance rule for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeRule {
    Exact(&'static str),
    /// Any type under a top-level prefix, e.g. `image/`.
    Prefix(&'static str),
}

impl MimeRule {
    pub fn matches(&self, content_type: &str) -> bool {
        let ct = content_type.trim().to_ascii_lowercase();
        match self {
            MimeRule::Exact(t) => ct == *t,
            MimeRule::Prefix(p) => ct.starts_with(p),
        }
    }

    /// `accept` attribute form (`application/pdf`, `image/*`).
    pub fn accept(&self) -> String {
        match self {
            MimeRule::Exact(t) => t.to_string(),
            MimeRule::Prefix(p) => format!("{}*", p),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilePolicy {
    pub accept: &'static [MimeRule],
    pub max_bytes: u64,
    pub type_message: &'static str,
    pub size_message: &'static str,
}

const MB: u64 = 1024 * 1024;

impl FilePolicy {
    pub fn pdf() -> Self {
        Self {
            accept: &[MimeRule::Exact("application/pdf")],
            max_bytes: 10 * MB,
            type_message: "Only PDF files are allowed",
            size_message: "File size should be less than 10 MB",
        }
    }

    pub fn pdf_or_image() -> Self {
        Self {
            accept: &[MimeRule::Exact("application/pdf"), MimeRule::Prefix("image/")],
            max_bytes: 10 * MB,
            type_message: "Only PDF or image files are allowed",
            size_message: "File size should be less than 10 MB",
        }
    }

    pub fn images() -> Self {
        Self {
            accept: &[MimeRule::Prefix("image/")],
            max_bytes: 5 * MB,
            type_message: "Only image files are allowed",
            size_message: "Each image should be less than 5 MB",
        }
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        self.accept.iter().any(|r| r.matches(content_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentArity {
    /// One URL in a text column.
    Single,
    /// Ordered list of URLs in an array column.
    Multiple,
}

#[derive(Debug, Clone)]
pub struct AttachmentSpec {
    pub column: &'static str,
    /// Folder inside the shared bucket.
    pub folder: &'static str,
    pub arity: AttachmentArity,
    pub policy: FilePolicy,
    /// Message shown when a create submission carries no file; `None` makes
    /// the attachment optional.
    pub required_on_create: Option<&'static str>,
}

impl AttachmentSpec {
    pub fn single(column: &'static str, folder: &'static str, policy: FilePolicy) -> Self {
        Self {
            column,
            folder,
            arity: AttachmentArity::Single,
            policy,
            required_on_create: None,
        }
    }

    pub fn multiple(column: &'static str, folder: &'static str, policy: FilePolicy) -> Self {
        Self {
            column,
            folder,
            arity: AttachmentArity::Multiple,
            policy,
            required_on_create: None,
        }
    }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required_on_create = Some(message);
        self
    }

    pub fn is_multiple(&self) -> bool {
        self.arity == AttachmentArity::Multiple
    }
}

/// Informational workflow label. Transitions are never validated; only
/// membership in `values` is.
#[derive(Debug, Clone)]
pub struct StatusSpec {
    pub column: &'static str,
    pub values: &'static [&'static str],
    /// Written on create.
    pub initial: &'static str,
    /// Free-text column updated together with the status, if any.
    pub notes_column: Option<&'static str>,
}

/// Human-facing code generated as `prefix + zero-padded(base + row count)`.
#[derive(Debug, Clone)]
pub struct DisplayCode {
    pub column: &'static str,
    pub prefix: &'static str,
    pub base: u64,
}

impl DisplayCode {
    pub fn render(&self, existing_rows: u64) -> String {
        format!("{}{:05}", self.prefix, self.base + existing_rows)
    }
}

/// Rows that belong to a parent record (applications of one job).
#[derive(Debug, Clone)]
pub struct ParentScope {
    pub column: &'static str,
    pub parent_table: &'static str,
}

#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// URL slug, e.g. `latest-updates`.
    pub key: &'static str,
    /// Singular display name used in notices ("Job created successfully").
    pub label: &'static str,
    /// Plural, lower-case ("Failed to fetch jobs").
    pub plural: &'static str,
    pub table: &'static str,
    pub fields: Vec<FieldSpec>,
    pub search_columns: &'static [&'static str],
    pub attachment: Option<AttachmentSpec>,
    pub status: Option<StatusSpec>,
    /// Has a `visibility` column; new rows start visible.
    pub visibility: bool,
    pub display_code: Option<DisplayCode>,
    pub parent: Option<ParentScope>,
    /// Only users allowed to manage users may touch this resource.
    pub admin_only: bool,
}

pub const VISIBILITY_COLUMN: &str = "visibility";

impl ResourceSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn search_columns(&self) -> Vec<String> {
        self.search_columns.iter().map(|c| c.to_string()).collect()
    }

    pub fn attachment_column(&self) -> Option<&'static str> {
        self.attachment.as_ref().map(|a| a.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_rules() {
        let pdf = FilePolicy::pdf();
        assert!(pdf.accepts("application/pdf"));
        assert!(pdf.accepts("Application/PDF"));
        assert!(!pdf.accepts("image/png"));

        let mixed = FilePolicy::pdf_or_image();
        assert!(mixed.accepts("image/jpeg"));
        assert!(mixed.accepts("application/pdf"));
        assert!(!mixed.accepts("text/plain"));

        assert_eq!(MimeRule::Prefix("image/").accept(), "image/*");
    }

    #[test]
    fn display_code_is_padded() {
        let code = DisplayCode {
            column: "doc_id",
            prefix: "DOC",
            base: 1,
        };
        assert_eq!(code.render(0), "DOC00001");
        assert_eq!(code.render(41), "DOC00042");
    }
}
