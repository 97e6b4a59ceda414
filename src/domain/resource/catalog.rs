//! The school back-office screens, one declarative entry each.

use crate::domain::resource::tables;
use crate::domain::resource::{
    AttachmentSpec, DisplayCode, FieldSpec, FilePolicy, ParentScope, ResourceSpec, StatusSpec,
};

const JOB_TYPES: &[&str] = &["Regular", "Part-Time", "Guest", "Contract"];
const JOB_STATUSES: &[&str] = &["Open", "Closed"];
const APPLICATION_STATUSES: &[&str] = &["New", "Shortlisted", "Interviewed", "Rejected", "Selected"];
const POST_STATUSES: &[&str] = &["New", "Posted", "Deleted"];
const USER_STATUSES: &[&str] = &["Active", "Inactive"];
const ACCESS_LEVELS: &[&str] = &["Admin", "Editor", "Viewer"];

pub fn jobs() -> ResourceSpec {
    ResourceSpec {
        key: "jobs",
        label: "Job",
        plural: "jobs",
        table: tables::JOBS,
        fields: vec![
            FieldSpec::text("title", "Title").required("Title is required"),
            FieldSpec::text("department", "Department").required("Department is required"),
            FieldSpec::text("subject", "Subject").required("Subject is required"),
            FieldSpec::long_text("description", "Description"),
            FieldSpec::date("last_date_to_apply", "Last date to apply")
                .required("Last date to apply is required"),
            FieldSpec::choice("job_type", "Job type", JOB_TYPES, "Please select a valid job type")
                .required("Job type is required"),
        ],
        search_columns: &["title", "department", "subject"],
        attachment: None,
        status: Some(StatusSpec {
            column: "status",
            values: JOB_STATUSES,
            initial: "Open",
            notes_column: None,
        }),
        visibility: true,
        display_code: Some(DisplayCode {
            column: "job_id",
            prefix: "JOB",
            base: 1,
        }),
        parent: None,
        admin_only: false,
    }
}

pub fn job_applications() -> ResourceSpec {
    ResourceSpec {
        key: "job-applications",
        label: "Application",
        plural: "applications",
        table: tables::JOB_APPLICATIONS,
        fields: vec![
            FieldSpec::text("full_name", "Full name").required("Full name is required"),
            FieldSpec::text("phone_no", "Phone number").required("Phone number is required"),
            FieldSpec::email("email_id", "Email").required("Email is required"),
            FieldSpec::date("applied_on", "Applied on").required("Applied date is required"),
            FieldSpec::choice(
                "status",
                "Status",
                APPLICATION_STATUSES,
                "Please select a valid status",
            )
            .required("Status is required"),
            FieldSpec::long_text("notes", "Notes"),
        ],
        search_columns: &["full_name", "email_id", "phone_no"],
        attachment: Some(AttachmentSpec::single(
            "attachment_url",
            "job-applications",
            FilePolicy::pdf(),
        )),
        status: Some(StatusSpec {
            column: "status",
            values: APPLICATION_STATUSES,
            initial: "New",
            notes_column: Some("notes"),
        }),
        visibility: false,
        display_code: None,
        parent: Some(ParentScope {
            column: "job_id",
            parent_table: tables::JOBS,
        }),
        admin_only: false,
    }
}

pub fn faculty_staff() -> ResourceSpec {
    ResourceSpec {
        key: "faculty-staff",
        label: "Staff",
        plural: "staff",
        table: tables::FACULTY_STAFF,
        fields: vec![
            FieldSpec::text("name", "Name").required("Name is required"),
            FieldSpec::text("designation", "Designation").required("Designation is required"),
            FieldSpec::text("category", "Category").required("Category is required"),
        ],
        search_columns: &["name", "designation", "category"],
        attachment: Some(AttachmentSpec::single(
            "attachment",
            "faculty-staff",
            FilePolicy::pdf_or_image(),
        )),
        status: None,
        visibility: true,
        display_code: None,
        parent: None,
        admin_only: false,
    }
}

pub fn latest_updates() -> ResourceSpec {
    ResourceSpec {
        key: "latest-updates",
        label: "Update",
        plural: "updates",
        table: tables::LATEST_UPDATES,
        fields: vec![
            FieldSpec::text("title", "Title").required("Title is required"),
            FieldSpec::long_text("description", "Description"),
        ],
        search_columns: &["title", "description"],
        attachment: Some(
            AttachmentSpec::single("file", "latest-update", FilePolicy::pdf())
                .required("A PDF file is required"),
        ),
        status: Some(StatusSpec {
            column: "status",
            values: POST_STATUSES,
            initial: "New",
            notes_column: None,
        }),
        visibility: true,
        display_code: Some(DisplayCode {
            column: "post_id",
            prefix: "UPD",
            base: 1,
        }),
        parent: None,
        admin_only: false,
    }
}

pub fn mandatory_disclosure() -> ResourceSpec {
    ResourceSpec {
        key: "mandatory-disclosure",
        label: "Disclosure",
        plural: "disclosures",
        table: tables::MANDATORY_DISCLOSURE,
        fields: vec![
            FieldSpec::text("title", "Title").required("Title is required"),
            FieldSpec::long_text("description", "Description"),
        ],
        search_columns: &["title", "description"],
        attachment: Some(
            AttachmentSpec::single("file_url", "mandatory-disclosure", FilePolicy::pdf())
                .required("A PDF file is required"),
        ),
        status: Some(StatusSpec {
            column: "status",
            values: POST_STATUSES,
            initial: "New",
            notes_column: None,
        }),
        visibility: true,
        display_code: Some(DisplayCode {
            column: "doc_id",
            prefix: "DOC",
            base: 1,
        }),
        parent: None,
        admin_only: false,
    }
}

pub fn news_media() -> ResourceSpec {
    ResourceSpec {
        key: "news-media",
        label: "News/Media",
        plural: "news and media",
        table: tables::NEWS_MEDIA,
        fields: vec![
            FieldSpec::text("title", "Title").required("Title is required"),
            FieldSpec::date("event_date", "Event date").required("Event date is required"),
            FieldSpec::long_text("description", "Description"),
        ],
        search_columns: &["title", "description"],
        attachment: Some(
            AttachmentSpec::multiple("images", "news-media", FilePolicy::images())
                .required("Please upload at least one image"),
        ),
        status: Some(StatusSpec {
            column: "status",
            values: POST_STATUSES,
            initial: "New",
            notes_column: None,
        }),
        visibility: true,
        display_code: Some(DisplayCode {
            column: "post_id",
            prefix: "NEWS",
            base: 1,
        }),
        parent: None,
        admin_only: false,
    }
}

pub fn photo_gallery() -> ResourceSpec {
    ResourceSpec {
        key: "photo-gallery",
        label: "Gallery",
        plural: "galleries",
        table: tables::PHOTO_GALLERY,
        fields: vec![
            FieldSpec::text("title", "Title").required("Title is required"),
            FieldSpec::date("event_date", "Event date").required("Event date is required"),
            FieldSpec::long_text("description", "Description"),
        ],
        search_columns: &["title", "description"],
        attachment: Some(
            AttachmentSpec::multiple("images", "photo-gallery", FilePolicy::images())
                .required("Please upload at least one image"),
        ),
        status: None,
        visibility: true,
        display_code: None,
        parent: None,
        admin_only: false,
    }
}

pub fn transfer_certificates() -> ResourceSpec {
    ResourceSpec {
        key: "transfer-certificates",
        label: "TC",
        plural: "transfer certificates",
        table: tables::TRANSFER_CERTIFICATES,
        fields: vec![
            FieldSpec::text("admission_no", "Admission number")
                .required("Admission number is required"),
            FieldSpec::text("student_name", "Student name").required("Student name is required"),
            FieldSpec::date("dob", "Date of birth").required("Date of birth is required"),
            FieldSpec::long_text("description", "Description"),
        ],
        search_columns: &["admission_no", "student_name"],
        attachment: Some(
            AttachmentSpec::single("file_url", "transfer-certificates", FilePolicy::pdf())
                .required("A PDF file is required"),
        ),
        status: None,
        visibility: false,
        display_code: None,
        parent: None,
        admin_only: false,
    }
}

pub fn users_roles() -> ResourceSpec {
    ResourceSpec {
        key: "users-roles",
        label: "User",
        plural: "users",
        table: tables::USERS_ROLES,
        fields: vec![
            FieldSpec::text("name", "Name").required("Name is required"),
            FieldSpec::email("email", "Email").required("Email is required"),
            FieldSpec::text("role", "Role").required("Role is required"),
            FieldSpec::text("department", "Section").required("Section is required"),
            FieldSpec::choice(
                "access_level",
                "Access permissions",
                ACCESS_LEVELS,
                "Please select a valid access level",
            )
            .required("Access permissions are required"),
        ],
        search_columns: &["name", "email", "role", "department"],
        attachment: None,
        status: Some(StatusSpec {
            column: "status",
            values: USER_STATUSES,
            initial: "Active",
            notes_column: None,
        }),
        visibility: false,
        display_code: None,
        parent: None,
        admin_only: true,
    }
}

/// Every screen of the back-office.
pub fn school_resources() -> Vec<ResourceSpec> {
    vec![
        jobs(),
        job_applications(),
        faculty_staff(),
        latest_updates(),
        mandatory_disclosure(),
        news_media(),
        photo_gallery(),
        transfer_certificates(),
        users_roles(),
    ]
}
