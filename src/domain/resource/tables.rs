//! Table names, referenced through these constants only.

pub const JOBS: &str = "jobs";
pub const JOB_APPLICATIONS: &str = "job_applications";
pub const FACULTY_STAFF: &str = "faculty_staff";
pub const LATEST_UPDATES: &str = "latest_updates";
pub const MANDATORY_DISCLOSURE: &str = "mandatory_disclosure";
pub const NEWS_MEDIA: &str = "news_media";
pub const PHOTO_GALLERY: &str = "photo_gallery";
pub const TRANSFER_CERTIFICATES: &str = "transfer_certificates";
pub const USERS_ROLES: &str = "users_roles";

pub const ALL: [&str; 9] = [
    JOBS,
    JOB_APPLICATIONS,
    FACULTY_STAFF,
    LATEST_UPDATES,
    MANDATORY_DISCLOSURE,
    NEWS_MEDIA,
    PHOTO_GALLERY,
    TRANSFER_CERTIFICATES,
    USERS_ROLES,
];
