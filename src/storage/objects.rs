//! Bucket-scoped object storage contract.

use crate::storage::error::BackendError;
use async_trait::async_trait;
use axum::body::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// One shared bucket, partitioned by folder name per resource.
///
/// Keys are path-like strings: `latest-update/1730000000000_circular.pdf`.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn bucket(&self) -> &str;

    /// Stores an object. Fails if the path already exists.
    async fn upload(&self, path: &str, content_type: &str, data: Bytes)
        -> Result<(), BackendError>;

    /// Publicly reachable URL for `path`. The bucket name appears as a path
    /// segment, which is what `storage_path_from_url` keys on.
    fn public_url(&self, path: &str) -> String;

    /// Removes objects in one call. Returns the paths that were removed;
    /// paths that did not exist are silently skipped.
    async fn remove(&self, paths: &[String]) -> Result<Vec<String>, BackendError>;
}

/// Characters escaped inside a single object path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encodes each segment of an object path, keeping the `/` separators.
pub fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// `<base>/storage/v1/object/public/<bucket>/<path>`, the hosted public URL layout.
pub fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        encode_object_path(path)
    )
}
