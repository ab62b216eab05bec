//! Object-store values: buckets, object summaries, listing pages and metadata.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A bucket as reported by the bucket listing.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BucketSummary {
    pub name: String,

    /// Creation date, when the provider reports one.
    pub created_at: Option<DateTime<Utc>>,
}

/// One entry of an object listing.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ObjectSummary {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size_bytes: i64,

    pub etag: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,

    /// Storage class (e.g., STANDARD, GLACIER).
    pub storage_class: Option<String>,
}

/// A single page of a listing plus the cursor for the next one.
///
/// `next_continuation_token` is `None` once the provider has no more pages.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    pub objects: Vec<ObjectSummary>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Metadata of a single object as returned by a HEAD request.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct ObjectMetadata {
    pub bucket: String,
    pub key: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    pub size_bytes: i64,

    pub etag: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,

    pub storage_class: Option<String>,

    /// User-defined metadata (`x-amz-meta-*` without the prefix).
    pub user_metadata: BTreeMap<String, String>,
}

/// Result of a write (upload or copy) into the object store.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct StoredObjectRef {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
}
