//! src/services/storage_service.rs
//!
//! StorageService — object-store operations exposed by the gateway. Every
//! call is forwarded to an `ObjectStore`; the only logic kept here is the
//! continuation-token listing loop and the mapping between object keys and
//! files beneath the local transfer directory.

use crate::{
    models::object::{BucketSummary, ObjectMetadata, ObjectSummary, StoredObjectRef},
    services::{
        error::{ServiceError, ServiceResult},
        object_store::{ObjectStore, PutObject, StoredObject},
    },
};
use aws_sdk_s3::primitives::ByteStream;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// StorageService provides the object-store half of the gateway:
/// - List buckets
/// - List every object under a prefix (follows continuation tokens)
/// - Upload bytes, strings or local files
/// - Download objects as streams or into local files
/// - Inspect, copy and delete objects
///
/// Operations without an explicit bucket use `default_bucket`. Local paths
/// are always resolved beneath `transfer_root`.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStore>,

    /// Bucket used when a request does not name one.
    pub default_bucket: String,

    /// Directory on disk that file uploads read from and downloads write to.
    pub transfer_root: PathBuf,
}

impl StorageService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        default_bucket: impl Into<String>,
        transfer_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            default_bucket: default_bucket.into(),
            transfer_root: transfer_root.into(),
        }
    }

    fn bucket_or_default<'a>(&'a self, bucket: Option<&'a str>) -> &'a str {
        match bucket {
            Some(b) if !b.is_empty() => b,
            _ => &self.default_bucket,
        }
    }

    /// Keys only need to be present and within the provider's length limit.
    fn ensure_key_present(&self, key: &str) -> ServiceResult<()> {
        if key.is_empty() {
            return Err(ServiceError::invalid("object key must not be empty"));
        }
        if key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ServiceError::invalid(format!(
                "object key longer than {} bytes",
                MAX_OBJECT_KEY_LEN
            )));
        }
        Ok(())
    }

    /// Resolve a client-supplied relative path beneath `transfer_root`.
    ///
    /// Rejects absolute paths and any `..` component so requests cannot
    /// read or write outside the transfer directory.
    pub fn resolve_local(&self, relative: &str) -> ServiceResult<PathBuf> {
        let path = Path::new(relative);
        if path.is_absolute() {
            return Err(ServiceError::invalid(format!(
                "path `{}` must be relative to the transfer directory",
                relative
            )));
        }
        let mut resolved = self.transfer_root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(ServiceError::invalid(format!(
                        "path `{}` escapes the transfer directory",
                        relative
                    )));
                }
            }
        }
        Ok(resolved)
    }

    pub async fn list_buckets(&self) -> ServiceResult<Vec<BucketSummary>> {
        let buckets = self.store.list_buckets().await?;
        for bucket in &buckets {
            info!("Bucket Name: {}", bucket.name);
        }
        Ok(buckets)
    }

    /// List every object under `prefix`, following continuation tokens
    /// until the provider reports no further pages.
    pub async fn list_all_objects(
        &self,
        bucket: Option<&str>,
        prefix: Option<&str>,
    ) -> ServiceResult<Vec<ObjectSummary>> {
        let bucket = self.bucket_or_default(bucket);
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .store
                .list_objects_page(bucket, prefix, continuation_token.as_deref())
                .await?;
            pages += 1;
            debug!(bucket, page = pages, count = page.objects.len(), "received listing page");
            objects.extend(page.objects);

            match next_token(page.is_truncated, page.next_continuation_token) {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }
        info!(bucket, prefix = prefix.unwrap_or(""), count = objects.len(), "listed objects");
        Ok(objects)
    }

    /// Download every object under `prefix` into `destination_dir`, page by
    /// page. Each file lands at the object key with `prefix` stripped.
    ///
    /// Returns the written paths relative to the transfer directory.
    pub async fn download_prefix(
        &self,
        bucket: Option<&str>,
        prefix: &str,
        destination_dir: &str,
    ) -> ServiceResult<Vec<String>> {
        let bucket = self.bucket_or_default(bucket).to_string();
        let destination = self.resolve_local(destination_dir)?;
        let mut written = Vec::new();

        let mut continuation_token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_objects_page(&bucket, Some(prefix), continuation_token.as_deref())
                .await?;

            for object in &page.objects {
                let relative = object.key.strip_prefix(prefix).unwrap_or(&object.key);
                let relative = relative.trim_start_matches('/');
                if relative.is_empty() || object.key.ends_with('/') {
                    debug!(key = %object.key, "skipping directory marker");
                    continue;
                }
                let target = match join_relative(&destination, relative) {
                    Some(target) => target,
                    None => {
                        warn!(key = %object.key, "skipping key that would escape the destination");
                        continue;
                    }
                };

                let stored = self.store.get_object(&bucket, &object.key).await?;
                write_stream_to_file(stored.body, &target).await?;
                info!("File {} Downloaded in {}", object.key, target.display());

                written.push(self.relative_to_root(&target));
            }

            match next_token(page.is_truncated, page.next_continuation_token) {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(written)
    }

    /// Upload an in-memory body under `key` in the default bucket.
    pub async fn upload_bytes(
        &self,
        key: &str,
        content_type: Option<String>,
        body: Bytes,
    ) -> ServiceResult<StoredObjectRef> {
        self.ensure_key_present(key)?;
        let content_md5 = general_purpose::STANDARD.encode(md5::compute(&body).0);
        let etag = self
            .store
            .put_object(PutObject {
                bucket: self.default_bucket.clone(),
                key: key.to_string(),
                content_type,
                content_md5: Some(content_md5),
                body: ByteStream::from(body),
            })
            .await?;
        info!("File Uploaded Success. ETag: {}", etag.as_deref().unwrap_or(""));

        Ok(StoredObjectRef {
            bucket: self.default_bucket.clone(),
            key: key.to_string(),
            etag,
        })
    }

    /// Store a string payload at `s3_path`.
    pub async fn upload_data(&self, s3_path: &str, data: String) -> ServiceResult<StoredObjectRef> {
        self.upload_bytes(s3_path, Some("text/plain; charset=utf-8".into()), Bytes::from(data))
            .await
    }

    /// Upload a file from the transfer directory to `s3_path/<file name>`.
    pub async fn upload_file(&self, s3_path: &str, local_path: &str) -> ServiceResult<StoredObjectRef> {
        let path = self.resolve_local(local_path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ServiceError::invalid(format!("`{}` has no file name", local_path)))?
            .to_string();

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                info!("Uploading file of size: {} bytes", meta.len());
            }
            Ok(_) => {
                return Err(ServiceError::invalid(format!("`{}` is not a file", local_path)));
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("Local file does not exist at path: {}", local_path);
                return Err(ServiceError::LocalFileNotFound(local_path.to_string()));
            }
            Err(err) => return Err(ServiceError::Io(err)),
        }

        let key = object_key_for_file(s3_path, &file_name);
        self.ensure_key_present(&key)?;
        let body = ByteStream::from_path(&path)
            .await
            .map_err(|err| ServiceError::Io(io::Error::other(err)))?;

        let etag = self
            .store
            .put_object(PutObject {
                bucket: self.default_bucket.clone(),
                key: key.clone(),
                content_type: None,
                content_md5: None,
                body,
            })
            .await?;
        info!("File Uploaded Success. ETag: {}", etag.as_deref().unwrap_or(""));

        Ok(StoredObjectRef {
            bucket: self.default_bucket.clone(),
            key,
            etag,
        })
    }

    /// Open an object for streaming out.
    pub async fn download_object(&self, key: &str) -> ServiceResult<StoredObject> {
        self.ensure_key_present(key)?;
        self.store.get_object(&self.default_bucket, key).await
    }

    /// Write an object to `destination_dir/file_name` beneath the transfer
    /// directory. Defaults: the transfer root itself, and the key's final segment.
    pub async fn download_file(
        &self,
        key: &str,
        destination_dir: Option<&str>,
        file_name: Option<&str>,
    ) -> ServiceResult<String> {
        self.ensure_key_present(key)?;
        let dir = self.resolve_local(destination_dir.unwrap_or("."))?;
        let name = match file_name {
            Some(name) if !name.is_empty() => name,
            _ => key.rsplit('/').next().unwrap_or(key),
        };
        let names_a_file = matches!(
            Path::new(name).components().next_back(),
            Some(Component::Normal(_))
        );
        let target = join_relative(&dir, name)
            .filter(|_| names_a_file)
            .ok_or_else(|| ServiceError::invalid(format!("invalid file name `{}`", name)))?;

        let stored = self.store.get_object(&self.default_bucket, key).await?;
        let etag = stored.metadata.etag.clone();
        write_stream_to_file(stored.body, &target).await?;
        info!(
            "File {} Downloaded in {} and tag: {}",
            key,
            target.display(),
            etag.as_deref().unwrap_or("")
        );

        Ok(self.relative_to_root(&target))
    }

    pub async fn object_metadata(&self, key: &str) -> ServiceResult<ObjectMetadata> {
        self.ensure_key_present(key)?;
        let meta = self.store.head_object(&self.default_bucket, key).await?;
        info!(
            "Successfully retrieved {}/{} of type {}",
            self.default_bucket,
            key,
            meta.content_type.as_deref().unwrap_or("unknown")
        );
        Ok(meta)
    }

    /// Server-side copy into the default bucket.
    pub async fn copy_object(
        &self,
        source_bucket: Option<&str>,
        source_key: &str,
        destination_key: &str,
    ) -> ServiceResult<StoredObjectRef> {
        self.ensure_key_present(source_key)?;
        self.ensure_key_present(destination_key)?;
        let source_bucket = self.bucket_or_default(source_bucket);
        let etag = self
            .store
            .copy_object(source_bucket, source_key, &self.default_bucket, destination_key)
            .await?;
        info!(
            "Copied {}/{} to {}/{}",
            source_bucket, source_key, self.default_bucket, destination_key
        );
        Ok(StoredObjectRef {
            bucket: self.default_bucket.clone(),
            key: destination_key.to_string(),
            etag,
        })
    }

    pub async fn delete_object(&self, key: &str) -> ServiceResult<()> {
        self.ensure_key_present(key)?;
        self.store.delete_object(&self.default_bucket, key).await?;
        debug!(bucket = %self.default_bucket, key, "deleted object");
        Ok(())
    }

    /// Readiness: the default bucket is reachable.
    pub async fn check_ready(&self) -> ServiceResult<()> {
        self.store.head_bucket(&self.default_bucket).await
    }

    fn relative_to_root(&self, path: &Path) -> String {
        path.strip_prefix(&self.transfer_root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Token for the next request, or `None` when listing is complete.
///
/// A truncated page without a token also ends the loop, otherwise the
/// first page would be requested again forever.
fn next_token(is_truncated: bool, token: Option<String>) -> Option<String> {
    match token {
        Some(token) if !token.is_empty() => Some(token),
        _ => {
            if is_truncated {
                warn!("listing reported truncation without a continuation token; stopping");
            }
            None
        }
    }
}

/// `s3_path` joined with `file_name`, inserting a `/` unless one is present.
fn object_key_for_file(s3_path: &str, file_name: &str) -> String {
    if s3_path.is_empty() {
        file_name.to_string()
    } else if s3_path.ends_with('/') {
        format!("{}{}", s3_path, file_name)
    } else {
        format!("{}/{}", s3_path, file_name)
    }
}

/// Join a key-derived relative path onto `base`, refusing anything that
/// is not a plain sequence of normal components.
fn join_relative(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(joined)
}

/// Stream a body into `target` via a temp file in the same directory,
/// renaming it into place once fully written and synced.
async fn write_stream_to_file(mut body: ByteStream, target: &Path) -> ServiceResult<()> {
    let parent = target.parent().map(Path::to_path_buf).ok_or_else(|| {
        ServiceError::Io(io::Error::other("download path missing parent directory"))
    })?;
    fs::create_dir_all(&parent).await?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    let mut file = File::create(&tmp_path).await?;

    loop {
        let chunk = match body.try_next().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ServiceError::Io(io::Error::other(err)));
            }
        };
        if let Err(err) = file.write_all(&chunk).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Io(err));
        }
    }
    if let Err(err) = file.sync_all().await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(ServiceError::Io(err));
    }

    if let Err(err) = fs::rename(&tmp_path, target).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(ServiceError::Io(err));
    }
    Ok(())
}
