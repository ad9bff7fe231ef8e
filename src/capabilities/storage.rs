use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{DownloadUrl, FileHandle, UserId};

/// All listing images live under one namespace in the bucket.
pub const STORAGE_IMAGE_PREFIX: &str = "images/";

pub const MAX_KEY_LENGTH: usize = 512;

/// Path addressing a binary object in the storage service.
///
/// Upload keys are `images/{uid}-{original_file_name}-{uuid}`; the uuid
/// keeps repeated uploads of the same file name from colliding. Keys can
/// also be recovered from a download URL for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, StorageError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(StorageError::InvalidKey {
                reason: "key cannot be empty".to_string(),
            });
        }
        if raw.len() > MAX_KEY_LENGTH {
            return Err(StorageError::InvalidKey {
                reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
            });
        }
        if raw.contains('\0') {
            return Err(StorageError::InvalidKey {
                reason: "key cannot contain null bytes".to_string(),
            });
        }
        if raw.contains("..") {
            return Err(StorageError::InvalidKey {
                reason: "key cannot contain path traversal sequences".to_string(),
            });
        }
        if raw.starts_with('/') {
            return Err(StorageError::InvalidKey {
                reason: "key cannot start with path separator".to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// Key for a fresh upload, globally unique per call.
    pub fn for_upload(owner: &UserId, file_name: &str) -> Result<Self, StorageError> {
        let unique = Uuid::new_v4();
        Self::new(format!("{STORAGE_IMAGE_PREFIX}{owner}-{file_name}-{unique}"))
    }

    /// Recover the storage key of an already-uploaded object from its
    /// download URL: strip query and fragment, take the final path segment,
    /// unescape the encoded separator.
    pub fn from_download_url(url: &str) -> Result<Self, StorageError> {
        let without_fragment = url.split('#').next().unwrap_or(url);
        let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
        let segment = without_query
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::InvalidKey {
                reason: format!("no path segment in url: {url}"),
            })?;
        let unescaped = segment.replace("%2F", "/").replace("%2f", "/");
        Self::new(unescaped)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageOperation {
    Upload { key: StorageKey, file: FileHandle },
    Delete { key: StorageKey },
}

impl Operation for StorageOperation {
    type Output = StorageResult;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageOutput {
    Uploaded { url: DownloadUrl },
    Deleted,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageError {
    #[error("object exceeds the storage size limit of {max_bytes} bytes")]
    ObjectTooLarge { max_bytes: u64 },

    #[error("permission denied")]
    PermissionDenied,

    #[error("object not found")]
    NotFound,

    #[error("invalid storage key: {reason}")]
    InvalidKey { reason: String },

    #[error("storage error: {message}")]
    Backend { message: String },
}

pub type StorageResult = Result<StorageOutput, StorageError>;

#[derive(Clone)]
pub struct ObjectStorage<E> {
    context: CapabilityContext<StorageOperation, E>,
}

impl<Ev> Capability<Ev> for ObjectStorage<Ev> {
    type Operation = StorageOperation;
    type MappedSelf<MappedEv> = ObjectStorage<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        ObjectStorage::new(self.context.map_event(f))
    }
}

impl<E> ObjectStorage<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<StorageOperation, E>) -> Self {
        Self { context }
    }

    /// Start one upload. Each call runs in its own task, so issuing several
    /// uploads in a row puts them all in flight at once; each settles
    /// independently through its own event.
    pub fn upload<F>(&self, key: StorageKey, file: FileHandle, make_event: F)
    where
        F: Fn(StorageResult) -> E + Send + Sync + 'static,
    {
        self.request(StorageOperation::Upload { key, file }, make_event);
    }

    pub fn delete<F>(&self, key: StorageKey, make_event: F)
    where
        F: Fn(StorageResult) -> E + Send + Sync + 'static,
    {
        self.request(StorageOperation::Delete { key }, make_event);
    }

    fn request<F>(&self, operation: StorageOperation, make_event: F)
    where
        F: Fn(StorageResult) -> E + Send + Sync + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(make_event(result));
        });
    }
}
