//! Content-addressed storage lookups and best-effort enrichment.

use crate::error::ContentError;
use crate::record::ContentRef;
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Marker shown in place of a content reference that could not be resolved.
pub const NO_EXTERNAL_DATA: &str = "none";

const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Read/write access to a content-addressed blob store holding JSON documents.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the JSON document stored under `content`.
    async fn get(&self, content: &ContentRef) -> Result<Value, ContentError>;

    /// Store a JSON document and return its reference.
    async fn put(&self, value: &Value) -> Result<ContentRef, ContentError>;
}

/// Outcome of an enrichment attempt for one log position.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentData {
    Resolved(Value),
    Unavailable,
}

/// Display fields derived from a content reference and its lookup outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayData {
    /// Human-readable data, or the raw reference when unresolved.
    pub data: String,
    /// The resolved reference, or [`NO_EXTERNAL_DATA`].
    pub ipfs_data: String,
}

impl DisplayData {
    /// Build display fields, reading `field` out of a resolved document.
    ///
    /// Unresolved or missing outcomes fall back to the raw reference plus
    /// the [`NO_EXTERNAL_DATA`] marker.
    pub fn resolve(content: &ContentRef, outcome: Option<&ContentData>, field: &str) -> Self {
        match outcome {
            Some(ContentData::Resolved(value)) => {
                let data = match value.get(field).unwrap_or(value) {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                DisplayData {
                    data,
                    ipfs_data: content.to_string(),
                }
            }
            Some(ContentData::Unavailable) | None => DisplayData {
                data: content.to_string(),
                ipfs_data: NO_EXTERNAL_DATA.to_string(),
            },
        }
    }
}

/// Resolves content references with a bounded wait.
///
/// Never fails: lookups that error, time out, or target a reference that
/// is not content-addressed yield [`ContentData::Unavailable`].
#[derive(Clone)]
pub struct Enricher {
    store: Option<Arc<dyn ContentStore>>,
    timeout: Duration,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("has_store", &self.store.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Enricher {
    pub fn new(store: Option<Arc<dyn ContentStore>>, timeout: Duration) -> Self {
        Enricher { store, timeout }
    }

    pub async fn enrich(&self, content: &ContentRef) -> ContentData {
        let Some(store) = &self.store else {
            return ContentData::Unavailable;
        };
        if !content.is_addressable() {
            debug!("bountyfold: '{content}' is not a content reference, skipping lookup");
            return ContentData::Unavailable;
        }

        match tokio::time::timeout(self.timeout, store.get(content)).await {
            Ok(Ok(value)) => ContentData::Resolved(value),
            Ok(Err(e)) => {
                warn!("bountyfold: lookup of {content} failed: {e}");
                ContentData::Unavailable
            }
            Err(_) => {
                warn!(
                    "bountyfold: lookup of {content} timed out after {:?}",
                    self.timeout
                );
                ContentData::Unavailable
            }
        }
    }
}

/// An in-process [`ContentStore`].
///
/// References produced by [`ContentStore::put`] are CIDv0-shaped digests of
/// the document's canonical JSON, so they pass
/// [`ContentRef::is_addressable`]. Failures and latency can be injected per
/// reference.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    documents: HashMap<ContentRef, Value>,
    failing: HashSet<ContentRef>,
    delays: HashMap<ContentRef, Duration>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under an explicit reference.
    pub fn insert(&self, content: impl Into<ContentRef>, value: Value) {
        self.lock().documents.insert(content.into(), value);
    }

    /// Make every lookup of `content` fail.
    pub fn fail(&self, content: impl Into<ContentRef>) {
        self.lock().failing.insert(content.into());
    }

    /// Delay every lookup of `content` by `delay`.
    pub fn delay(&self, content: impl Into<ContentRef>, delay: Duration) {
        self.lock().delays.insert(content.into(), delay);
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get(&self, content: &ContentRef) -> Result<Value, ContentError> {
        let delay = self.lock().delays.get(content).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.lock();
        if inner.failing.contains(content) {
            return Err(ContentError::Backend(format!("lookup of {content} refused")));
        }
        inner
            .documents
            .get(content)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(content.clone()))
    }

    async fn put(&self, value: &Value) -> Result<ContentRef, ContentError> {
        let bytes = serde_json::to_vec(value)?;
        let content = digest_ref(&bytes);
        self.lock().documents.insert(content.clone(), value.clone());
        Ok(content)
    }
}

/// Derive a 46-character `Qm...` reference from three xxh64 digests.
fn digest_ref(bytes: &[u8]) -> ContentRef {
    let digest: Vec<u8> = (0..3u64)
        .flat_map(|seed| xxhash_rust::xxh64::xxh64(bytes, seed).to_be_bytes())
        .collect();
    let mut reference = String::from("Qm");
    reference.extend(
        digest
            .iter()
            .cycle()
            .zip(0u8..)
            .take(44)
            .map(|(byte, i)| BASE58[(byte.wrapping_add(i) as usize) % BASE58.len()] as char),
    );
    ContentRef::new(reference)
}
