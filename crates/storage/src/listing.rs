//! Paginated, S3-style listing on top of `object_store`.
//!
//! Backends list keys in byte order, the same order S3 uses, so a page is cut
//! straight off the backend stream: delimited keys fold into common prefixes
//! as they pass, and the stream is dropped once one entry past the page has
//! been seen. A continuation token is the base64url encoding of the last key
//! (or common prefix) returned and resumes the backend listing after it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Delimiter used when the caller does not supply one
pub const DEFAULT_DELIMITER: &str = "/";
/// Upper bound on entries per page, same as S3
pub const MAX_KEYS: usize = 1000;

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub prefix: String,
    /// `None` lists recursively
    pub delimiter: Option<String>,
    pub max_keys: usize,
    pub continuation_token: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: Some(DEFAULT_DELIMITER.to_string()),
            max_keys: MAX_KEYS,
            continuation_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

impl From<ObjectMeta> for ObjectEntry {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            key: meta.location.to_string(),
            size: meta.size as u64,
            last_modified: meta.last_modified,
            e_tag: meta.e_tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommonPrefix {
    pub prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPage {
    #[serde(default)]
    pub contents: Vec<ObjectEntry>,
    #[serde(default)]
    pub common_prefixes: Vec<CommonPrefix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_continuation_token: Option<String>,
    pub is_truncated: bool,
}

enum Item {
    Object(ObjectEntry),
    Prefix(String),
}

impl Item {
    fn sort_key(&self) -> &str {
        match self {
            Item::Object(entry) => &entry.key,
            Item::Prefix(prefix) => prefix,
        }
    }
}

fn encode_token(marker: &str) -> String {
    URL_SAFE_NO_PAD.encode(marker.as_bytes())
}

fn decode_token(token: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| StorageError::InvalidContinuationToken)?;
    String::from_utf8(bytes).map_err(|_| StorageError::InvalidContinuationToken)
}

/// Storage path for a directory-style prefix such as `"photos/"`.
///
/// Keys are stored raw, so the path is parsed rather than built with
/// `ObjectPath::from`, which would percent-encode characters like `[` or `~`.
pub(crate) fn directory_path(dir: &str) -> Result<Option<ObjectPath>> {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        return Ok(None);
    }
    ObjectPath::parse(dir)
        .map(Some)
        .map_err(|_| StorageError::InvalidKey(dir.to_string()))
}

/// The deepest directory fully contained in `prefix`, used to narrow the backend listing.
fn directory_of(prefix: &str) -> Result<Option<ObjectPath>> {
    match prefix.rfind('/') {
        Some(i) => directory_path(&prefix[..i]),
        None => Ok(None),
    }
}

pub(crate) async fn list_page(store: &dyn ObjectStore, query: &ListQuery) -> Result<ListPage> {
    let marker = query
        .continuation_token
        .as_deref()
        .map(decode_token)
        .transpose()?;
    let dir = directory_of(&query.prefix)?;

    let stream = match marker.as_deref() {
        Some(marker) => {
            let offset =
                ObjectPath::parse(marker).map_err(|_| StorageError::InvalidContinuationToken)?;
            store.list_with_offset(dir.as_ref(), &offset)
        }
        None => store.list(dir.as_ref()),
    };

    collect_page(stream, query, marker.as_deref()).await
}

/// Cut one page off a key-ordered listing stream.
async fn collect_page<S>(
    mut stream: S,
    query: &ListQuery,
    marker: Option<&str>,
) -> Result<ListPage>
where
    S: Stream<Item = object_store::Result<ObjectMeta>> + Unpin,
{
    let prefix = query.prefix.as_str();
    let delimiter = query.delimiter.as_deref().filter(|d| !d.is_empty());
    let max_keys = query.max_keys.clamp(1, MAX_KEYS);

    let mut items: Vec<Item> = Vec::new();
    let mut is_truncated = false;

    while let Some(meta) = stream.try_next().await? {
        let fold_at = {
            let key = meta.location.as_ref();
            match key.strip_prefix(prefix) {
                Some(rest) => {
                    delimiter.and_then(|d| rest.find(d).map(|i| prefix.len() + i + d.len()))
                }
                // keys under a prefix are contiguous, nothing further can match
                None if key > prefix => break,
                None => continue,
            }
        };
        let item = match fold_at {
            Some(end) => Item::Prefix(meta.location.as_ref()[..end].to_string()),
            None => Item::Object(meta.into()),
        };

        if marker.is_some_and(|m| item.sort_key() <= m) {
            continue;
        }
        if items
            .last()
            .is_some_and(|last| last.sort_key() == item.sort_key())
        {
            continue;
        }
        if items.len() == max_keys {
            is_truncated = true;
            break;
        }
        items.push(item);
    }

    let mut page = ListPage {
        is_truncated,
        ..Default::default()
    };
    if is_truncated {
        page.next_continuation_token = items.last().map(|item| encode_token(item.sort_key()));
    }
    for item in items {
        match item {
            Item::Object(entry) => page.contents.push(entry),
            Item::Prefix(prefix) => page.common_prefixes.push(CommonPrefix { prefix }),
        }
    }

    Ok(page)
}
