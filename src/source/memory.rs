//! In-memory content source

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ContentSource, Query, SearchResponse};
use crate::content::Document;
use crate::error::{BlogError, Result};
use crate::pagination::Cursor;

const CURSOR_PREFIX: &str = "memory:";

/// Serves a fixed list of documents, paged like the remote API
///
/// Cursors look like `memory:<type>:<page size>:<page>`.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: Vec<Document>,
    requests: AtomicUsize,
}

impl MemorySource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            requests: AtomicUsize::new(0),
        }
    }

    /// Build from a JSON array of documents or a search response object
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let documents = match value {
            serde_json::Value::Object(mut map) if map.contains_key("results") => {
                serde_json::from_value(map.remove("results").unwrap_or_default())?
            }
            other => serde_json::from_value(other)?,
        };
        Ok(Self::new(documents))
    }

    /// Load a JSON document dump from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let source = Self::from_value(serde_json::from_str(&content)?)?;
        tracing::debug!(
            "Loaded {} documents from {:?}",
            source.documents.len(),
            path.as_ref()
        );
        Ok(source)
    }

    /// Number of queries, page fetches and lookups served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// One page of the documents of a type; `None` when the page lies
    /// beyond any addressable offset
    fn page(&self, doc_type: &str, page_size: usize, page: usize) -> Option<SearchResponse> {
        let matching: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| d.doc_type == doc_type)
            .collect();

        let start = (page - 1).checked_mul(page_size)?;
        let end = start.checked_add(page_size)?;
        let results = matching
            .iter()
            .skip(start)
            .take(page_size)
            .map(|d| (*d).clone())
            .collect();

        let next_page = if end < matching.len() {
            Cursor::Next(format!(
                "{}{}:{}:{}",
                CURSOR_PREFIX,
                doc_type,
                page_size,
                page + 1
            ))
        } else {
            Cursor::End
        };

        Some(SearchResponse { results, next_page })
    }
}

fn parse_cursor(cursor: &str) -> Option<(&str, usize, usize)> {
    let rest = cursor.strip_prefix(CURSOR_PREFIX)?;
    let mut parts = rest.splitn(3, ':');
    let doc_type = parts.next()?;
    let page_size = parts.next()?.parse().ok()?;
    let page = parts.next()?.parse().ok()?;
    (page_size > 0 && page > 0).then_some((doc_type, page_size, page))
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn query(&self, query: &Query) -> Result<SearchResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let page_size = query.page_size.max(1);
        self.page(&query.document_type, page_size, 1).ok_or_else(|| {
            BlogError::InvalidCursor(format!(
                "{}{}:{}:1",
                CURSOR_PREFIX, query.document_type, page_size
            ))
        })
    }

    async fn fetch_page(&self, cursor: &str) -> Result<SearchResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (doc_type, page_size, page) =
            parse_cursor(cursor).ok_or_else(|| BlogError::InvalidCursor(cursor.to_string()))?;
        self.page(doc_type, page_size, page)
            .ok_or_else(|| BlogError::InvalidCursor(cursor.to_string()))
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents
            .iter()
            .find(|d| d.doc_type == doc_type && d.uid.as_deref() == Some(uid))
            .cloned()
            .ok_or_else(|| BlogError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
    }
}
