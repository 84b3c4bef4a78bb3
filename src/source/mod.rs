//! Content source - where posts come from
//!
//! `ContentSource` is the seam between the views and the headless content
//! API. The production implementation talks HTTP to Prismic; tests and
//! offline previews use an in-memory document list.

mod memory;
mod prismic;

pub use memory::MemorySource;
pub use prismic::PrismicClient;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::content::{Document, PostDetail, PostSummary};
use crate::error::Result;
use crate::pagination::{Cursor, PostsPage, PostsPagination};

/// A listing query: document type filter plus page options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub document_type: String,
    pub page_size: usize,
    pub orderings: Option<String>,
}

impl Query {
    pub fn from_config(api: &ApiConfig) -> Self {
        Self {
            document_type: api.document_type.clone(),
            page_size: api.page_size.max(1),
            orderings: api.orderings.clone(),
        }
    }
}

/// One page of raw search results
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Document>,
    #[serde(default)]
    pub next_page: Cursor,
}

impl SearchResponse {
    /// Convert raw documents into listing summaries
    pub fn into_page(self) -> Result<PostsPage> {
        let results = self
            .results
            .iter()
            .map(PostSummary::from_document)
            .collect::<Result<Vec<_>>>()?;
        Ok(PostsPage {
            results,
            next_page: self.next_page,
        })
    }
}

/// Query and lookup operations of the content API
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// First page of documents matching the query
    async fn query(&self, query: &Query) -> Result<SearchResponse>;

    /// Page referenced by a cursor from an earlier response
    async fn fetch_page(&self, cursor: &str) -> Result<SearchResponse>;

    /// The document of a type with a given uid; `BlogError::NotFound` when absent
    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document>;
}

/// Outcome of resolving a slug
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(PostDetail),
    NotFound,
}

/// Fetch the first listing page
pub async fn fetch_listing(source: &dyn ContentSource, api: &ApiConfig) -> Result<PostsPagination> {
    let response = source.query(&Query::from_config(api)).await?;
    let page = response.into_page()?;
    tracing::debug!(
        "Fetched first page: {} posts (more: {})",
        page.results.len(),
        page.next_page.has_more()
    );
    Ok(PostsPagination::new(page))
}

/// Fetch the page behind a cursor
pub async fn fetch_page(source: &dyn ContentSource, cursor: &str) -> Result<PostsPage> {
    source.fetch_page(cursor).await?.into_page()
}

/// Look a post up by slug
///
/// An unknown slug is the `NotFound` terminal state, not an error; every
/// other failure is returned as is.
pub async fn resolve_post(
    source: &dyn ContentSource,
    api: &ApiConfig,
    slug: &str,
) -> Result<Resolution> {
    match source.get_by_uid(&api.document_type, slug).await {
        Ok(doc) => Ok(Resolution::Found(PostDetail::from_document(&doc)?)),
        Err(e) if e.is_not_found() => {
            tracing::debug!("No post for slug '{}'", slug);
            Ok(Resolution::NotFound)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> MemorySource {
        MemorySource::from_value(json!([
            { "id": "1", "uid": "hello", "type": "post", "data": { "title": "Hello" } },
            { "id": "2", "uid": "world", "type": "post", "data": { "title": "World" } },
            { "id": "3", "uid": "about", "type": "page", "data": { "title": "About" } }
        ]))
        .unwrap()
    }

    #[test]
    fn test_search_response_shape() {
        let response: SearchResponse = serde_json::from_value(json!({
            "page": 1,
            "results_per_page": 5,
            "total_pages": 1,
            "next_page": null,
            "results": [
                { "id": "1", "uid": "hello", "type": "post", "data": { "title": "Hello" } }
            ]
        }))
        .unwrap();
        let page = response.into_page().unwrap();
        assert_eq!(page.results[0].title, "Hello");
        assert_eq!(page.next_page, Cursor::End);
    }

    #[tokio::test]
    async fn test_fetch_listing_filters_type() {
        let listing = fetch_listing(&source(), &ApiConfig::default()).await.unwrap();
        let uids: Vec<_> = listing.posts().iter().map(|p| p.uid.as_str()).collect();
        assert_eq!(uids, vec!["hello", "world"]);
        assert!(!listing.has_more());
    }

    #[tokio::test]
    async fn test_resolve_post_terminal_states() {
        let source = source();
        let api = ApiConfig::default();

        match resolve_post(&source, &api, "hello").await.unwrap() {
            Resolution::Found(post) => assert_eq!(post.title, "Hello"),
            Resolution::NotFound => panic!("expected post"),
        }
        assert_eq!(
            resolve_post(&source, &api, "nope").await.unwrap(),
            Resolution::NotFound
        );
        // A uid of another type is not a post
        assert_eq!(
            resolve_post(&source, &api, "about").await.unwrap(),
            Resolution::NotFound
        );
    }
}
