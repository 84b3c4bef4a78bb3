//! List posts

use anyhow::Result;
use std::collections::HashSet;

use crate::helpers;
use crate::source;
use crate::Blog;

/// Print the listing; `all` follows the cursor to the last page
pub async fn run(blog: &Blog, all: bool) -> Result<()> {
    let source = blog.source()?;
    let mut listing = source::fetch_listing(source.as_ref(), &blog.config.api).await?;

    if all {
        // A cursor seen twice means the API is going in circles
        let mut visited = HashSet::new();
        while let Some(cursor) = listing.next_page().as_str() {
            if !visited.insert(cursor.to_string()) {
                tracing::warn!("Pagination revisited cursor {}, stopping", cursor);
                break;
            }
            listing.load_more(source.as_ref()).await?;
        }
    }

    println!("Posts ({}):", listing.posts().len());
    for post in listing.posts() {
        let date = match &post.first_publication_date {
            Some(date) => helpers::format_date(date, &blog.config.language)?,
            None => "-".to_string(),
        };
        println!("  {} - {} [{}]", date, post.title, post.uid);
    }
    if listing.has_more() {
        println!("  ... more available (use --all)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Document;
    use crate::error::BlogError;
    use crate::pagination::Cursor;
    use crate::source::{ContentSource, MemorySource, Query, SearchResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Every page points back at itself
    struct CyclingSource {
        pages: AtomicUsize,
    }

    #[async_trait]
    impl ContentSource for CyclingSource {
        async fn query(&self, _query: &Query) -> crate::error::Result<SearchResponse> {
            self.fetch_page("again").await
        }

        async fn fetch_page(&self, _cursor: &str) -> crate::error::Result<SearchResponse> {
            self.pages.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResponse {
                results: vec![serde_json::from_value(
                    json!({ "id": "1", "uid": "p1", "type": "post", "data": {} }),
                )?],
                next_page: Cursor::Next("again".to_string()),
            })
        }

        async fn get_by_uid(&self, doc_type: &str, uid: &str) -> crate::error::Result<Document> {
            Err(BlogError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_list_all_stops_on_repeated_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(CyclingSource {
            pages: AtomicUsize::new(0),
        });
        let blog = Blog::new(dir.path()).unwrap().with_source(source.clone());

        run(&blog, true).await.unwrap();
        // First page, then the cursor once before it repeats
        assert_eq!(source.pages.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_all_drains_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let docs = (1..=7)
            .map(|i| json!({ "id": i.to_string(), "uid": format!("p{}", i), "type": "post", "data": {} }))
            .collect::<Vec<_>>();
        let source = Arc::new(MemorySource::from_value(serde_json::Value::Array(docs)).unwrap());
        let blog = Blog::new(dir.path()).unwrap().with_source(source.clone());

        run(&blog, true).await.unwrap();
        // Default page size 5: first query plus one page fetch
        assert_eq!(source.request_count(), 2);
    }
}
