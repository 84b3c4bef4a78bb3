//! Incremental listing pagination
//!
//! The listing starts from the first page fetched at build or
//! regeneration time and grows one page at a time as the reader asks
//! for more. The sequence is append-only and keeps API order.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

use crate::content::PostSummary;
use crate::error::Result;
use crate::source::{self, ContentSource};

/// Reference to the next page of results
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cursor {
    /// Opaque reference understood by the content source
    Next(String),
    /// No further pages
    #[default]
    End,
}

impl Cursor {
    pub fn from_option(next: Option<String>) -> Self {
        match next {
            Some(next) if !next.is_empty() => Cursor::Next(next),
            _ => Cursor::End,
        }
    }

    pub fn has_more(&self) -> bool {
        matches!(self, Cursor::Next(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cursor::Next(next) => Some(next),
            Cursor::End => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCursor {
    Url(String),
    Flag(bool),
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Option::<RawCursor>::deserialize(deserializer)? {
            Some(RawCursor::Url(url)) => Ok(Cursor::from_option(Some(url))),
            Some(RawCursor::Flag(false)) | None => Ok(Cursor::End),
            Some(RawCursor::Flag(true)) => Err(de::Error::custom(
                "next_page is `true` but carries no page reference",
            )),
        }
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.as_str().serialize(serializer)
    }
}

/// One page of post summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostsPage {
    pub results: Vec<PostSummary>,
    pub next_page: Cursor,
}

/// Accumulated listing: post summaries plus the cursor to the next page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostsPagination {
    posts: Vec<PostSummary>,
    next_page: Cursor,
    seen: HashSet<String>,
}

impl PostsPagination {
    /// Start from a first page
    pub fn new(page: PostsPage) -> Self {
        let mut pagination = Self {
            posts: Vec::with_capacity(page.results.len()),
            next_page: Cursor::End,
            seen: HashSet::new(),
        };
        pagination.append(page);
        pagination
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn next_page(&self) -> &Cursor {
        &self.next_page
    }

    /// Whether a further page exists
    pub fn has_more(&self) -> bool {
        self.next_page.has_more()
    }

    /// Take in a fetched page; returns how many posts were appended
    ///
    /// Posts whose uid is already listed are skipped, so pages that
    /// overlap (content published between two requests) never show the
    /// same post twice.
    pub fn append(&mut self, page: PostsPage) -> usize {
        let before = self.posts.len();
        let total = page.results.len();

        for post in page.results {
            if self.seen.insert(post.uid.clone()) {
                self.posts.push(post);
            }
        }
        self.next_page = page.next_page;

        let added = self.posts.len() - before;
        if added < total {
            tracing::debug!("Skipped {} duplicate posts", total - added);
        }
        added
    }

    /// Fetch the next page and append it
    ///
    /// Returns `Ok(0)` without any request once pagination has ended. On
    /// failure the listing and cursor are left untouched so the same
    /// page can be requested again.
    pub async fn load_more(&mut self, source: &dyn ContentSource) -> Result<usize> {
        let Cursor::Next(cursor) = &self.next_page else {
            return Ok(0);
        };

        let page = source::fetch_page(source, cursor).await?;
        let added = self.append(page);
        tracing::debug!(
            "Loaded {} more posts ({} total, more: {})",
            added,
            self.posts.len(),
            self.has_more()
        );
        Ok(added)
    }
}
