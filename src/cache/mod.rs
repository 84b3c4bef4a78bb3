//! Regeneration cache
//!
//! Holds the listing's first page and every resolved post for the
//! regeneration interval. Past the interval a post is stale: it is
//! still served, and the first request to notice claims a single
//! background refresh. Negative entries (unknown slugs, failures) are
//! dropped once stale and capped in number.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::content::PostDetail;
use crate::pagination::PostsPagination;

/// A cached value with the time it was produced
#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    at: Instant,
}

impl<T> Stamped<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.at.elapsed() < ttl
    }
}

/// State of one slug
#[derive(Debug, Clone)]
enum Entry {
    /// First resolution running in the background
    Pending,
    Found(Stamped<Arc<PostDetail>>),
    NotFound(Stamped<()>),
    /// Last resolution failed; reported once, then forgotten
    Failed(Stamped<String>),
}

impl Entry {
    /// Time a negative entry was recorded
    fn negative_since(&self) -> Option<Instant> {
        match self {
            Entry::NotFound(s) => Some(s.at),
            Entry::Failed(s) => Some(s.at),
            Entry::Pending | Entry::Found(_) => None,
        }
    }
}

/// What the cache knows about a slug
#[derive(Debug, Clone)]
pub enum PostSlot {
    /// Never resolved (or forgotten after a failure)
    Missing,
    /// Resolution in progress
    Pending,
    Found { post: Arc<PostDetail>, fresh: bool },
    /// Known not to exist, within the regeneration interval
    NotFound,
    Failed(String),
}

/// Cached listing with its freshness
#[derive(Debug, Clone)]
pub struct ListingSlot {
    pub listing: Arc<PostsPagination>,
    pub fresh: bool,
}

/// Cache of resolved pages, keyed by slug
#[derive(Debug)]
pub struct RegenerationCache {
    ttl: Duration,
    negative_limit: usize,
    listing: RwLock<Option<Stamped<Arc<PostsPagination>>>>,
    posts: RwLock<HashMap<String, Entry>>,
    refreshing: RwLock<HashSet<String>>,
}

/// Refresh key of the listing
const LISTING_KEY: &str = "/";

/// Default bound on unknown and failed slugs kept at once
pub const NEGATIVE_ENTRY_LIMIT: usize = 1024;

impl RegenerationCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_negative_limit(ttl, NEGATIVE_ENTRY_LIMIT)
    }

    /// Cache keeping at most `limit` unknown or failed slugs
    pub fn with_negative_limit(ttl: Duration, limit: usize) -> Self {
        Self {
            ttl,
            negative_limit: limit.max(1),
            listing: RwLock::new(None),
            posts: RwLock::new(HashMap::new()),
            refreshing: RwLock::new(HashSet::new()),
        }
    }

    pub async fn listing(&self) -> Option<ListingSlot> {
        self.listing.read().await.as_ref().map(|s| ListingSlot {
            listing: s.value.clone(),
            fresh: s.is_fresh(self.ttl),
        })
    }

    pub async fn put_listing(&self, listing: PostsPagination) -> Arc<PostsPagination> {
        let listing = Arc::new(listing);
        *self.listing.write().await = Some(Stamped::new(listing.clone()));
        self.end_refresh(LISTING_KEY).await;
        listing
    }

    /// Look a slug up
    ///
    /// A `Failed` entry is handed out once and dropped. A stale
    /// `NotFound` entry is dropped and reported as `Missing`, so the
    /// slug is resolved again.
    pub async fn post(&self, slug: &str) -> PostSlot {
        {
            let posts = self.posts.read().await;
            match posts.get(slug) {
                Some(Entry::Failed(_)) => {}
                Some(Entry::NotFound(s)) if !s.is_fresh(self.ttl) => {}
                entry => return self.slot(entry),
            }
        }

        let mut posts = self.posts.write().await;
        match posts.get(slug) {
            Some(Entry::Failed(_)) => {
                if let Some(Entry::Failed(s)) = posts.remove(slug) {
                    return PostSlot::Failed(s.value);
                }
            }
            Some(Entry::NotFound(s)) if !s.is_fresh(self.ttl) => {
                posts.remove(slug);
            }
            _ => {}
        }
        self.slot(posts.get(slug))
    }

    fn slot(&self, entry: Option<&Entry>) -> PostSlot {
        match entry {
            None => PostSlot::Missing,
            Some(Entry::Pending) => PostSlot::Pending,
            Some(Entry::Found(s)) => PostSlot::Found {
                post: s.value.clone(),
                fresh: s.is_fresh(self.ttl),
            },
            Some(Entry::NotFound(_)) => PostSlot::NotFound,
            Some(Entry::Failed(s)) => PostSlot::Failed(s.value.clone()),
        }
    }

    /// Mark a missing slug as being resolved; false if someone else got there first
    pub async fn begin_pending(&self, slug: &str) -> bool {
        let mut posts = self.posts.write().await;
        if posts.contains_key(slug) {
            return false;
        }
        posts.insert(slug.to_string(), Entry::Pending);
        true
    }

    pub async fn put_found(&self, slug: &str, post: PostDetail) -> Arc<PostDetail> {
        let post = Arc::new(post);
        self.posts
            .write()
            .await
            .insert(slug.to_string(), Entry::Found(Stamped::new(post.clone())));
        self.end_refresh(slug).await;
        post
    }

    pub async fn put_not_found(&self, slug: &str) {
        let mut posts = self.posts.write().await;
        self.make_room_for_negative(&mut posts, slug);
        posts.insert(slug.to_string(), Entry::NotFound(Stamped::new(())));
        drop(posts);
        self.end_refresh(slug).await;
    }

    /// Record a failed resolution
    ///
    /// A first resolution becomes `Failed`; a failed refresh keeps the
    /// stale entry in place.
    pub async fn put_failed(&self, slug: &str, message: String) {
        let mut posts = self.posts.write().await;
        let keep_stale = matches!(
            posts.get(slug),
            Some(Entry::Found(_)) | Some(Entry::NotFound(_))
        );
        if !keep_stale {
            self.make_room_for_negative(&mut posts, slug);
            posts.insert(slug.to_string(), Entry::Failed(Stamped::new(message)));
        }
        drop(posts);
        self.end_refresh(slug).await;
    }

    /// Keep negative entries under the limit before `slug` gets one
    ///
    /// Stale ones go first, then the oldest.
    fn make_room_for_negative(&self, posts: &mut HashMap<String, Entry>, slug: &str) {
        let count = |posts: &HashMap<String, Entry>| {
            posts
                .iter()
                .filter(|(key, entry)| key.as_str() != slug && entry.negative_since().is_some())
                .count()
        };
        if count(posts) < self.negative_limit {
            return;
        }

        let ttl = self.ttl;
        posts.retain(|_, entry| match entry.negative_since() {
            Some(at) => at.elapsed() < ttl,
            None => true,
        });

        let excess = (count(posts) + 1).saturating_sub(self.negative_limit);
        if excess > 0 {
            let mut oldest: Vec<(Instant, String)> = posts
                .iter()
                .filter(|(key, _)| key.as_str() != slug)
                .filter_map(|(key, entry)| entry.negative_since().map(|at| (at, key.clone())))
                .collect();
            oldest.sort();
            for (_, key) in oldest.into_iter().take(excess) {
                posts.remove(&key);
            }
            tracing::debug!("Evicted {} negative cache entries", excess);
        }
    }

    /// Claim the background refresh of a stale post; false if already claimed
    pub async fn try_begin_refresh(&self, slug: &str) -> bool {
        self.refreshing.write().await.insert(slug.to_string())
    }

    /// Claim the background refresh of a stale listing
    pub async fn try_begin_listing_refresh(&self) -> bool {
        self.try_begin_refresh(LISTING_KEY).await
    }

    /// Release a listing refresh claim after a failed refresh
    pub async fn end_listing_refresh(&self) {
        self.end_refresh(LISTING_KEY).await;
    }

    async fn end_refresh(&self, key: &str) {
        self.refreshing.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Banner;
    use crate::pagination::PostsPage;

    fn post(uid: &str) -> PostDetail {
        PostDetail {
            uid: uid.to_string(),
            first_publication_date: None,
            last_publication_date: None,
            title: uid.to_string(),
            subtitle: String::new(),
            author: String::new(),
            banner: Banner::default(),
            content: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_then_found() {
        let cache = RegenerationCache::new(Duration::from_secs(60));
        assert!(matches!(cache.post("a").await, PostSlot::Missing));

        cache.put_found("a", post("a")).await;
        match cache.post("a").await {
            PostSlot::Found { post, fresh } => {
                assert_eq!(post.uid, "a");
                assert!(fresh);
            }
            other => panic!("unexpected slot {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pending_is_claimed_once() {
        let cache = RegenerationCache::new(Duration::from_secs(60));
        assert!(cache.begin_pending("a").await);
        assert!(!cache.begin_pending("a").await);
        assert!(matches!(cache.post("a").await, PostSlot::Pending));

        cache.put_not_found("a").await;
        assert!(matches!(cache.post("a").await, PostSlot::NotFound));
    }

    #[tokio::test]
    async fn test_stale_not_found_is_dropped() {
        let cache = RegenerationCache::new(Duration::ZERO);
        cache.put_not_found("a").await;
        assert!(matches!(cache.post("a").await, PostSlot::Missing));
        assert!(cache.posts.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_negative_entries_are_capped() {
        let cache = RegenerationCache::with_negative_limit(Duration::from_secs(60), 3);
        cache.put_found("kept", post("kept")).await;
        for i in 0..100 {
            cache.put_not_found(&format!("junk-{}", i)).await;
        }
        cache.put_failed("broken", "down".to_string()).await;

        let posts = cache.posts.read().await;
        assert_eq!(posts.len(), 4);
        assert!(posts.contains_key("kept"));
        assert!(posts.contains_key("broken"));
        assert!(posts.contains_key("junk-99"));
        assert!(!posts.contains_key("junk-0"));
    }

    #[tokio::test]
    async fn test_failure_reported_once() {
        let cache = RegenerationCache::new(Duration::from_secs(60));
        cache.begin_pending("a").await;
        cache.put_failed("a", "boom".to_string()).await;

        assert!(matches!(cache.post("a").await, PostSlot::Failed(m) if m == "boom"));
        assert!(matches!(cache.post("a").await, PostSlot::Missing));
    }

    #[tokio::test]
    async fn test_stale_entries_still_served() {
        let cache = RegenerationCache::new(Duration::ZERO);
        cache.put_found("a", post("a")).await;
        assert!(matches!(
            cache.post("a").await,
            PostSlot::Found { fresh: false, .. }
        ));

        // Only one refresh at a time
        assert!(cache.try_begin_refresh("a").await);
        assert!(!cache.try_begin_refresh("a").await);

        // A failed refresh keeps the stale post and releases the claim
        cache.put_failed("a", "down".to_string()).await;
        assert!(matches!(cache.post("a").await, PostSlot::Found { .. }));
        assert!(cache.try_begin_refresh("a").await);
    }

    #[tokio::test]
    async fn test_listing_freshness() {
        let cache = RegenerationCache::new(Duration::from_secs(60));
        assert!(cache.listing().await.is_none());

        cache
            .put_listing(PostsPagination::new(PostsPage::default()))
            .await;
        let slot = cache.listing().await.unwrap();
        assert!(slot.fresh);
        assert!(slot.listing.posts().is_empty());

        assert!(cache.try_begin_listing_refresh().await);
        assert!(!cache.try_begin_listing_refresh().await);
        cache.end_listing_refresh().await;
        assert!(cache.try_begin_listing_refresh().await);
    }
}
