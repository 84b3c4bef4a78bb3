//! Blog server with incremental regeneration
//!
//! Pages are rendered from the regeneration cache. The listing and the
//! pre-generated posts are resolved before the server starts listening;
//! any other post is resolved on its first request.

mod error;

pub use error::ServerError;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cache::{PostSlot, RegenerationCache};
use crate::config::{FallbackMode, SiteConfig};
use crate::content::{PostDetail, PostSummary};
use crate::error::BlogError;
use crate::generator::Generator;
use crate::pagination::{Cursor, PostsPagination};
use crate::source::{self, ContentSource, Resolution};
use crate::Blog;

/// Server state shared by every request
pub struct AppState {
    config: SiteConfig,
    source: Arc<dyn ContentSource>,
    cache: RegenerationCache,
    generator: Generator,
}

impl AppState {
    pub fn new(config: SiteConfig, source: Arc<dyn ContentSource>, generator: Generator) -> Self {
        let cache = RegenerationCache::new(config.revalidate_interval());
        Self {
            config,
            source,
            cache,
            generator,
        }
    }

    pub fn from_blog(blog: &Blog) -> Result<Self> {
        Ok(Self::new(
            blog.config.clone(),
            blog.source()?,
            blog.generator()?,
        ))
    }

    /// Resolve the listing and every pre-generated post
    ///
    /// A pre-generated slug that does not exist is an error.
    pub async fn warm(&self) -> Result<(), BlogError> {
        let listing = source::fetch_listing(self.source.as_ref(), &self.config.api).await?;
        self.cache.put_listing(listing).await;

        for slug in &self.config.prerender {
            if resolve_and_store(self, slug).await?.is_none() {
                return Err(BlogError::NotFound {
                    doc_type: self.config.api.document_type.clone(),
                    uid: slug.clone(),
                });
            }
        }

        tracing::info!(
            "Pre-generated the listing and {} posts",
            self.config.prerender.len()
        );
        Ok(())
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(listing_handler))
        .route("/api/posts", get(more_posts_handler))
        .route("/post/:slug", get(post_handler))
        .route("/healthcheck", get(healthcheck))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(blog: &Blog, ip: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState::from_blog(blog)?);
    state.warm().await?;

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!(
        "Pages regenerate every {}s ({:?} fallback).",
        blog.config.revalidate, blog.config.fallback
    );
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ListingParams {
    pages: Option<usize>,
}

async fn listing_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingParams>,
) -> Result<Html<String>, ServerError> {
    let max_pages = state.config.max_pages.max(1);
    let pages = params.pages.unwrap_or(1).clamp(1, max_pages);

    // Replays work on a copy; the cached listing stays at one page
    let mut listing = PostsPagination::clone(&*current_listing(&state).await?);
    for _ in 1..pages {
        if !listing.has_more() {
            break;
        }
        listing.load_more(state.source.as_ref()).await?;
    }

    let more_href =
        (listing.has_more() && pages < max_pages).then(|| format!("/?pages={}", pages + 1));
    let html = state
        .generator
        .listing_page(&listing, more_href.as_deref(), true)?;
    Ok(Html(html))
}

/// First listing page from the cache, fetched if absent
///
/// A stale listing is still returned; the first request to see it
/// starts a background refresh.
async fn current_listing(state: &Arc<AppState>) -> Result<Arc<PostsPagination>, BlogError> {
    if let Some(slot) = state.cache.listing().await {
        if !slot.fresh && state.cache.try_begin_listing_refresh().await {
            let state = state.clone();
            tokio::spawn(async move { refresh_listing(state).await });
        }
        return Ok(slot.listing);
    }

    let listing = source::fetch_listing(state.source.as_ref(), &state.config.api).await?;
    Ok(state.cache.put_listing(listing).await)
}

async fn refresh_listing(state: Arc<AppState>) {
    match source::fetch_listing(state.source.as_ref(), &state.config.api).await {
        Ok(listing) => {
            state.cache.put_listing(listing).await;
            tracing::info!("Regenerated listing");
        }
        Err(e) => {
            tracing::warn!("Listing regeneration failed, keeping stale copy: {}", e);
            state.cache.end_listing_refresh().await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct MorePostsParams {
    cursor: String,
}

#[derive(Debug, Serialize)]
struct MorePostsResponse {
    posts: Vec<PostSummary>,
    html: String,
    next_page: Cursor,
}

/// One further listing page, for the "load more" button
async fn more_posts_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MorePostsParams>,
) -> Result<Json<MorePostsResponse>, ServerError> {
    let page = source::fetch_page(state.source.as_ref(), &params.cursor).await?;
    let html = state.generator.post_cards(&page.results)?;
    Ok(Json(MorePostsResponse {
        posts: page.results,
        html,
        next_page: page.next_page,
    }))
}

async fn post_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, ServerError> {
    match state.cache.post(&slug).await {
        PostSlot::Found { post, fresh } => {
            if !fresh {
                spawn_refresh(&state, &slug).await;
            }
            render_post(&state, &post)
        }
        PostSlot::NotFound => render_not_found(&state, Some(&slug)),
        PostSlot::Pending => render_loading(&state),
        PostSlot::Failed(message) => Err(error::bad_gateway(message)),
        PostSlot::Missing => match state.config.fallback {
            FallbackMode::Blocking => match resolve_and_store(&state, &slug).await? {
                Some(post) => render_post(&state, &post),
                None => render_not_found(&state, Some(&slug)),
            },
            FallbackMode::Placeholder => {
                if state.cache.begin_pending(&slug).await {
                    tracing::debug!("Resolving '{}' in the background", slug);
                    let state = state.clone();
                    tokio::spawn(async move { resolve_in_background(state, slug).await });
                }
                render_loading(&state)
            }
        },
    }
}

async fn healthcheck() -> &'static str {
    "ok"
}

async fn fallback_handler(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    render_not_found(&state, None)
}

fn render_post(state: &AppState, post: &PostDetail) -> Result<Response, ServerError> {
    Ok(Html(state.generator.post_page(post)?).into_response())
}

fn render_not_found(state: &AppState, slug: Option<&str>) -> Result<Response, ServerError> {
    let html = state.generator.not_found_page(slug)?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}

fn render_loading(state: &AppState) -> Result<Response, ServerError> {
    Ok(Html(state.generator.loading_page()?).into_response())
}

/// Resolve a slug and record the terminal state
///
/// Returns `None` when no post has this slug. Failures are left to the
/// caller.
async fn resolve_and_store(
    state: &AppState,
    slug: &str,
) -> Result<Option<Arc<PostDetail>>, BlogError> {
    match source::resolve_post(state.source.as_ref(), &state.config.api, slug).await? {
        Resolution::Found(post) => Ok(Some(state.cache.put_found(slug, post).await)),
        Resolution::NotFound => {
            state.cache.put_not_found(slug).await;
            Ok(None)
        }
    }
}

async fn resolve_in_background(state: Arc<AppState>, slug: String) {
    match resolve_and_store(&state, &slug).await {
        Ok(Some(_)) => tracing::info!("Generated post '{}'", slug),
        Ok(None) => tracing::info!("No post for slug '{}'", slug),
        Err(e) => {
            tracing::error!("Failed to resolve '{}': {}", slug, e);
            state.cache.put_failed(&slug, e.to_string()).await;
        }
    }
}

async fn spawn_refresh(state: &Arc<AppState>, slug: &str) {
    if !state.cache.try_begin_refresh(slug).await {
        return;
    }
    tracing::debug!("Regenerating stale post '{}'", slug);
    let state = state.clone();
    let slug = slug.to_string();
    tokio::spawn(async move { resolve_in_background(state, slug).await });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::I18n;
    use crate::source::MemorySource;
    use crate::content::Document;
    use crate::source::{Query as SearchQuery, SearchResponse};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    /// A content API that is down
    #[derive(Default)]
    struct UnavailableSource {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ContentSource for UnavailableSource {
        async fn query(&self, _query: &SearchQuery) -> crate::error::Result<SearchResponse> {
            Err(BlogError::Api("service unavailable".to_string()))
        }

        async fn fetch_page(&self, _cursor: &str) -> crate::error::Result<SearchResponse> {
            Err(BlogError::Api("service unavailable".to_string()))
        }

        async fn get_by_uid(&self, _doc_type: &str, _uid: &str) -> crate::error::Result<Document> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Err(BlogError::Api("service unavailable".to_string()))
        }
    }

    fn placeholder_config() -> SiteConfig {
        let mut config = config(5);
        config.fallback = FallbackMode::Placeholder;
        config
    }

    /// Request `uri` until it stops answering with the loading page
    async fn settle(state: &Arc<AppState>, uri: &str) -> (StatusCode, String) {
        for _ in 0..50 {
            let (status, body) = get(state, uri).await;
            if !body.contains("http-equiv=\"refresh\"") {
                return (status, body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never left the loading state", uri);
    }

    fn documents(n: usize) -> Arc<MemorySource> {
        let docs = (1..=n)
            .map(|i| {
                json!({
                    "id": format!("id{}", i),
                    "uid": format!("post-{}", i),
                    "type": "post",
                    "first_publication_date": "2021-03-25T19:25:28+0000",
                    "data": {
                        "title": format!("Post {}", i),
                        "subtitle": "Pensando em sincronização",
                        "author": "Joseph Oliveira",
                        "banner": { "url": "https://images.prismic.io/banner.png" },
                        "content": [{
                            "heading": "Introdução",
                            "body": [{ "type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": [] }]
                        }]
                    }
                })
            })
            .collect::<Vec<_>>();
        Arc::new(MemorySource::from_value(serde_json::Value::Array(docs)).unwrap())
    }

    fn config(page_size: usize) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.api.page_size = page_size;
        config
    }

    fn state(config: SiteConfig, source: Arc<MemorySource>) -> Arc<AppState> {
        let generator = Generator::new(&config, I18n::new(&config.language)).unwrap();
        Arc::new(AppState::new(config, source, generator))
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, String) {
        let response = router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_listing() {
        let state = state(config(2), documents(3));
        let (status, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Post 1"));
        assert!(body.contains("Post 2"));
        assert!(!body.contains("Post 3"));
        assert!(body.contains("id=\"load-more\""));
        assert!(body.contains("25 mar 2021"));
    }

    #[tokio::test]
    async fn test_listing_pages_param() {
        let state = state(config(2), documents(5));
        let (status, body) = get(&state, "/?pages=2").await;
        assert_eq!(status, StatusCode::OK);
        for i in 1..=4 {
            assert!(body.contains(&format!("Post {}", i)));
        }
        assert!(!body.contains("Post 5"));

        // Clamped to what exists
        let (_, body) = get(&state, "/?pages=99").await;
        assert!(body.contains("Post 5"));
        assert!(!body.contains("id=\"load-more\""));

        // The cached first page is not grown by replays
        let (_, body) = get(&state, "/").await;
        assert!(!body.contains("Post 3"));
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let source = documents(3);
        let state = state(config(2), source.clone());
        get(&state, "/").await;
        get(&state, "/").await;
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_more_posts_endpoint() {
        let state = state(config(2), documents(3));
        let (status, body) = get(&state, "/api/posts?cursor=memory:post:2:2").await;
        assert_eq!(status, StatusCode::OK);

        let page: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(page["posts"][0]["uid"], "post-3");
        assert!(page["next_page"].is_null());
        assert!(page["html"].as_str().unwrap().contains("data-uid=\"post-3\""));
    }

    #[tokio::test]
    async fn test_more_posts_bad_cursor() {
        let state = state(config(2), documents(3));
        let (status, _) = get(&state, "/api/posts?cursor=https://evil.example/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&state, "/api/posts").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_blocking() {
        let source = documents(1);
        let state = state(config(5), source.clone());

        let (status, body) = get(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1>Post 1</h1>"));
        assert!(body.contains("Joseph Oliveira"));

        // Served from the cache afterwards
        get(&state, "/post/post-1").await;
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_post_not_found() {
        let source = documents(1);
        let state = state(config(5), source.clone());

        let (status, body) = get(&state, "/post/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("nope"));

        let (status, _) = get(&state, "/post/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_post_placeholder() {
        let state = state(placeholder_config(), documents(1));

        let (status, body) = get(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("http-equiv=\"refresh\""));

        let mut resolved = false;
        for _ in 0..50 {
            let (status, body) = get(&state, "/post/post-1").await;
            if status == StatusCode::OK && body.contains("<h1>Post 1</h1>") {
                resolved = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(resolved);
    }

    #[tokio::test]
    async fn test_unknown_slug_placeholder_ends_in_not_found() {
        let state = state(placeholder_config(), documents(1));

        let (status, body) = get(&state, "/post/nope").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("http-equiv=\"refresh\""));

        let (status, body) = settle(&state, "/post/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("nope"));
    }

    #[tokio::test]
    async fn test_failed_placeholder_reported_once_then_retried() {
        let source = Arc::new(UnavailableSource::default());
        let config = placeholder_config();
        let generator = Generator::new(&config, I18n::new(&config.language)).unwrap();
        let state = Arc::new(AppState::new(config, source.clone(), generator));

        let (status, _) = get(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = settle(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);

        // The failure was reported; the next request starts over
        let (status, body) = get(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("http-equiv=\"refresh\""));
        let (status, _) = settle(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_not_found_is_resolved_again() {
        let source = documents(1);
        let mut config = config(5);
        config.revalidate = 0;
        let state = state(config, source.clone());

        let (status, _) = get(&state, "/post/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&state, "/post/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_post_is_served_and_refreshed() {
        let source = documents(1);
        let mut config = config(5);
        config.revalidate = 0;
        let state = state(config, source.clone());

        get(&state, "/post/post-1").await;
        let (status, body) = get(&state, "/post/post-1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<h1>Post 1</h1>"));

        for _ in 0..50 {
            if source.request_count() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(source.request_count() >= 2);
    }

    #[tokio::test]
    async fn test_warm_prerenders() {
        let source = documents(2);
        let mut config = config(5);
        config.prerender = vec!["post-2".to_string()];
        let state = state(config, source.clone());

        state.warm().await.unwrap();
        let requests = source.request_count();
        let (status, _) = get(&state, "/post/post-2").await;
        assert_eq!(status, StatusCode::OK);
        get(&state, "/").await;
        assert_eq!(source.request_count(), requests);
    }

    #[tokio::test]
    async fn test_warm_fails_on_unknown_prerender() {
        let mut config = config(5);
        config.prerender = vec!["missing".to_string()];
        let state = state(config, documents(1));
        assert!(state.warm().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_healthcheck_and_fallback() {
        let state = state(config(5), documents(1));
        let (status, body) = get(&state, "/healthcheck").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");

        let (status, _) = get(&state, "/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
