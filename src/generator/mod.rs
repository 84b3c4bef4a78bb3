//! Generator module - renders the listing and post pages
//!
//! The same renderer backs the live server and the static export under
//! `public_dir`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;

use crate::config::SiteConfig;
use crate::content::rich_text::as_html;
use crate::content::{PostDetail, PostSummary};
use crate::error::{BlogError, Result};
use crate::i18n::I18n;
use crate::pagination::PostsPagination;
use crate::reading_time::ReadingTime;
use crate::source::{self, ContentSource, Resolution};
use crate::templates::{BlockView, PostView, SiteData, TemplateRenderer};

/// Seconds between reloads of the loading placeholder
const LOADING_REFRESH_SECONDS: u64 = 1;

/// Page renderer
pub struct Generator {
    config: SiteConfig,
    i18n: I18n,
    renderer: TemplateRenderer,
}

/// What a static build wrote
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub listing_pages: usize,
    pub posts: Vec<String>,
}

impl Generator {
    /// Create a new generator
    pub fn new(config: &SiteConfig, i18n: I18n) -> Result<Self> {
        let renderer = TemplateRenderer::new(&config.language)?;
        Ok(Self {
            config: config.clone(),
            i18n,
            renderer,
        })
    }

    fn create_base_context(&self, live: bool) -> Context {
        let mut context = Context::new();
        context.insert(
            "site",
            &SiteData {
                title: self.config.title.clone(),
                language: self.i18n.language().to_string(),
            },
        );
        context.insert("t", &self.i18n.get_all_translations());
        context.insert("live", &live);
        context
    }

    /// Listing page; `more_href` is where the "load more" link points without JS
    ///
    /// The control is only shown when it can do something: a live page
    /// loads the next batch by script, a static one needs `more_href`.
    pub fn listing_page(
        &self,
        listing: &PostsPagination,
        more_href: Option<&str>,
        live: bool,
    ) -> Result<String> {
        let show_more = listing.has_more() && (live || more_href.is_some());

        let mut context = self.create_base_context(live);
        context.insert("posts", listing.posts());
        context.insert("next_page", &listing.next_page());
        context.insert("show_more", &show_more);
        context.insert("more_href", more_href.unwrap_or("#"));
        self.renderer.render("index.html", &context)
    }

    /// Cards for a batch of posts, appended client-side by "load more"
    pub fn post_cards(&self, posts: &[PostSummary]) -> Result<String> {
        let mut context = self.create_base_context(true);
        context.insert("posts", posts);
        self.renderer.render("cards.html", &context)
    }

    pub fn post_page(&self, post: &PostDetail) -> Result<String> {
        let blocks: Vec<BlockView> = post
            .content
            .iter()
            .map(|block| BlockView {
                heading: block.heading.clone(),
                anchor: slug::slugify(&block.heading),
                html: as_html(&block.body),
            })
            .collect();
        let reading_time = ReadingTime::estimate(&post.content);

        let mut context = self.create_base_context(false);
        context.insert("post", &PostView::from(post));
        context.insert("reading_time", &reading_time.label(&self.i18n));
        context.insert("blocks", &blocks);
        self.renderer.render("post.html", &context)
    }

    /// Placeholder served while a post resolves in the background
    pub fn loading_page(&self) -> Result<String> {
        let mut context = self.create_base_context(false);
        context.insert("refresh_seconds", &LOADING_REFRESH_SECONDS);
        self.renderer.render("loading.html", &context)
    }

    pub fn not_found_page(&self, slug: Option<&str>) -> Result<String> {
        let mut context = self.create_base_context(false);
        context.insert("slug", &slug);
        self.renderer.render("not_found.html", &context)
    }

    /// Write a static site under `public_dir`
    ///
    /// Writes `index.html` and `404.html`; with `all_pages`, one
    /// `page/N/index.html` per further listing page holding every post
    /// up to that page; one `post/<uid>/index.html` for each pre-generated
    /// slug, plus every listed post with `all_posts`.
    pub async fn build(
        &self,
        source: &dyn ContentSource,
        public_dir: &Path,
        all_pages: bool,
        all_posts: bool,
    ) -> Result<BuildReport> {
        fs::create_dir_all(public_dir)?;
        let mut report = BuildReport::default();

        let mut listing = source::fetch_listing(source, &self.config.api).await?;
        let mut slugs: BTreeSet<String> = self.config.prerender.iter().cloned().collect();

        let max_pages = self.config.max_pages.max(1);
        let mut page = 1;
        loop {
            let more_href = (all_pages && listing.has_more() && page < max_pages)
                .then(|| format!("/page/{}/", page + 1));
            let html = self.listing_page(&listing, more_href.as_deref(), false)?;
            write_page(&listing_path(public_dir, page), &html)?;
            report.listing_pages += 1;

            if more_href.is_none() {
                break;
            }
            listing.load_more(source).await?;
            page += 1;
        }

        if all_posts {
            slugs.extend(listing.posts().iter().map(|p| p.uid.clone()));
        }

        for slug in slugs {
            let post = match source::resolve_post(source, &self.config.api, &slug).await? {
                Resolution::Found(post) => post,
                Resolution::NotFound => {
                    return Err(BlogError::NotFound {
                        doc_type: self.config.api.document_type.clone(),
                        uid: slug,
                    })
                }
            };
            let path = post_path(public_dir, &post.uid)?;
            write_page(&path, &self.post_page(&post)?)?;
            report.posts.push(post.uid);
        }

        write_page(&public_dir.join("404.html"), &self.not_found_page(None)?)?;

        tracing::info!(
            "Wrote {} listing pages and {} posts to {:?}",
            report.listing_pages,
            report.posts.len(),
            public_dir
        );
        Ok(report)
    }
}

fn listing_path(public_dir: &Path, page: usize) -> PathBuf {
    if page == 1 {
        public_dir.join("index.html")
    } else {
        public_dir
            .join("page")
            .join(page.to_string())
            .join("index.html")
    }
}

/// Output path of a post; refuses uids that would escape the directory
fn post_path(public_dir: &Path, uid: &str) -> Result<PathBuf> {
    let safe = !uid.is_empty()
        && uid
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !uid.starts_with('.');
    if !safe {
        return Err(BlogError::InvalidSlug(uid.to_string()));
    }
    Ok(public_dir.join("post").join(uid).join("index.html"))
}

fn write_page(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)?;
    tracing::debug!("Generated: {:?}", path);
    Ok(())
}
