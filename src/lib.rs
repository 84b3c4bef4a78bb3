//! spacetraveling: a blog front-end for a headless content API
//!
//! Posts come from a Prismic repository. The crate renders a listing
//! page that grows on demand and one page per post. The pages are
//! either served with incremental regeneration or written out as a
//! static site.

pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod i18n;
pub mod pagination;
pub mod reading_time;
pub mod server;
pub mod source;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use source::{ContentSource, MemorySource, PrismicClient};

/// The blog application
#[derive(Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Content source, built on first use
    source: Arc<OnceLock<Arc<dyn ContentSource>>>,
}

impl Blog {
    /// Create a new Blog instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::debug!("No _config.yml in {:?}, using defaults", base_dir);
            config::SiteConfig::default()
        };
        config.apply_env();

        Ok(Self::from_config(config, base_dir))
    }

    /// Create a Blog from an already loaded configuration
    pub fn from_config(config: config::SiteConfig, base_dir: PathBuf) -> Self {
        let public_dir = base_dir.join(&config.public_dir);
        Self {
            config,
            base_dir,
            public_dir,
            source: Arc::new(OnceLock::new()),
        }
    }

    /// Use the given content source instead of the configured one
    pub fn with_source(self, source: Arc<dyn ContentSource>) -> Self {
        let cell = OnceLock::new();
        // A fresh cell is always empty
        let _ = cell.set(source);
        Self {
            source: Arc::new(cell),
            ..self
        }
    }

    /// The content source shared by every request
    ///
    /// A `fixture` file in the API configuration selects the in-memory
    /// source; otherwise the Prismic client is used.
    pub fn source(&self) -> Result<Arc<dyn ContentSource>> {
        if let Some(source) = self.source.get() {
            return Ok(source.clone());
        }

        let source: Arc<dyn ContentSource> = match &self.config.api.fixture {
            Some(fixture) => {
                let path = self.base_dir.join(fixture);
                tracing::info!("Serving content from fixture {:?}", path);
                Arc::new(MemorySource::from_file(path)?)
            }
            None => Arc::new(PrismicClient::new(&self.config.api)?),
        };

        // Another caller may have raced us here; keep whichever landed first
        Ok(self.source.get_or_init(move || source).clone())
    }

    /// Translations: built-ins plus `languages/*.yml` overrides
    pub fn i18n(&self) -> Result<i18n::I18n> {
        let mut i18n = i18n::I18n::new(&self.config.language);
        i18n.load_languages(self.base_dir.join("languages"))?;
        Ok(i18n)
    }

    /// A page renderer for this site
    pub fn generator(&self) -> Result<generator::Generator> {
        Ok(generator::Generator::new(&self.config, self.i18n()?)?)
    }

    /// Write the static site
    pub async fn generate(&self, all_pages: bool, all_posts: bool) -> Result<()> {
        commands::generate::run(self, all_pages, all_posts).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::new(dir.path()).unwrap();
        assert_eq!(blog.config.title, "Space Traveling");
        assert_eq!(blog.public_dir, dir.path().join("public"));
    }

    #[tokio::test]
    async fn test_fixture_source_is_built_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("_config.yml"),
            "api:\n  fixture: posts.json\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("posts.json"),
            r#"[{ "id": "1", "uid": "hello", "type": "post", "data": { "title": "Hello" } }]"#,
        )
        .unwrap();

        let blog = Blog::new(dir.path()).unwrap();
        let first = blog.source().unwrap();
        let second = blog.clone().source().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let listing = source::fetch_listing(first.as_ref(), &blog.config.api)
            .await
            .unwrap();
        assert_eq!(listing.posts()[0].uid, "hello");
    }

    #[test]
    fn test_unconfigured_endpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::from_config(config::SiteConfig::default(), dir.path().to_path_buf());
        assert!(blog.source().is_err());
    }
}
