//! Site configuration (_config.yml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Environment variable overriding `api.endpoint`
pub const ENDPOINT_ENV: &str = "PRISMIC_API_ENDPOINT";
/// Environment variable overriding `api.access_token`
pub const ACCESS_TOKEN_ENV: &str = "PRISMIC_ACCESS_TOKEN";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub language: String,

    // Content API
    #[serde(default)]
    pub api: ApiConfig,

    // Regeneration
    /// Seconds after which fetched data is stale and refreshed on the next request
    pub revalidate: u64,
    /// How post pages that were not pre-generated are served on first request
    pub fallback: FallbackMode,
    /// Slugs resolved ahead of time (at startup or by `generate`)
    #[serde(default)]
    pub prerender: Vec<String>,

    // Listing
    /// Upper bound for `?pages=N` and for `generate --all`
    pub max_pages: usize,

    // Directory
    pub public_dir: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Space Traveling".to_string(),
            language: "pt-BR".to_string(),

            api: ApiConfig::default(),

            revalidate: 60 * 60 * 24,
            fallback: FallbackMode::Blocking,
            prerender: Vec::new(),

            max_pages: 20,

            public_dir: "public".to_string(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PRISMIC_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(ACCESS_TOKEN_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, access_token: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            tracing::debug!("API endpoint overridden from environment");
            self.api.endpoint = endpoint;
        }
        if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
            self.api.access_token = Some(token);
        }
    }

    /// The regeneration interval as a `Duration`
    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_secs(self.revalidate)
    }
}

/// Headless content API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Repository API root, e.g. `https://<repo>.cdn.prismic.io/api/v2`
    pub endpoint: String,
    pub access_token: Option<String>,
    /// Custom type holding blog posts
    pub document_type: String,
    pub page_size: usize,
    /// Raw orderings predicate, e.g. `[document.first_publication_date desc]`
    pub orderings: Option<String>,
    /// JSON dump of documents served instead of the remote API
    pub fixture: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "post".to_string(),
            page_size: 5,
            orderings: None,
            fixture: None,
        }
    }
}

/// Serving mode for post pages that were not generated ahead of time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Hold the request until the post is resolved
    #[default]
    Blocking,
    /// Answer with a loading page while the post resolves in the background
    Placeholder,
}
