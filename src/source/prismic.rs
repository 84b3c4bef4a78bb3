//! Prismic REST API client

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Url;
use serde::Deserialize;

use super::{ContentSource, Query, SearchResponse};
use crate::config::ApiConfig;
use crate::content::Document;
use crate::error::{BlogError, Result};

/// API root payload; only the refs matter here
#[derive(Debug, Deserialize)]
struct ApiRoot {
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// HTTP client for a Prismic repository
///
/// Every query is pinned to the repository's current master ref, read
/// from the API root right before the search.
#[derive(Debug, Clone)]
pub struct PrismicClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let endpoint = Url::parse(api.endpoint.trim_end_matches('/'))
            .map_err(|_| BlogError::InvalidEndpoint(api.endpoint.clone()))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            access_token: api.access_token.clone(),
        })
    }

    fn with_token(&self, mut url: Url) -> Url {
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(k, _)| k == "access_token") {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", url.path());
        let response = self
            .http
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn master_ref(&self) -> Result<String> {
        let root: ApiRoot = self.get_json(self.with_token(self.endpoint.clone())).await?;
        root.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or_else(|| BlogError::Api("API root lists no master ref".to_string()))
    }

    fn search_url(&self, reference: &str, predicate: &str, page_size: usize) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["documents", "search"]);
        }
        url.query_pairs_mut()
            .append_pair("ref", reference)
            .append_pair("q", &format!("[{}]", predicate))
            .append_pair("pageSize", &page_size.to_string());
        url
    }

    /// Only cursors pointing back at this repository are followed
    fn check_cursor(&self, cursor: &str) -> Result<Url> {
        let url = Url::parse(cursor).map_err(|_| BlogError::InvalidCursor(cursor.to_string()))?;
        if url.origin() != self.endpoint.origin() {
            tracing::warn!("Refusing cursor for foreign origin: {}", url.origin().ascii_serialization());
            return Err(BlogError::InvalidCursor(cursor.to_string()));
        }
        Ok(url)
    }
}

/// `[at(<path>,"<value>")]` with the value's quotes escaped
fn at_predicate(path: &str, value: &str) -> String {
    format!(
        "[at({},\"{}\")]",
        path,
        value.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query(&self, query: &Query) -> Result<SearchResponse> {
        let reference = self.master_ref().await?;
        let mut url = self.search_url(
            &reference,
            &at_predicate("document.type", &query.document_type),
            query.page_size,
        );
        if let Some(orderings) = &query.orderings {
            url.query_pairs_mut().append_pair("orderings", orderings);
        }
        self.get_json(self.with_token(url)).await
    }

    async fn fetch_page(&self, cursor: &str) -> Result<SearchResponse> {
        let url = self.check_cursor(cursor)?;
        self.get_json(self.with_token(url)).await
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document> {
        let reference = self.master_ref().await?;
        let url = self.search_url(
            &reference,
            &at_predicate(&format!("my.{}.uid", doc_type), uid),
            1,
        );
        let response: SearchResponse = self.get_json(self.with_token(url)).await?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| BlogError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(token: Option<&str>) -> PrismicClient {
        PrismicClient::new(&ApiConfig {
            endpoint: "https://spacetraveling.cdn.prismic.io/api/v2".to_string(),
            access_token: token.map(str::to_string),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_search_url() {
        let url = client(None).search_url("REF", &at_predicate("document.type", "post"), 5);
        assert_eq!(url.path(), "/api/v2/documents/search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("ref".to_string(), "REF".to_string()),
                ("q".to_string(), "[[at(document.type,\"post\")]]".to_string()),
                ("pageSize".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_predicate_escapes_quotes() {
        assert_eq!(
            at_predicate("my.post.uid", "a\"b"),
            "[at(my.post.uid,\"a\\\"b\")]"
        );
    }

    #[test]
    fn test_token_appended_once() {
        let client = client(Some("secret"));
        let url = client.with_token(Url::parse("https://x.io/a?page=2").unwrap());
        assert_eq!(url.query(), Some("page=2&access_token=secret"));

        let again = client.with_token(url.clone());
        assert_eq!(again, url);
    }

    #[test]
    fn test_cursor_origin_check() {
        let client = client(None);
        assert!(client
            .check_cursor("https://spacetraveling.cdn.prismic.io/api/v2/documents/search?page=2")
            .is_ok());
        assert!(matches!(
            client.check_cursor("https://evil.example/api/v2/documents/search?page=2"),
            Err(BlogError::InvalidCursor(_))
        ));
        assert!(client.check_cursor("not a url").is_err());
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            PrismicClient::new(&ApiConfig::default()),
            Err(BlogError::InvalidEndpoint(_))
        ));
    }
}
