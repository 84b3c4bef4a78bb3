//! Post models

use serde::{Deserialize, Serialize};

use super::rich_text::RichTextNode;
use crate::error::{BlogError, Result};

/// A raw document as returned by the content API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub last_publication_date: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Document {
    fn require_uid(&self) -> Result<String> {
        self.uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or_else(|| BlogError::MissingUid(self.id.clone()))
    }

    fn fields(&self) -> Result<PostFields> {
        if self.data.is_null() {
            return Ok(PostFields::default());
        }
        Ok(PostFields::deserialize(&self.data)?)
    }
}

/// Fields of the `post` custom type, nulls included
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFields {
    title: Option<String>,
    subtitle: Option<String>,
    author: Option<String>,
    banner: Option<RawBanner>,
    #[serde(alias = "group")]
    content: Option<Vec<RawBlock>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBanner {
    url: Option<String>,
    alt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBlock {
    heading: Option<String>,
    body: Option<Vec<RichTextNode>>,
}

/// A post as shown in the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Stable identifier, also the slug of the detail route
    pub uid: String,
    pub first_publication_date: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl PostSummary {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let fields = doc.fields()?;
        Ok(Self {
            uid: doc.require_uid()?,
            first_publication_date: doc.first_publication_date.clone(),
            title: fields.title.unwrap_or_default(),
            subtitle: fields.subtitle.unwrap_or_default(),
            author: fields.author.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub url: String,
    pub alt: String,
}

/// One section of a post: a heading followed by rich text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

/// A post as shown on its own page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub uid: String,
    pub first_publication_date: Option<String>,
    pub last_publication_date: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner: Banner,
    pub content: Vec<ContentBlock>,
}

impl PostDetail {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let fields = doc.fields()?;
        let banner = fields.banner.unwrap_or_default();

        let content = fields
            .content
            .unwrap_or_default()
            .into_iter()
            .map(|block| ContentBlock {
                heading: block.heading.unwrap_or_default(),
                body: block.body.unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            uid: doc.require_uid()?,
            first_publication_date: doc.first_publication_date.clone(),
            last_publication_date: doc.last_publication_date.clone(),
            title: fields.title.unwrap_or_default(),
            subtitle: fields.subtitle.unwrap_or_default(),
            author: fields.author.unwrap_or_default(),
            banner: Banner {
                url: banner.url.unwrap_or_default(),
                alt: banner.alt.unwrap_or_default(),
            },
            content,
        })
    }

    /// The listing view of this post
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            uid: self.uid.clone(),
            first_publication_date: self.first_publication_date.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            author: self.author.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_summary_from_document() {
        let doc = document(json!({
            "id": "YF1",
            "uid": "como-utilizar-hooks",
            "type": "post",
            "first_publication_date": "2021-03-15T19:25:28+0000",
            "data": {
                "title": "Como utilizar Hooks",
                "subtitle": "Pensando em sincronização em vez de ciclos de vida",
                "author": "Joseph Oliveira"
            }
        }));

        let summary = PostSummary::from_document(&doc).unwrap();
        assert_eq!(summary.uid, "como-utilizar-hooks");
        assert_eq!(summary.title, "Como utilizar Hooks");
        assert_eq!(summary.author, "Joseph Oliveira");
        assert_eq!(
            summary.first_publication_date.as_deref(),
            Some("2021-03-15T19:25:28+0000")
        );
    }

    #[test]
    fn test_null_fields_become_empty() {
        let doc = document(json!({
            "id": "YF2",
            "uid": "draft",
            "type": "post",
            "first_publication_date": null,
            "data": { "title": "Draft", "subtitle": null, "author": null, "banner": {} }
        }));

        let detail = PostDetail::from_document(&doc).unwrap();
        assert_eq!(detail.subtitle, "");
        assert_eq!(detail.author, "");
        assert_eq!(detail.banner, Banner::default());
        assert!(detail.content.is_empty());
        assert!(detail.first_publication_date.is_none());
    }

    #[test]
    fn test_missing_uid_is_an_error() {
        let doc = document(json!({ "id": "YF3", "type": "post", "data": {} }));
        assert!(matches!(
            PostSummary::from_document(&doc),
            Err(BlogError::MissingUid(id)) if id == "YF3"
        ));
    }

    #[test]
    fn test_detail_reads_group_field() {
        let doc = document(json!({
            "id": "YF4",
            "uid": "hooks",
            "type": "post",
            "data": {
                "title": "Hooks",
                "banner": { "url": "https://images.prismic.io/banner.png", "alt": "banner" },
                "group": [
                    { "heading": "Proin et varius", "body": [
                        { "type": "paragraph", "text": "Lorem ipsum", "spans": [] }
                    ] },
                    { "heading": null, "body": null }
                ]
            }
        }));

        let detail = PostDetail::from_document(&doc).unwrap();
        assert_eq!(detail.banner.url, "https://images.prismic.io/banner.png");
        assert_eq!(detail.banner.alt, "banner");
        assert_eq!(detail.content.len(), 2);
        assert_eq!(detail.content[0].heading, "Proin et varius");
        assert_eq!(detail.content[0].body.len(), 1);
        assert_eq!(detail.content[1].heading, "");
        assert!(detail.content[1].body.is_empty());
        assert_eq!(detail.summary().uid, "hooks");
    }
}
