//! Built-in templates using the Tera template engine
//!
//! All templates are embedded directly in the binary.

use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::content::{Banner, PostDetail};
use crate::error::Result;
use crate::helpers;

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a renderer whose dates are formatted in `locale`
    pub fn new(locale: &str) -> Result<Self> {
        // Fail on an unknown locale now rather than on the first page
        helpers::locale(locale)?;

        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("space/layout.html")),
            ("index.html", include_str!("space/index.html")),
            ("cards.html", include_str!("space/cards.html")),
            ("post.html", include_str!("space/post.html")),
            ("loading.html", include_str!("space/loading.html")),
            ("not_found.html", include_str!("space/not_found.html")),
            // Partials
            (
                "partials/header.html",
                include_str!("space/partials/header.html"),
            ),
            (
                "partials/post_card.html",
                include_str!("space/partials/post_card.html"),
            ),
        ])?;

        tera.register_filter("date_format", date_format_filter(locale.to_string()));

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: format an ISO date string in the site locale
///
/// A value that is not a date fails the render.
fn date_format_filter(
    locale: String,
) -> impl Fn(&tera::Value, &HashMap<String, tera::Value>) -> tera::Result<tera::Value> + Send + Sync
{
    move |value: &tera::Value, _args: &HashMap<String, tera::Value>| {
        let s = tera::try_get_value!("date_format", "value", String, value);
        helpers::format_date(&s, &locale)
            .map(tera::Value::String)
            .map_err(|e| tera::Error::msg(e.to_string()))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub language: String,
}

/// A post prepared for the detail template
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub first_publication_date: Option<String>,
    pub banner: Banner,
}

impl From<&PostDetail> for PostView {
    fn from(post: &PostDetail) -> Self {
        Self {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            first_publication_date: post.first_publication_date.clone(),
            banner: post.banner.clone(),
        }
    }
}

/// One content block with its body rendered to markup
#[derive(Debug, Clone, Serialize)]
pub struct BlockView {
    pub heading: String,
    pub anchor: String,
    pub html: String,
}
