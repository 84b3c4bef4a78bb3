//! Show a single post

use anyhow::{bail, Result};

use crate::helpers;
use crate::reading_time::ReadingTime;
use crate::source::{self, Resolution};
use crate::Blog;

/// Print a post's header, reading time and section headings
pub async fn run(blog: &Blog, slug: &str) -> Result<()> {
    let source = blog.source()?;
    let post = match source::resolve_post(source.as_ref(), &blog.config.api, slug).await? {
        Resolution::Found(post) => post,
        Resolution::NotFound => bail!("No post found for slug '{}'", slug),
    };

    let i18n = blog.i18n()?;
    let date = match &post.first_publication_date {
        Some(date) => helpers::format_date(date, &blog.config.language)?,
        None => "-".to_string(),
    };

    println!("{}", post.title);
    if !post.subtitle.is_empty() {
        println!("{}", post.subtitle);
    }
    println!();
    println!(
        "  {} | {} | {}",
        date,
        post.author,
        ReadingTime::estimate(&post.content).label(&i18n)
    );
    if !post.banner.url.is_empty() {
        println!("  banner: {}", post.banner.url);
    }
    for block in &post.content {
        println!("  # {}", block.heading);
    }

    Ok(())
}
