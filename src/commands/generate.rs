//! Generate static files

use anyhow::Result;

use crate::Blog;

/// Write the static site to the public directory
///
/// `all_pages` also writes every further listing page; `all_posts`
/// writes a page for every listed post, not only the pre-generated ones.
pub async fn run(blog: &Blog, all_pages: bool, all_posts: bool) -> Result<()> {
    let start = std::time::Instant::now();

    let source = blog.source()?;
    let generator = blog.generator()?;
    let report = generator
        .build(source.as_ref(), &blog.public_dir, all_pages, all_posts)
        .await?;

    tracing::info!(
        "Generated {} listing pages and {} posts in {:.2}s",
        report.listing_pages,
        report.posts.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
