//! Content module - post models and rich-text processing

mod post;
pub mod rich_text;

pub use post::{Banner, ContentBlock, Document, PostDetail, PostSummary};
pub use rich_text::RichTextNode;
