//! Structured rich text as delivered by the content API
//!
//! A rich-text field is an ordered list of nodes (paragraphs, headings,
//! list items, images, embeds). Text nodes carry inline spans whose
//! offsets count UTF-16 code units.

use serde::{Deserialize, Serialize};

/// One block-level rich-text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RichTextNode {
    Paragraph(TextBlock),
    Heading1(TextBlock),
    Heading2(TextBlock),
    Heading3(TextBlock),
    Heading4(TextBlock),
    Heading5(TextBlock),
    Heading6(TextBlock),
    Preformatted(TextBlock),
    ListItem(TextBlock),
    OListItem(TextBlock),
    Image(ImageBlock),
    Embed(EmbedBlock),
    /// Node types this renderer does not know about
    #[serde(other)]
    Unknown,
}

/// Text with inline formatting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

impl TextBlock {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            spans: Vec::new(),
        }
    }
}

/// Inline formatting over `[start, end)` of a text block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(flatten)]
    pub kind: SpanKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink { data: Link },
    Label { data: LabelData },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelData {
    pub label: String,
}

/// Link target of a hyperlink span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "link_type")]
pub enum Link {
    Web {
        url: String,
        #[serde(default)]
        target: Option<String>,
    },
    Document {
        #[serde(default)]
        uid: Option<String>,
        #[serde(rename = "type")]
        doc_type: String,
    },
    Media {
        url: String,
    },
    #[serde(other)]
    Any,
}

impl Link {
    /// Resolve the link to an href, `None` when it points nowhere
    pub fn href(&self) -> Option<String> {
        match self {
            Link::Web { url, .. } | Link::Media { url } => Some(url.clone()),
            Link::Document { uid: Some(uid), .. } => Some(format!("/post/{}", uid)),
            Link::Document { uid: None, .. } => Some("/".to_string()),
            Link::Any => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedBlock {
    #[serde(default)]
    pub oembed: Oembed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Oembed {
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl RichTextNode {
    /// Text payload of the node, if it has one
    pub fn text_block(&self) -> Option<&TextBlock> {
        match self {
            RichTextNode::Paragraph(b)
            | RichTextNode::Heading1(b)
            | RichTextNode::Heading2(b)
            | RichTextNode::Heading3(b)
            | RichTextNode::Heading4(b)
            | RichTextNode::Heading5(b)
            | RichTextNode::Heading6(b)
            | RichTextNode::Preformatted(b)
            | RichTextNode::ListItem(b)
            | RichTextNode::OListItem(b) => Some(b),
            RichTextNode::Image(_) | RichTextNode::Embed(_) | RichTextNode::Unknown => None,
        }
    }
}

/// Plain-text rendering: node texts joined by a single space
pub fn as_text(nodes: &[RichTextNode]) -> String {
    nodes
        .iter()
        .filter_map(RichTextNode::text_block)
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Copy, PartialEq)]
enum ListKind {
    Unordered,
    Ordered,
}

/// Markup rendering of a rich-text field
pub fn as_html(nodes: &[RichTextNode]) -> String {
    let mut html = String::new();
    let mut open_list: Option<ListKind> = None;

    for node in nodes {
        let list = match node {
            RichTextNode::ListItem(_) => Some(ListKind::Unordered),
            RichTextNode::OListItem(_) => Some(ListKind::Ordered),
            _ => None,
        };

        if open_list != list {
            match open_list {
                Some(ListKind::Unordered) => html.push_str("</ul>"),
                Some(ListKind::Ordered) => html.push_str("</ol>"),
                None => {}
            }
            match list {
                Some(ListKind::Unordered) => html.push_str("<ul>"),
                Some(ListKind::Ordered) => html.push_str("<ol>"),
                None => {}
            }
            open_list = list;
        }

        match node {
            RichTextNode::Paragraph(b) => wrap(&mut html, "p", b),
            RichTextNode::Heading1(b) => wrap(&mut html, "h1", b),
            RichTextNode::Heading2(b) => wrap(&mut html, "h2", b),
            RichTextNode::Heading3(b) => wrap(&mut html, "h3", b),
            RichTextNode::Heading4(b) => wrap(&mut html, "h4", b),
            RichTextNode::Heading5(b) => wrap(&mut html, "h5", b),
            RichTextNode::Heading6(b) => wrap(&mut html, "h6", b),
            RichTextNode::Preformatted(b) => wrap(&mut html, "pre", b),
            RichTextNode::ListItem(b) | RichTextNode::OListItem(b) => wrap(&mut html, "li", b),
            RichTextNode::Image(image) => {
                html.push_str(&format!(
                    r#"<p class="block-img"><img src="{}" alt="{}" /></p>"#,
                    escape_html(&image.url),
                    escape_html(image.alt.as_deref().unwrap_or(""))
                ));
            }
            RichTextNode::Embed(embed) => {
                let oembed = &embed.oembed;
                html.push_str(&format!(
                    r#"<div data-oembed="{}" data-oembed-type="{}" data-oembed-provider="{}">{}</div>"#,
                    escape_html(oembed.embed_url.as_deref().unwrap_or("")),
                    escape_html(oembed.kind.as_deref().unwrap_or("")),
                    escape_html(oembed.provider_name.as_deref().unwrap_or("")),
                    // Provider markup is trusted CMS content
                    oembed.html.as_deref().unwrap_or("")
                ));
            }
            RichTextNode::Unknown => {}
        }
    }

    match open_list {
        Some(ListKind::Unordered) => html.push_str("</ul>"),
        Some(ListKind::Ordered) => html.push_str("</ol>"),
        None => {}
    }

    html
}

fn wrap(html: &mut String, tag: &str, block: &TextBlock) {
    html.push('<');
    html.push_str(tag);
    html.push('>');
    html.push_str(&render_spans(block));
    html.push_str("</");
    html.push_str(tag);
    html.push('>');
}

/// Byte offset of every UTF-16 position in `text`, plus the end
fn utf16_to_byte(text: &str) -> Vec<usize> {
    let mut map = Vec::with_capacity(text.len() + 1);
    for (byte, ch) in text.char_indices() {
        for _ in 0..ch.len_utf16() {
            map.push(byte);
        }
    }
    map.push(text.len());
    map
}

fn open_tag(kind: &SpanKind) -> String {
    match kind {
        SpanKind::Strong => "<strong>".to_string(),
        SpanKind::Em => "<em>".to_string(),
        SpanKind::Hyperlink { data } => match (data.href(), data) {
            (Some(href), Link::Web { target: Some(target), .. }) => format!(
                r#"<a href="{}" target="{}" rel="noopener noreferrer">"#,
                escape_html(&href),
                escape_html(target)
            ),
            (Some(href), _) => format!(r#"<a href="{}">"#, escape_html(&href)),
            (None, _) => "<a>".to_string(),
        },
        SpanKind::Label { data } => format!(r#"<span class="{}">"#, escape_html(&data.label)),
        SpanKind::Unknown => "<span>".to_string(),
    }
}

fn close_tag(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Strong => "</strong>",
        SpanKind::Em => "</em>",
        SpanKind::Hyperlink { .. } => "</a>",
        SpanKind::Label { .. } | SpanKind::Unknown => "</span>",
    }
}

/// Render a text block with its spans properly nested
fn render_spans(block: &TextBlock) -> String {
    let text = block.text.as_str();
    let map = utf16_to_byte(text);
    let last = map.len() - 1;
    let to_byte = |offset: usize| map[offset.min(last)];

    // (start, end, index) in bytes, ordered so outer spans come first
    let mut spans: Vec<(usize, usize, usize)> = block
        .spans
        .iter()
        .enumerate()
        .map(|(i, s)| (to_byte(s.start), to_byte(s.end), i))
        .filter(|(start, end, _)| start < end)
        .collect();
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));

    let mut bounds: Vec<usize> = vec![0, text.len()];
    for (start, end, _) in &spans {
        bounds.push(*start);
        bounds.push(*end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<usize> = Vec::new();

    for pair in bounds.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let active: Vec<usize> = spans
            .iter()
            .filter(|(start, end, _)| *start <= from && *end >= to)
            .map(|(_, _, i)| *i)
            .collect();

        let common = stack
            .iter()
            .zip(active.iter())
            .take_while(|(a, b)| a == b)
            .count();
        while stack.len() > common {
            if let Some(i) = stack.pop() {
                out.push_str(close_tag(&block.spans[i].kind));
            }
        }
        for &i in &active[common..] {
            out.push_str(&open_tag(&block.spans[i].kind));
            stack.push(i);
        }

        out.push_str(&escape_html(&text[from..to]).replace('\n', "<br />"));
    }

    while let Some(i) = stack.pop() {
        out.push_str(close_tag(&block.spans[i].kind));
    }

    out
}

/// Escape text for HTML element and attribute content
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
