//! Markdown ⇄ HTML conversion.
//!
//! - [`markdown_to_html`]: generated articles are stored as Markdown and
//!   rendered to HTML for WordPress.
//! - [`html_to_markdown`]: scraped source pages can be kept as Markdown
//!   instead of flat text. Conversion goes through `htmd`, followed by the
//!   passes in `cleanup`.

mod cleanup;

use std::sync::LazyLock;

use pulldown_cmark::{Options, Parser, html};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use contentpipe_shared::{ContentPipeError, Result};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

/// Content containers tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &[
    ".se-main-container",
    "#postViewArea",
    "article",
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".entry-content",
    ".content",
    "body",
];

// ---------------------------------------------------------------------------
// Markdown → HTML
// ---------------------------------------------------------------------------

/// Render CommonMark (with tables and strikethrough) to well-formed HTML.
///
/// The rendered output is re-parsed and re-serialized so that any raw HTML
/// embedded in the Markdown comes out balanced.
#[instrument(skip_all, fields(len = md.len()))]
pub fn markdown_to_html(md: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut rendered = String::with_capacity(md.len() * 3 / 2);
    html::push_html(&mut rendered, Parser::new_ext(md, options));

    let fragment = Html::parse_fragment(&rendered);
    let normalized = fragment.root_element().inner_html();
    debug!(html_len = normalized.len(), "rendered markdown");
    normalized
}

// ---------------------------------------------------------------------------
// HTML → Markdown
// ---------------------------------------------------------------------------

/// Convert a scraped page to clean Markdown.
///
/// Only the main content container is converted; relative links are
/// resolved against `base_url` when given.
#[instrument(skip(html), fields(url = base_url.map(Url::as_str).unwrap_or("")))]
pub fn html_to_markdown(html: &str, base_url: Option<&Url>) -> Result<String> {
    let content = extract_content_html(html);
    let content = tables_to_markdown(&content);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg",
            "form", "button",
        ])
        .build();

    let raw = converter
        .convert(&content)
        .map_err(|e| ContentPipeError::Conversion(format!("htmd conversion failed: {e}")))?;
    debug!(raw_len = raw.len(), "htmd conversion complete");

    Ok(cleanup::run_pipeline(&raw, base_url))
}

fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    CONTENT_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| doc.select(&sel).next().map(|el| el.inner_html()))
        .unwrap_or_else(|| html.to_string())
}

/// Replace `<table>` elements with Markdown tables, which htmd does not produce.
fn tables_to_markdown(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let mut result = html.to_string();
    for table in doc.select(&TABLE) {
        let markdown = render_table(table);
        result = result.replacen(&table.html(), &markdown, 1);
    }
    result
}

fn render_table(table: ElementRef<'_>) -> String {
    let rows: Vec<Vec<String>> = table
        .select(&ROW)
        .map(|tr| {
            tr.select(&CELL)
                .map(|cell| {
                    cell.text()
                        .collect::<String>()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                        .replace('|', "\\|")
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let line = |cells: &[String]| {
        let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
        padded.resize(width, "");
        format!("| {} |\n", padded.join(" | "))
    };

    let mut out = String::from("\n\n");
    out.push_str(&line(&rows[0]));
    out.push_str(&format!("|{}\n", " --- |".repeat(width)));
    for row in &rows[1..] {
        out.push_str(&line(row));
    }
    out.push('\n');
    out
}
