//! Visible-text extraction from HTML pages.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));
static TEXT_BLOCKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, span, div").expect("valid selector"));

const INVISIBLE: &[&str] = &["script", "style", "noscript", "template"];

/// All visible text of the page, each text run trimmed and joined by a
/// single space.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&BODY)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        words.extend(text.split_whitespace());
    }
    words.join(" ")
}

/// Text of every `p`, `span` and `div` that neither mentions a skip word nor
/// sits under an element whose `id` or `class` mentions one.
///
/// Matching is case-insensitive. Nested blocks contribute their text once per
/// enclosing block, the same as reading each block in isolation.
pub fn extract_text_skipping(html: &str, skip_words: &[String]) -> String {
    let doc = Html::parse_document(html);
    let words: Vec<String> = skip_words.iter().map(|w| w.to_lowercase()).collect();

    let mut parts: Vec<String> = Vec::new();
    for element in doc.select(&TEXT_BLOCKS) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }
        let lower = text.to_lowercase();
        if words.iter().any(|w| lower.contains(w.as_str())) {
            continue;
        }
        if ancestor_mentions(element, &words) {
            continue;
        }
        parts.push(text);
    }
    parts.join(" ")
}

fn ancestor_mentions(element: ElementRef<'_>, words: &[String]) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| {
            let el = ancestor.value();
            let id = el.id().map(str::to_lowercase);
            let classes: Vec<String> = el.classes().map(str::to_lowercase).collect();
            words.iter().any(|w| {
                id.as_deref().is_some_and(|id| id.contains(w.as_str()))
                    || classes.iter().any(|c| c.contains(w.as_str()))
            })
        })
}
