//! `markdown-to-html`: render approved articles for WordPress.

use async_trait::async_trait;

use contentpipe_markdown::markdown_to_html;
use contentpipe_shared::{Fields, Record, Result};

use super::JobDefinition;
use crate::runner::{Processor, Transition};

const ARTICLE_TEXT: &str = "article_text";
const HTML: &str = "html";

#[derive(Debug, Default)]
pub struct MarkdownToHtml;

impl MarkdownToHtml {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "markdown-to-html",
        filter: "AND({state} = 'READY_TO_PUBLISH', {html} = '')",
        persist: &[HTML],
    };
}

#[async_trait]
impl Processor for MarkdownToHtml {
    async fn process(&self, record: &Record) -> Result<Transition> {
        let article = record.require(ARTICLE_TEXT)?;
        let mut fields = Fields::new();
        fields.insert(HTML.into(), markdown_to_html(&article).into());
        Ok(Transition::Updated(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::rec;

    #[tokio::test]
    async fn renders_article() {
        let record = rec(
            "rec1",
            &[("state", "READY_TO_PUBLISH"), ("article_text", "## Tips\n\n**Bold** move")],
        );
        let Transition::Updated(fields) = MarkdownToHtml.process(&record).await.unwrap() else {
            panic!("expected update");
        };
        let html = fields["html"].to_text();
        assert!(html.contains("<h2>Tips</h2>"));
        assert!(html.contains("<strong>Bold</strong>"));
    }

    #[tokio::test]
    async fn filter_selects_ready_without_html() {
        let filter = MarkdownToHtml::DEFINITION.default_filter().unwrap();
        assert!(filter.matches(&rec("a", &[("state", "READY_TO_PUBLISH")])));
        assert!(!filter.matches(&rec("b", &[("state", "READY_TO_PUBLISH"), ("html", "<p>x</p>")])));
        assert!(!filter.matches(&rec("c", &[("state", "REVIEW_REQUIRED")])));
    }
}
