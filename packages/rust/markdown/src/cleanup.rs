//! Cleanup passes applied to Markdown produced from scraped pages.
//!
//! Each pass is `&str -> String`; [`run_pipeline`] applies them in order.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static LEFTOVER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?(?:div|span|section|article|figure|figcaption|font|center|u)(?:\s[^>]*)?>")
        .expect("valid regex")
});
static EMPTY_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^!])\[\s*\]\([^)]*\)").expect("valid regex"));
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = strip_trailing_whitespace(md);
    result = strip_leftover_html(&result);
    result = drop_empty_links(&result);
    result = resolve_links(&result, base_url);
    result = collapse_blank_lines(&result);
    ensure_trailing_newline(&result)
}

fn strip_trailing_whitespace(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Remove layout tags htmd passed through, outside fenced code.
fn strip_leftover_html(md: &str) -> String {
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                line.to_string()
            } else {
                LEFTOVER_TAG_RE.replace_all(line, "").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `[](href)` is what an icon-only anchor becomes.
fn drop_empty_links(md: &str) -> String {
    EMPTY_LINK_RE.replace_all(md, "$1").into_owned()
}

/// Make relative link and image targets absolute against `base_url`.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    LINK_RE
        .replace_all(md, |caps: &regex::Captures<'_>| {
            let bang = &caps[1];
            let text = &caps[2];
            let href = &caps[3];
            let absolute = href.contains("://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
                || href.starts_with("data:");
            if absolute {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("{bang}[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// At most one blank line between blocks.
fn collapse_blank_lines(md: &str) -> String {
    BLANK_RUN_RE.replace_all(md.trim_start_matches('\n'), "\n\n").into_owned()
}

fn ensure_trailing_newline(md: &str) -> String {
    format!("{}\n", md.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_runs_collapse_to_one_blank_line() {
        assert_eq!(collapse_blank_lines("\n\nA\n\n\n\n\nB\n\nC"), "A\n\nB\n\nC");
    }

    #[test]
    fn leftover_tags_go_but_code_stays() {
        let input = "<div class=\"se-module\">Tax tips</div>\n```html\n<div>kept</div>\n```";
        assert_eq!(
            strip_leftover_html(input),
            "Tax tips\n```html\n<div>kept</div>\n```"
        );
    }

    #[test]
    fn empty_links_dropped_images_kept() {
        assert_eq!(drop_empty_links("Share [](/share) now"), "Share  now");
        assert_eq!(drop_empty_links("![](/a.png)"), "![](/a.png)");
    }

    #[test]
    fn relative_targets_resolved() {
        let base = Url::parse("https://blog.example.com/post/1").unwrap();
        let input = "[Next](/post/2) ![chart](img/c.png) [Out](https://x.com) [Top](#top)";
        assert_eq!(
            resolve_links(input, Some(&base)),
            "[Next](https://blog.example.com/post/2) ![chart](https://blog.example.com/post/img/c.png) [Out](https://x.com) [Top](#top)"
        );
        assert_eq!(resolve_links("[a](/b)", None), "[a](/b)");
    }

    #[test]
    fn full_pipeline() {
        let base = Url::parse("https://blog.example.com/post/1").unwrap();
        let input = "# Title   \n\n\n\n<span>Body</span> [more](/post/2)\n\n\n";
        assert_eq!(
            run_pipeline(input, Some(&base)),
            "# Title\n\nBody [more](https://blog.example.com/post/2)\n"
        );
    }
}
