//! Markdown-to-HTML conversion for note previews and print documents.
//!
//! The converter is a fixed, ordered pipeline of pure passes over the document
//! string. Each pass rewrites one construct and leaves everything else alone,
//! so passes stay independently testable. The order is load-bearing: link
//! passes share a per-call set of already-linked URLs, anchor de-nesting and
//! normalization assume all anchors have been created, and list grouping runs
//! after line breaks have been collapsed.
//!
//! Conversion is total. Malformed input is never an error; unrecognized text
//! falls through to the paragraph pass and renders literally.

use std::collections::HashSet;

mod blocks;
mod inline;
mod links;

/// Convert a Markdown note body into an HTML fragment.
pub fn convert(markdown: &str) -> String {
    let mut seen_urls = HashSet::new();

    let html = blocks::headings(markdown);
    let html = inline::emphasis(&html);
    let html = links::empty_label_links(&html);
    let html = links::labeled_links(&html);
    let html = links::reference_list_urls(&html, &mut seen_urls);
    let html = links::bare_urls(&html, &mut seen_urls);
    let html = links::unnest_anchors(&html);
    let html = links::normalize_anchors(&html);
    let html = inline::images(&html);
    let html = blocks::tables(&html);
    let html = blocks::list_items(&html);
    let html = blocks::horizontal_rules(&html);
    let html = blocks::paragraphs(&html);
    let html = blocks::line_breaks(&html);
    blocks::group_lists(&html)
}

/// Apply `transform` to every line, preserving the line structure.
pub(crate) fn map_lines(text: &str, transform: impl Fn(&str) -> String) -> String {
    text.split('\n')
        .map(|line| transform(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::convert;

    #[test]
    fn plain_text_becomes_paragraphs() {
        let html = convert("first note line\nsecond note line");
        assert_eq!(html, "<p>first note line</p>\n<p>second note line</p>");
    }

    #[test]
    fn empty_input_produces_empty_output() {
        assert_eq!(convert(""), "");
    }

    #[test]
    fn heading_and_emphasis_compose() {
        let html = convert("# Findings\n\nThe result was **significant** and *new*.");
        assert!(html.contains("<h1>Findings</h1>"));
        assert!(html.contains("<strong>significant</strong>"));
        assert!(html.contains("<em>new</em>"));
    }

    #[test]
    fn six_hashes_are_not_a_heading() {
        let html = convert("###### too deep");
        assert_eq!(html, "<p>###### too deep</p>");
    }

    #[test]
    fn empty_label_link_uses_host_as_text() {
        let html = convert("[](https://example.com/paper)");
        assert!(
            html.contains(
                "<a href=\"https://example.com/paper\" target=\"_blank\" rel=\"noopener noreferrer\">example.com</a>"
            ),
            "unexpected output: {html}"
        );
    }

    #[test]
    fn unparseable_url_still_renders_as_link() {
        let html = convert("[](not a url)");
        assert!(html.contains("<a href=\"not a url\">not a url</a>"));
    }

    #[test]
    fn reference_list_wins_url_deduplication() {
        let html = convert("1. https://example.com/source\n\nsee https://example.com/source");
        // linked once, in the reference entry; the prose mention stays text
        assert_eq!(html.matches("<a href=").count(), 1);
        assert!(html.contains("see https://example.com/source"));
    }

    #[test]
    fn bare_url_followed_by_closing_paren_stays_text() {
        let html = convert("(compare https://example.com/a)");
        assert!(!html.contains("<a "));
    }

    #[test]
    fn anchors_never_nest() {
        let html = convert("[already https://inner.example.com linked](https://outer.example.com)");
        let opens = html.matches("<a ").count();
        let closes = html.matches("</a>").count();
        assert_eq!(opens, closes);
        assert!(!has_nested_anchor(&html), "nested anchor in: {html}");
    }

    #[test]
    fn every_http_anchor_carries_canonical_attributes() {
        let html = convert("[docs](https://example.com/docs)\n\n[local](/notes/1)");
        assert!(html.contains(
            "<a href=\"https://example.com/docs\" target=\"_blank\" rel=\"noopener noreferrer\">docs</a>"
        ));
        assert!(html.contains("<a href=\"/notes/1\">local</a>"));
    }

    #[test]
    fn image_renders_with_alt_and_sizing() {
        let html = convert("![diagram](https://example.com/fig1.png)");
        assert!(html.contains(
            "<img src=\"https://example.com/fig1.png\" alt=\"diagram\" style=\"max-width: 100%; height: auto;\" />"
        ));
    }

    #[test]
    fn well_formed_table_converts() {
        let html = convert("| a | b |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |");
        assert!(html.starts_with("<table>"));
        assert_eq!(html.matches("<th>").count(), 2);
        assert_eq!(html.matches("<tr>").count(), 3);
        assert_eq!(html.matches("<td>").count(), 4);
    }

    #[test]
    fn header_without_body_rows_is_not_a_table() {
        let html = convert("| a | b |\n| --- | --- |");
        assert!(!html.contains("<table>"));
        assert!(html.contains("<p>| a | b |</p>"));
    }

    #[test]
    fn adjacent_list_items_group_into_one_list() {
        let html = convert("- first\n- second\n- third");
        assert_eq!(html.matches("<ul>").count(), 1);
        assert_eq!(html.matches("<li>").count(), 3);
    }

    #[test]
    fn separated_list_runs_are_not_merged() {
        let html = convert("- alpha\n\nprose between\n\n- beta");
        assert_eq!(html.matches("<ul>").count(), 2);
    }

    #[test]
    fn ordered_and_unordered_runs_group_separately() {
        let html = convert("- bullet\n1. first\n2. second");
        assert_eq!(html.matches("<ul>").count(), 1);
        assert_eq!(html.matches("<ol>").count(), 1);
    }

    #[test]
    fn horizontal_rule_needs_three_hyphens() {
        assert!(convert("---").contains("<hr />"));
        assert!(convert("-----").contains("<hr />"));
        assert!(!convert("--").contains("<hr />"));
    }

    #[test]
    fn double_newline_becomes_line_break() {
        let html = convert("first\n\nsecond");
        assert_eq!(html, "<p>first</p><br /><p>second</p>");
    }

    #[test]
    fn conversion_is_deterministic() {
        let input = "# t\n\n- a\n- b\n\n[x](https://example.com) and https://example.org/path";
        assert_eq!(convert(input), convert(input));
    }

    fn has_nested_anchor(html: &str) -> bool {
        let mut depth = 0usize;
        let mut i = 0;
        while let Some(off) = html[i..].find('<') {
            let at = i + off;
            if html[at..].starts_with("</a>") {
                depth = depth.saturating_sub(1);
                i = at + 4;
            } else if html[at..].starts_with("<a ") || html[at..].starts_with("<a>") {
                depth += 1;
                if depth > 1 {
                    return true;
                }
                i = at + 2;
            } else {
                i = at + 1;
            }
        }
        false
    }
}
