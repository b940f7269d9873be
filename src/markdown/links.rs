//! Link passes: explicit link syntax, reference lists, bare URLs, and the
//! anchor cleanup sweeps that run after them.
//!
//! The reference-list and bare-URL passes share one set of URLs already
//! turned into anchors during this call, so a URL cited in a reference list
//! is not hyperlinked again when it reappears in prose. Pass order decides
//! the winner.

use std::collections::HashSet;
use std::ops::Range;

use url::Url;

use super::escape_attribute;

/// `[](url)` becomes an anchor labeled with the URL host. A URL the parser
/// rejects still renders as a link, with the raw URL as both href and text.
pub(super) fn empty_label_links(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut i = 0;

    while let Some(offset) = html[i..].find('[') {
        let at = i + offset;
        out.push_str(&html[i..at]);
        if at > 0 && bytes[at - 1] == b'!' {
            out.push('[');
            i = at + 1;
            continue;
        }
        match empty_label_at(&html[at..]) {
            Some((url, consumed)) => {
                out.push_str(&host_anchor(url));
                i = at + consumed;
            }
            None => {
                out.push('[');
                i = at + 1;
            }
        }
    }

    out.push_str(&html[i..]);
    out
}

fn empty_label_at(text: &str) -> Option<(&str, usize)> {
    let inner = &text[1..];
    let label_end = inner.find(']')?;
    if !inner[..label_end].chars().all(char::is_whitespace) {
        return None;
    }
    let after = &inner[label_end + 1..];
    if !after.starts_with('(') {
        return None;
    }
    let url_len = after[1..].find(')')?;
    let url = &after[1..1 + url_len];
    if url.is_empty() || url.contains('\n') {
        return None;
    }
    Some((url, label_end + url_len + 4))
}

/// `[text](url)` keeps its label.
pub(super) fn labeled_links(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut i = 0;

    while let Some(offset) = html[i..].find('[') {
        let at = i + offset;
        out.push_str(&html[i..at]);
        if at > 0 && bytes[at - 1] == b'!' {
            out.push('[');
            i = at + 1;
            continue;
        }
        match labeled_pair(&html[at + 1..]) {
            Some((label, url, consumed)) => {
                out.push_str(&anchor(url, label));
                i = at + 1 + consumed;
            }
            None => {
                out.push('[');
                i = at + 1;
            }
        }
    }

    out.push_str(&html[i..]);
    out
}

fn labeled_pair(text: &str) -> Option<(&str, &str, usize)> {
    let label_end = text.find("](")?;
    let label = &text[..label_end];
    if label.is_empty() || label.contains('\n') {
        return None;
    }
    let url_start = label_end + 2;
    let url_len = text[url_start..].find(')')?;
    let url = &text[url_start..url_start + url_len];
    if url.is_empty() || url.contains('\n') {
        return None;
    }
    Some((label, url, url_start + url_len + 1))
}

/// Reference-list lines: `<n>. <url>` keeps its numeric prefix while the URL
/// becomes a host-labeled anchor. Each linked URL is recorded so later passes
/// leave repeat mentions as plain text.
pub(super) fn reference_list_urls(html: &str, seen: &mut HashSet<String>) -> String {
    let mut lines = Vec::new();
    for line in html.split('\n') {
        lines.push(reference_line(line, seen));
    }
    lines.join("\n")
}

fn reference_line(line: &str, seen: &mut HashSet<String>) -> String {
    let digits = line.bytes().take_while(|byte| byte.is_ascii_digit()).count();
    if digits == 0 {
        return line.to_string();
    }
    let Some(after_dot) = line[digits..].strip_prefix('.') else {
        return line.to_string();
    };
    let mut chars = after_dot.chars();
    match chars.next() {
        Some(ch) if ch.is_whitespace() => {}
        _ => return line.to_string(),
    }
    let rest = chars.as_str();
    if !rest.starts_with("http://") && !rest.starts_with("https://") {
        return line.to_string();
    }

    let url_len = rest
        .find(|ch: char| ch.is_whitespace() || ch == '<')
        .unwrap_or(rest.len());
    let url = &rest[..url_len];
    let tail = &rest[url_len..];
    // guards tails that already carry anchor markup, e.g. raw `</a>` in the note
    let already_anchored = tail
        .find('<')
        .is_some_and(|pos| tail[pos..].starts_with("</a>"));
    if already_anchored || seen.contains(url) {
        return line.to_string();
    }

    seen.insert(url.to_string());
    let prefix = &line[..line.len() - rest.len()];
    format!("{prefix}{}{tail}", host_anchor(url))
}

/// Standalone `http(s)://` URLs in running text become host-labeled anchors.
/// URLs inside tags or anchor bodies, URLs already linked this call, and URLs
/// immediately followed by `)` are left alone; a URL the parser rejects stays
/// literal text.
pub(super) fn bare_urls(html: &str, seen: &mut HashSet<String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut anchor_depth = 0usize;
    let mut i = 0;

    while i < html.len() {
        let rest = &html[i..];
        if rest.starts_with('<') {
            let tag_len = rest.find('>').map(|pos| pos + 1).unwrap_or(rest.len());
            let tag = &rest[..tag_len];
            if tag.starts_with("</a") {
                anchor_depth = anchor_depth.saturating_sub(1);
            } else if tag.starts_with("<a ") || tag.starts_with("<a>") {
                anchor_depth += 1;
            }
            out.push_str(tag);
            i += tag_len;
            continue;
        }

        if anchor_depth == 0 {
            if let Some(url) = bare_url_at(rest) {
                if rest[url.len()..].starts_with(')') || seen.contains(url) {
                    out.push_str(url);
                } else {
                    seen.insert(url.to_string());
                    match parsed_host(url) {
                        Some(host) => out.push_str(&external_anchor(url, &host)),
                        None => out.push_str(url),
                    }
                }
                i += url.len();
                continue;
            }
        }

        match rest.chars().next() {
            Some(ch) => {
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }

    out
}

fn bare_url_at(text: &str) -> Option<&str> {
    let scheme_len = if text.starts_with("https://") {
        8
    } else if text.starts_with("http://") {
        7
    } else {
        return None;
    };

    let token_len = text
        .find(|ch: char| !is_url_char(ch))
        .unwrap_or(text.len());
    if token_len <= scheme_len {
        return None;
    }
    let token = &text[..token_len];

    let authority = &token[scheme_len..];
    let host_len = authority.find('/').unwrap_or(authority.len());
    if !authority[..host_len].contains('.') {
        return None;
    }
    Some(token)
}

fn is_url_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '-' | '@' | ':' | '%' | '_' | '+' | '.' | '~' | '#' | '?' | '&' | '/' | '='
        )
}

/// Remove anchor nesting by stripping the enclosing anchor's tags, keeping
/// its content. Repeats until no nesting remains.
pub(super) fn unnest_anchors(html: &str) -> String {
    let mut current = html.to_string();
    while let Some((open, close)) = find_nested_anchor(&current) {
        current.replace_range(close, "");
        current.replace_range(open, "");
    }
    current
}

fn find_nested_anchor(html: &str) -> Option<(Range<usize>, Range<usize>)> {
    let mut enclosing: Option<Range<usize>> = None;
    let mut i = 0;

    while let Some(offset) = html[i..].find('<') {
        let at = i + offset;
        let rest = &html[at..];
        if rest.starts_with("</a>") {
            enclosing = None;
            i = at + 4;
        } else if rest.starts_with("<a ") || rest.starts_with("<a>") {
            let tag_end = at + rest.find('>')? + 1;
            if let Some(outer) = enclosing {
                let close = matching_close(html, tag_end)?;
                return Some((outer, close));
            }
            enclosing = Some(at..tag_end);
            i = tag_end;
        } else {
            i = at + 1;
        }
    }

    None
}

/// Find the close tag of the anchor enclosing the nested open tag that ends
/// at `from`. Level counts the outer anchor plus the one just opened.
fn matching_close(html: &str, from: usize) -> Option<Range<usize>> {
    let mut level = 2usize;
    let mut i = from;

    while let Some(offset) = html[i..].find('<') {
        let at = i + offset;
        let rest = &html[at..];
        if rest.starts_with("</a>") {
            level -= 1;
            if level == 0 {
                return Some(at..at + 4);
            }
            i = at + 4;
        } else if rest.starts_with("<a ") || rest.starts_with("<a>") {
            level += 1;
            i = at + rest.find('>')? + 1;
        } else {
            i = at + 1;
        }
    }

    None
}

/// Rewrite every simple anchor to the canonical attribute set: `http(s)`
/// hrefs open in a new tab with `rel="noopener noreferrer"`, everything else
/// gets a bare href. Anchors with markup inside their body are left as built.
pub(super) fn normalize_anchors(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut i = 0;

    while let Some(offset) = html[i..].find("<a ") {
        let at = i + offset;
        out.push_str(&html[i..at]);

        let Some(open_len) = html[at..].find('>') else {
            out.push_str(&html[at..]);
            return out;
        };
        let open_tag = &html[at..at + open_len + 1];
        let body_start = at + open_len + 1;
        let Some(body_len) = html[body_start..].find("</a>") else {
            out.push_str(&html[at..]);
            return out;
        };
        let body = &html[body_start..body_start + body_len];
        let end = body_start + body_len + 4;

        match attribute_value(open_tag, "href") {
            Some(href) if !body.is_empty() && !body.contains('<') => {
                out.push_str(&canonical_anchor(href, body));
            }
            _ => out.push_str(&html[at..end]),
        }
        i = end;
    }

    out.push_str(&html[i..]);
    out
}

fn attribute_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

// `href` comes out of a tag we built, so it is already attribute-escaped.
fn canonical_anchor(href: &str, text: &str) -> String {
    if href.starts_with("http") {
        format!("<a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">{text}</a>")
    } else {
        format!("<a href=\"{href}\">{text}</a>")
    }
}

fn host_anchor(url: &str) -> String {
    match parsed_host(url) {
        Some(host) => external_anchor(url, &host),
        None => plain_anchor(url, url),
    }
}

fn anchor(url: &str, text: &str) -> String {
    if url.starts_with("http") {
        external_anchor(url, text)
    } else {
        plain_anchor(url, text)
    }
}

fn parsed_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

fn external_anchor(href: &str, text: &str) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{text}</a>",
        escape_attribute(href)
    )
}

fn plain_anchor(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{text}</a>", escape_attribute(href))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seen() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn empty_label_takes_host_as_text() {
        let html = empty_label_links("[](https://example.com/a/b)");
        assert_eq!(
            html,
            "<a href=\"https://example.com/a/b\" target=\"_blank\" rel=\"noopener noreferrer\">example.com</a>"
        );
    }

    #[test]
    fn whitespace_only_label_counts_as_empty() {
        let html = empty_label_links("[  ](https://example.com)");
        assert!(html.contains(">example.com</a>"));
    }

    #[test]
    fn empty_label_parse_failure_falls_back_to_raw_url() {
        assert_eq!(
            empty_label_links("[](./relative)"),
            "<a href=\"./relative\">./relative</a>"
        );
    }

    #[test]
    fn labeled_link_keeps_its_text() {
        assert_eq!(
            labeled_links("[the paper](https://example.com/p)"),
            "<a href=\"https://example.com/p\" target=\"_blank\" rel=\"noopener noreferrer\">the paper</a>"
        );
    }

    #[test]
    fn image_syntax_is_not_a_link() {
        let input = "![alt](https://example.com/x.png)";
        assert_eq!(labeled_links(input), input);
        assert_eq!(empty_label_links("![](https://example.com/x.png)"), "![](https://example.com/x.png)");
    }

    #[test]
    fn reference_line_keeps_prefix_and_links_host() {
        let mut urls = seen();
        let html = reference_list_urls("3. https://example.org/cited", &mut urls);
        assert!(html.starts_with("3. <a href=\"https://example.org/cited\""));
        assert!(html.contains(">example.org</a>"));
        assert!(urls.contains("https://example.org/cited"));
    }

    #[test]
    fn reference_line_requires_url_right_after_number() {
        let mut urls = seen();
        let line = "3. see https://example.org";
        assert_eq!(reference_list_urls(line, &mut urls), line);
        assert!(urls.is_empty());
    }

    #[test]
    fn reference_line_with_anchored_tail_is_left_alone() {
        let mut urls = seen();
        let line = "1. https://example.com/a</a>";
        assert_eq!(reference_list_urls(line, &mut urls), line);
        assert!(urls.is_empty());
    }

    #[test]
    fn duplicate_reference_urls_link_only_once() {
        let mut urls = seen();
        let html = reference_list_urls(
            "1. https://example.com/a\n2. https://example.com/a",
            &mut urls,
        );
        assert_eq!(html.matches("<a href=").count(), 1);
    }

    #[test]
    fn bare_url_becomes_host_anchor() {
        let mut urls = seen();
        let html = bare_urls("read https://example.com/notes today", &mut urls);
        assert_eq!(
            html,
            "read <a href=\"https://example.com/notes\" target=\"_blank\" rel=\"noopener noreferrer\">example.com</a> today"
        );
    }

    #[test]
    fn bare_url_inside_existing_anchor_is_ignored() {
        let mut urls = seen();
        let input = "<a href=\"https://a.com\">https://a.com</a>";
        assert_eq!(bare_urls(input, &mut urls), input);
    }

    #[test]
    fn bare_url_inside_attribute_is_ignored() {
        let mut urls = seen();
        let input = "<img src=\"https://example.com/x.png\" /> text";
        assert_eq!(bare_urls(input, &mut urls), input);
    }

    #[test]
    fn seen_url_stays_plain_text() {
        let mut urls = seen();
        urls.insert("https://example.com/a".to_string());
        assert_eq!(
            bare_urls("again https://example.com/a", &mut urls),
            "again https://example.com/a"
        );
    }

    #[test]
    fn url_without_a_dotted_host_is_not_linked() {
        let mut urls = seen();
        assert_eq!(
            bare_urls("http://localhost/admin", &mut urls),
            "http://localhost/admin"
        );
    }

    #[test]
    fn nested_anchor_collapses_to_inner() {
        let html = unnest_anchors(
            "<a href=\"outer\">before <a href=\"inner\">kept</a> after</a>",
        );
        assert_eq!(html, "before <a href=\"inner\">kept</a> after");
    }

    #[test]
    fn doubly_nested_anchors_fully_collapse() {
        let html = unnest_anchors(
            "<a href=\"1\"><a href=\"2\"><a href=\"3\">x</a></a></a>",
        );
        assert_eq!(html, "<a href=\"3\">x</a>");
    }

    #[test]
    fn normalize_adds_attributes_to_http_anchors() {
        let html = normalize_anchors("<a href=\"https://example.com\">x</a>");
        assert_eq!(
            html,
            "<a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\">x</a>"
        );
    }

    #[test]
    fn normalize_strips_attributes_from_relative_anchors() {
        let html = normalize_anchors(
            "<a href=\"/local\" target=\"_blank\" rel=\"noopener noreferrer\">x</a>",
        );
        assert_eq!(html, "<a href=\"/local\">x</a>");
    }

    #[test]
    fn normalize_leaves_anchors_with_markup_bodies() {
        let input = "<a href=\"/x\"><strong>b</strong></a>";
        assert_eq!(normalize_anchors(input), input);
    }
}
