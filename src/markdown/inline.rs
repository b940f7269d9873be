//! Inline passes: emphasis and images.

use super::{escape_attribute, map_lines};

/// `**bold**` and `*italic*`. Pairs must open and close on the same line and
/// take the leftmost-shortest match; an unpaired marker stays literal.
pub(super) fn emphasis(html: &str) -> String {
    map_lines(html, |line| {
        let line = replace_delimited(line, "**", "strong");
        replace_delimited(&line, "*", "em")
    })
}

fn replace_delimited(line: &str, delimiter: &str, tag: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find(delimiter) {
        let after = &rest[start + delimiter.len()..];
        match after.find(delimiter) {
            Some(span) if span > 0 => {
                out.push_str(&rest[..start]);
                out.push('<');
                out.push_str(tag);
                out.push('>');
                out.push_str(&after[..span]);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
                rest = &after[span + delimiter.len()..];
            }
            _ => {
                out.push_str(&rest[..start + delimiter.len()]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// `![alt](url)` becomes an `<img>` sized to the page width.
pub(super) fn images(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find("![") {
        let after = &rest[start + 2..];
        let Some((alt, url, consumed)) = bracketed_pair(after) else {
            out.push_str(&rest[..start + 2]);
            rest = after;
            continue;
        };
        out.push_str(&rest[..start]);
        out.push_str(&build_image_html(url, alt));
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

/// Parse `alt](url)` at the start of `text`; the alt may be empty, the URL
/// may not, and neither may span lines.
fn bracketed_pair(text: &str) -> Option<(&str, &str, usize)> {
    let alt_end = text.find("](")?;
    let alt = &text[..alt_end];
    if alt.contains('\n') {
        return None;
    }
    let url_start = alt_end + 2;
    let url_end = url_start + text[url_start..].find(')')?;
    let url = &text[url_start..url_end];
    if url.is_empty() || url.contains('\n') {
        return None;
    }
    Some((alt, url, url_end + 1))
}

fn build_image_html(src: &str, alt: &str) -> String {
    format!(
        "<img src=\"{}\" alt=\"{}\" style=\"max-width: 100%; height: auto;\" />",
        escape_attribute(src),
        escape_attribute(alt)
    )
}
