//! Block-level passes: headings, tables, lists, rules, paragraphs.

use super::map_lines;

/// `#` through `#####` at line start become `<h1>`..`<h5>`. Six or more
/// hashes, or a missing space, leave the line for the paragraph pass.
pub(super) fn headings(markdown: &str) -> String {
    map_lines(markdown, |line| {
        let hashes = line.bytes().take_while(|byte| *byte == b'#').count();
        if (1..=5).contains(&hashes) {
            if let Some(rest) = line[hashes..].strip_prefix(' ') {
                if !rest.is_empty() {
                    return format!("<h{hashes}>{rest}</h{hashes}>");
                }
            }
        }
        line.to_string()
    })
}

/// A table is a header row, a separator row, and at least one body row, each
/// delimited by pipes. Cell counts are taken verbatim per row; shapes short of
/// that are left for the paragraph pass.
pub(super) fn tables(html: &str) -> String {
    let lines: Vec<&str> = html.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut index = 0;

    while index < lines.len() {
        let is_table_start = index + 2 < lines.len()
            && is_table_row(lines[index])
            && is_separator_row(lines[index + 1])
            && is_table_row(lines[index + 2]);
        if !is_table_start {
            out.push(lines[index].to_string());
            index += 1;
            continue;
        }

        let header = split_cells(lines[index]);
        let mut rows = Vec::new();
        let mut cursor = index + 2;
        while cursor < lines.len() && is_table_row(lines[cursor]) {
            rows.push(split_cells(lines[cursor]));
            cursor += 1;
        }
        out.push(build_table_html(&header, &rows));
        index = cursor;
    }

    out.join("\n")
}

fn is_table_row(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('|') && line.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    line.starts_with('|')
        && line.contains('-')
        && line
            .chars()
            .all(|ch| matches!(ch, '|' | '-' | ':' | ' ' | '\t'))
}

fn split_cells(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_table_html(header: &[String], rows: &[Vec<String>]) -> String {
    let mut table = String::from("<table><thead><tr>");
    for cell in header {
        table.push_str("<th>");
        table.push_str(cell);
        table.push_str("</th>");
    }
    table.push_str("</tr></thead><tbody>");
    for row in rows {
        table.push_str("<tr>");
        for cell in row {
            table.push_str("<td>");
            table.push_str(cell);
            table.push_str("</td>");
        }
        table.push_str("</tr>");
    }
    table.push_str("</tbody></table>");
    table
}

/// Individual list lines become `<li>` items tagged with their list kind; the
/// grouping pass later wraps contiguous runs and drops the tag.
pub(super) fn list_items(html: &str) -> String {
    map_lines(html, |line| {
        if let Some(rest) = line.strip_prefix("- ") {
            if !rest.is_empty() {
                return format!("<li data-list=\"unordered\">{rest}</li>");
            }
        }
        if let Some(rest) = ordered_rest(line) {
            if !rest.is_empty() {
                return format!("<li data-list=\"ordered\">{rest}</li>");
            }
        }
        line.to_string()
    })
}

fn ordered_rest(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(|byte| byte.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

/// Three or more hyphens alone on a line become a horizontal rule.
pub(super) fn horizontal_rules(html: &str) -> String {
    map_lines(html, |line| {
        if line.len() >= 3 && line.bytes().all(|byte| byte == b'-') {
            "<hr />".to_string()
        } else {
            line.to_string()
        }
    })
}

/// Wrap remaining content lines in `<p>`. Lines already emitted by a block
/// pass are recognized by their opening tag; blank lines produce nothing.
pub(super) fn paragraphs(html: &str) -> String {
    map_lines(html, |line| {
        if line.trim().is_empty() {
            return String::new();
        }
        if is_block_output(line) {
            return line.to_string();
        }
        format!("<p>{line}</p>")
    })
}

// <h covers headings and <hr />, <t tables, <l list items, <i images
fn is_block_output(line: &str) -> bool {
    line.starts_with("<h") || line.starts_with("<t") || line.starts_with("<l") || line.starts_with("<i")
}

/// Collapse the blank line left between blocks into an explicit break.
pub(super) fn line_breaks(html: &str) -> String {
    html.replace("\n\n", "<br />")
}

/// Wrap contiguous runs of same-kind items in a single `<ul>` or `<ol>`.
/// Runs separated by anything other than whitespace stay separate lists.
pub(super) fn group_lists(html: &str) -> String {
    let html = wrap_item_runs(html, "unordered", "ul");
    wrap_item_runs(&html, "ordered", "ol")
}

fn wrap_item_runs(html: &str, kind: &str, wrapper: &str) -> String {
    let open = format!("<li data-list=\"{kind}\">");
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(offset) = html[cursor..].find(open.as_str()) {
        let run_start = cursor + offset;
        out.push_str(&html[cursor..run_start]);

        let mut position = run_start;
        let mut items = String::new();
        loop {
            let body_start = position + open.len();
            let Some(close) = html[body_start..].find("</li>") else {
                break;
            };
            items.push_str("<li>");
            items.push_str(&html[body_start..body_start + close]);
            items.push_str("</li>");
            position = body_start + close + "</li>".len();

            let rest = &html[position..];
            let gap = rest.len() - rest.trim_start().len();
            if rest[gap..].starts_with(open.as_str()) {
                items.push_str(&rest[..gap]);
                position += gap;
            } else {
                break;
            }
        }

        if position == run_start {
            // unterminated item, copy the marker through untouched
            out.push_str(&open);
            cursor = run_start + open.len();
            continue;
        }

        out.push('<');
        out.push_str(wrapper);
        out.push('>');
        out.push_str(&items);
        out.push_str("</");
        out.push_str(wrapper);
        out.push('>');
        cursor = position;
    }

    out.push_str(&html[cursor..]);
    out
}
