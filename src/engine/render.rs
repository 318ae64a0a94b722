// Skiff Engine — Terminal Rendering Helpers
//
// The view models (conversation, page snapshot, pagination meta) are plain
// data; this module is the terminal's subscriber. It flattens normalized
// HTML into readable text and formats record dates, nothing more.

use ego_tree::NodeRef;
use scraper::{Html, Node};

// ── HTML → text ────────────────────────────────────────────────────────────

/// Flatten an HTML fragment into terminal text: `<br>` and block-element
/// boundaries become newlines, list items get a bullet, tags disappear.
/// Entities come back decoded (the parser handles them), so this also
/// inverts the escaping `normalize` applied.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        walk(child, &mut out);
    }
    collapse_blank_lines(&out)
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "table", "tr", "ul", "ol", "li", "blockquote", "pre", "article", "section", "h1",
    "h2", "h3", "h4", "h5", "h6",
];

fn walk(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&text),
        Node::Element(element) => {
            let name = element.name();
            if name == "br" {
                out.push('\n');
                return;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block && !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            if name == "li" {
                out.push_str("- ");
            }
            for child in node.children() {
                walk(child, out);
            }
            if block && !out.ends_with('\n') {
                out.push('\n');
            }
        }
        _ => {}
    }
}

fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = false;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank_run && !lines.is_empty() {
                lines.push("");
            }
            blank_run = true;
        } else {
            lines.push(line);
            blank_run = false;
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

// ── Record dates ───────────────────────────────────────────────────────────

/// Format a record's date field for display. Sources disagree on the format
/// (RFC 3339 from the table, RFC 2822 from feed imports, bare dates), so
/// each is tried; an unrecognized value is shown verbatim, an absent one as
/// a placeholder.
pub fn format_date(value: Option<&str>) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return "---".into();
    };

    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(value) {
        return parsed.format("%b %-d, %Y").to_string();
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc2822(value) {
        return parsed.format("%b %-d, %Y").to_string();
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return parsed.format("%b %-d, %Y").to_string();
    }
    value.to_string()
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_lines() {
        assert_eq!(html_to_text("<p>first</p><p>second</p>"), "first\nsecond");
    }

    #[test]
    fn line_breaks_are_preserved() {
        assert_eq!(html_to_text("one<br />two"), "one\ntwo");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(html_to_text("a &amp; b &lt;ok&gt;"), "a & b <ok>");
    }

    #[test]
    fn list_items_get_bullets() {
        assert_eq!(html_to_text("<ul><li>one</li><li>two</li></ul>"), "- one\n- two");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("just words"), "just words");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn nested_markup_flattens() {
        let html = "<div><h2>Title</h2><p>Body with <strong>bold</strong>.</p></div>";
        assert_eq!(html_to_text(html), "Title\nBody with bold.");
    }

    #[test]
    fn date_formats_are_recognized() {
        assert_eq!(format_date(Some("2024-03-01T10:30:00Z")), "Mar 1, 2024");
        assert_eq!(format_date(Some("Fri, 01 Mar 2024 10:30:00 +0000")), "Mar 1, 2024");
        assert_eq!(format_date(Some("2024-03-01")), "Mar 1, 2024");
    }

    #[test]
    fn unparsable_or_absent_dates_degrade_gracefully() {
        assert_eq!(format_date(Some("yesterday-ish")), "yesterday-ish");
        assert_eq!(format_date(Some("  ")), "---");
        assert_eq!(format_date(None), "---");
    }
}
