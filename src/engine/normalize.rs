// Skiff Engine — Response Normalization
//
// Workflow webhooks answer with whatever their last node produced: an HTML
// fragment, a JSON object with one of several field names, or plain text.
// Nothing about the shape is negotiated, so the client normalizes after the
// fact. `normalize` turns any of those payloads into an HTML string that is
// safe to hand to a rendering surface.
//
// `sanitize_html` is the second, narrower job: a structural strip of
// dangerous element kinds from raw HTML stored in a record field, used by
// the detail view only.

use crate::atoms::constants::{BOT_PAYLOAD_FIELDS, DENYLIST_TAGS};
use scraper::{Html, Selector};

// ── Escaping ───────────────────────────────────────────────────────────────

/// HTML-escape with DOM `textContent` semantics: `&`, `<`, `>`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape, then turn newlines into explicit line breaks.
pub fn plain_text_to_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br />")
}

// ── Normalization ──────────────────────────────────────────────────────────

/// Normalize a raw reply body using the default candidate field order.
pub fn normalize(raw: &str) -> String {
    normalize_with_fields(raw, BOT_PAYLOAD_FIELDS)
}

/// Normalize a raw reply body into displayable HTML.
///
/// - Empty or whitespace-only input → empty string (the caller supplies its
///   own fallback copy).
/// - Input that starts with `<` and ends with `>` is trusted to already be
///   HTML and returned as-is. A shape heuristic, deliberately not a parse.
/// - Input that starts with `{` or `[` is parsed as JSON; the first field in
///   `fields` holding a non-empty string wins. An HTML-looking winner passes
///   through unchanged, anything else is escaped with `\n` → `<br />`.
/// - Everything else (including malformed JSON and JSON without a candidate
///   field) is escaped as plain text. This function never fails.
pub fn normalize_with_fields<S: AsRef<str>>(raw: &str, fields: &[S]) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return trimmed.to_string();
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(candidate) = first_present_field(&parsed, fields) {
                return if candidate.trim_start().starts_with('<') {
                    candidate.to_string()
                } else {
                    plain_text_to_html(candidate)
                };
            }
        }
        // Malformed JSON or no candidate field: degrade to plain text.
    }

    plain_text_to_html(trimmed)
}

/// First field in `fields` whose value is a non-empty string. Order matters:
/// it is the tie-break when a producer sets several candidates at once.
fn first_present_field<'a, S: AsRef<str>>(
    value: &'a serde_json::Value,
    fields: &[S],
) -> Option<&'a str> {
    fields.iter().find_map(|field| {
        value
            .get(field.as_ref())
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    })
}

// ── Structural sanitizer ───────────────────────────────────────────────────

/// Strip `script`, `style`, `link`, `iframe`, `object`, and `embed` elements
/// (with their subtrees) from an HTML fragment and return the rest unchanged.
///
/// This is a structural strip, not an allowlist sanitizer: retained elements
/// keep every attribute, inline event handlers included. Treat the output as
/// reduced-trust content — render it where handlers cannot fire, or swap in
/// a real allowlist sanitizer before putting it in front of a live DOM.
pub fn sanitize_html(raw: &str) -> String {
    let mut fragment = Html::parse_fragment(raw);

    // DENYLIST_TAGS as one comma selector; parse can't fail on static input.
    let selector = Selector::parse(&DENYLIST_TAGS.join(",")).unwrap();
    let doomed: Vec<_> = fragment.select(&selector).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }

    fragment.root_element().inner_html()
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // normalize: the three producer shapes

    #[test]
    fn empty_and_whitespace_yield_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t  "), "");
    }

    #[test]
    fn html_shaped_text_passes_through_unchanged() {
        let html = "<div><p>already html</p></div>";
        assert_eq!(normalize(html), html);
        // Idempotent on its own output.
        assert_eq!(normalize(&normalize(html)), normalize(html));
    }

    #[test]
    fn html_shape_is_judged_after_trimming() {
        assert_eq!(normalize("  <p>hi</p>\n"), "<p>hi</p>");
    }

    #[test]
    fn plain_text_is_escaped_with_line_breaks() {
        assert_eq!(normalize("a<b & c\nd"), "a&lt;b &amp; c<br />d");
    }

    #[test]
    fn json_answer_field_is_converted() {
        assert_eq!(normalize(r#"{"answer": "hi\nthere"}"#), "hi<br />there");
    }

    #[test]
    fn json_html_valued_field_passes_through() {
        assert_eq!(normalize(r#"{"output": "<p>ok</p>"}"#), "<p>ok</p>");
    }

    #[test]
    fn json_field_order_is_the_tie_break() {
        // `html` outranks `output` regardless of key order in the object.
        let raw = r#"{"output": "second", "html": "first"}"#;
        assert_eq!(normalize(raw), "first");
    }

    #[test]
    fn json_skips_non_string_and_blank_candidates() {
        let raw = r#"{"html": 5, "output": "   ", "answer": "real"}"#;
        assert_eq!(normalize(raw), "real");
    }

    #[test]
    fn malformed_json_degrades_to_escaped_text() {
        assert_eq!(normalize("{not json"), "{not json");
        assert_eq!(normalize("{<oops>"), "{&lt;oops&gt;");
    }

    #[test]
    fn json_without_candidates_degrades_to_escaped_text() {
        assert_eq!(normalize(r#"{"unrelated": true}"#), r#"{"unrelated": true}"#);
        // A top-level array has no fields at all.
        assert_eq!(normalize("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn custom_field_order_is_honored() {
        let raw = r#"{"html": "generic", "reply": "specific"}"#;
        assert_eq!(normalize_with_fields(raw, &["reply", "html"]), "specific");
    }

    // sanitize_html: structural strip

    #[test]
    fn strips_every_denylisted_kind() {
        let raw = "<script>alert(1)</script><style>p{}</style>\
                   <link rel=\"x\"><iframe src=\"a\"></iframe>\
                   <object></object><embed><p>keep</p>";
        assert_eq!(sanitize_html(raw), "<p>keep</p>");
    }

    #[test]
    fn strips_nested_script_but_keeps_surroundings() {
        let raw = "<div>before<script>bad()</script>after</div>";
        assert_eq!(sanitize_html(raw), "<div>beforeafter</div>");
    }

    #[test]
    fn retained_elements_keep_their_attributes() {
        // The documented gap: event handlers on retained elements survive.
        let raw = r#"<p onclick="evil()">text</p>"#;
        assert_eq!(sanitize_html(raw), r#"<p onclick="evil()">text</p>"#);
    }

    #[test]
    fn sanitize_of_plain_text_is_lossless() {
        assert_eq!(sanitize_html("just words"), "just words");
        assert_eq!(sanitize_html(""), "");
    }
}
