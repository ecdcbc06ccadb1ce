//! Extraction of unsubscribe actions from `List-Unsubscribe` headers and
//! from rendered HTML bodies.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use html2text::render::text_renderer::{RichAnnotation, TaggedLine};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::UnsubscribeAction;

/// Phrases that mark a body link as an unsubscribe mechanism. Matched
/// case-insensitively against both the link text and its destination.
const KEYWORDS: &[&str] = &[
    "unsubscribe",
    "opt out",
    "opt-out",
    "remove me",
    "stop receiving",
    "manage preferences",
    "email preferences",
    "subscription",
    "manage your account",
    "update profile",
    "subscription settings",
    "email settings",
    "preference center",
];

fn keyword_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(KEYWORDS)
            .expect("static keyword set")
    })
}

/// Parses a `List-Unsubscribe` header value.
///
/// The value is comma-separated; each entry is usually wrapped in angle
/// brackets but does not have to be. Entries without a mailto/http/https
/// scheme are dropped. Order is preserved and duplicates are kept; the
/// caller dedups when it assembles a candidate.
pub fn parse_header(value: &str) -> Vec<UnsubscribeAction> {
    value
        .split(',')
        .map(str::trim)
        .map(|entry| match (entry.find('<'), entry.rfind('>')) {
            (Some(open), Some(close)) if open < close => &entry[open + 1..close],
            _ => entry,
        })
        .filter_map(UnsubscribeAction::from_uri)
        .collect()
}

/// Scans an HTML message body for unsubscribe actions.
///
/// Two channels, merged and deduplicated: every anchor whose visible text or
/// destination mentions one of [`KEYWORDS`] (bare mailto anchors only count
/// when "unsubscribe" appears in the destination), and any element whose
/// entire text is exactly "unsubscribe" — a link yields its destination, a
/// non-link control yields [`UnsubscribeAction::ClickToTrigger`].
///
/// Absence of matches is an empty result, never an error.
pub fn scan_html(html: &str) -> Vec<UnsubscribeAction> {
    // Render wide so an anchor's text rarely wraps across lines.
    let lines = html2text::from_read_rich(html.as_bytes(), 200);
    let (anchors, plain_lines) = collect_anchors(&lines);

    let matcher = keyword_matcher();
    let mut actions = Vec::new();

    for (text, href) in &anchors {
        if href.starts_with("mailto:") && !href.to_ascii_lowercase().contains("unsubscribe") {
            continue;
        }
        if matcher.is_match(text.as_str()) || matcher.is_match(href.as_str()) {
            if let Some(action) = UnsubscribeAction::from_uri(href) {
                actions.push(action);
            }
        }
    }

    // Secondary channel: the webmail's own "Unsubscribe" control.
    for (text, href) in &anchors {
        if text.trim().eq_ignore_ascii_case("unsubscribe") {
            if let Some(action) = UnsubscribeAction::from_uri(href) {
                actions.push(action);
            }
        }
    }
    if plain_lines
        .iter()
        .any(|line| line.trim().eq_ignore_ascii_case("unsubscribe"))
    {
        actions.push(UnsubscribeAction::ClickToTrigger);
    }

    dedup_actions(actions)
}

/// Order-preserving set dedup over extracted actions.
pub fn dedup_actions(actions: Vec<UnsubscribeAction>) -> Vec<UnsubscribeAction> {
    let mut seen = HashSet::new();
    actions
        .into_iter()
        .filter(|action| seen.insert(action.clone()))
        .collect()
}

/// Walks rich-rendered lines and splits them into anchors (visible text plus
/// destination) and plain text. Adjacent fragments pointing at the same
/// destination are one anchor.
fn collect_anchors(
    lines: &[TaggedLine<Vec<RichAnnotation>>],
) -> (Vec<(String, String)>, Vec<String>) {
    let mut anchors = Vec::new();
    let mut plain_lines = Vec::new();

    for line in lines {
        let mut line_plain = String::new();
        let mut current: Option<(String, String)> = None; // (href, text)
        for piece in line.tagged_strings() {
            let href = piece.tag.iter().find_map(|tag| match tag {
                RichAnnotation::Link(href) => Some(href.clone()),
                _ => None,
            });
            if let Some(href) = href {
                let same_target = matches!(&current, Some((open_href, _)) if *open_href == href);
                if same_target {
                    if let Some((_, text)) = current.as_mut() {
                        text.push_str(&piece.s);
                    }
                } else {
                    if let Some((h, t)) = current.take() {
                        anchors.push((t, h));
                    }
                    current = Some((href, piece.s.clone()));
                }
            } else {
                if let Some((h, t)) = current.take() {
                    anchors.push((t, h));
                }
                line_plain.push_str(&piece.s);
            }
        }
        if let Some((h, t)) = current.take() {
            anchors.push((t, h));
        }
        plain_lines.push(line_plain);
    }

    (anchors, plain_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web(url: &str) -> UnsubscribeAction {
        UnsubscribeAction::Web { url: url.into() }
    }

    fn mail(url: &str) -> UnsubscribeAction {
        UnsubscribeAction::Mail { url: url.into() }
    }

    #[test]
    fn header_splits_and_unwraps_brackets() {
        let parsed =
            parse_header("<https://a.example/u>, <mailto:b@example.com>, not-a-link");
        assert_eq!(
            parsed,
            vec![web("https://a.example/u"), mail("mailto:b@example.com")]
        );
    }

    #[test]
    fn header_entry_without_brackets_is_used_verbatim() {
        let parsed = parse_header("https://a.example/u,mailto:b@example.com");
        assert_eq!(
            parsed,
            vec![web("https://a.example/u"), mail("mailto:b@example.com")]
        );
    }

    #[test]
    fn header_keeps_order_and_duplicates() {
        let parsed = parse_header("<https://a.example/u>, <https://a.example/u>");
        assert_eq!(
            parsed,
            vec![web("https://a.example/u"), web("https://a.example/u")]
        );
    }

    #[test]
    fn header_drops_unrecognized_schemes() {
        assert!(parse_header("<ftp://a.example/u>, plain words").is_empty());
        assert!(parse_header("").is_empty());
    }

    #[test]
    fn body_link_matches_on_visible_text() {
        let html = r#"<p>Weekly digest.</p>
            <p><a href="https://news.example/goodbye?id=1">Unsubscribe now</a></p>"#;
        assert_eq!(scan_html(html), vec![web("https://news.example/goodbye?id=1")]);
    }

    #[test]
    fn body_link_matches_on_destination() {
        let html = r#"<a href="https://news.example/unsubscribe/42">click here</a>"#;
        assert_eq!(scan_html(html), vec![web("https://news.example/unsubscribe/42")]);
    }

    #[test]
    fn body_keyword_match_is_case_insensitive() {
        let html = r#"<a href="https://news.example/x">MANAGE PREFERENCES</a>"#;
        assert_eq!(scan_html(html), vec![web("https://news.example/x")]);
    }

    #[test]
    fn bare_mailto_anchor_is_excluded() {
        // Keyword in the text is not enough for a mailto destination.
        let html = r#"<a href="mailto:sales@example.com">email preferences</a>"#;
        assert!(scan_html(html).is_empty());
    }

    #[test]
    fn mailto_with_unsubscribe_destination_is_kept() {
        let html = r#"<a href="mailto:unsubscribe@news.example">contact</a>"#;
        assert_eq!(scan_html(html), vec![mail("mailto:unsubscribe@news.example")]);
    }

    #[test]
    fn unrelated_links_are_ignored() {
        let html = r#"<a href="https://shop.example/deals">Big deals</a>"#;
        assert!(scan_html(html).is_empty());
    }

    #[test]
    fn native_control_without_link_becomes_click_to_trigger() {
        let html = "<div>Unsubscribe</div><p>Thanks for reading.</p>";
        assert_eq!(scan_html(html), vec![UnsubscribeAction::ClickToTrigger]);
    }

    #[test]
    fn duplicate_body_links_collapse() {
        let html = r#"
            <a href="https://news.example/unsubscribe">Unsubscribe</a>
            <a href="https://news.example/unsubscribe">Unsubscribe</a>"#;
        assert_eq!(scan_html(html), vec![web("https://news.example/unsubscribe")]);
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let deduped = dedup_actions(vec![
            web("https://a.example/u"),
            mail("mailto:b@example.com"),
            web("https://a.example/u"),
        ]);
        assert_eq!(
            deduped,
            vec![web("https://a.example/u"), mail("mailto:b@example.com")]
        );
    }
}
