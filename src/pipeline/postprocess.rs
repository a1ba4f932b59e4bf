//! Post-processing: deterministic cleanup of VLM-generated alt text.
//!
//! Even well-prompted models wrap answers in code fences, prefix them with
//! "Alt text:", sprinkle Markdown emphasis, or quote the whole paragraph.
//! None of that belongs in a `descr` attribute a screen reader will speak
//! aloud, so each quirk is removed by one small rule here.
//!
//! ## Rule Order
//!
//! Fences are stripped before labels (a label can sit inside the fence),
//! labels before quotes (the quote usually follows the label), and
//! whitespace is normalised last so earlier rules can rely on line structure.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw VLM answer.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip a leading "Alt text:" / "Description:" / "Caption:" label
/// 4. Strip one pair of wrapping quotes
/// 5. Remove Markdown emphasis and heading/bullet markers
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 7. Collapse whitespace: single spaces within a line, no blank lines
///
/// Returns an empty string when nothing but decoration was produced; the
/// caller treats that as a failed description.
pub fn clean_caption(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = strip_leading_label(&s);
    let s = strip_wrapping_quotes(&s);
    let s = strip_markdown_markers(&s);
    let s = remove_invisible_chars(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Leading label ────────────────────────────────────────────────────

static RE_LEADING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?(?:alt[\s-]?text|alternative text|image description|description|caption)(?:\*\*)?\s*:\s*(?:\*\*)?\s*")
        .unwrap()
});

fn strip_leading_label(input: &str) -> String {
    RE_LEADING_LABEL.replace(input, "").to_string()
}

// ── Rule 4: Wrapping quotes ──────────────────────────────────────────────────

fn strip_wrapping_quotes(input: &str) -> String {
    let t = input.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}')] {
        if t.len() >= 2 && t.starts_with(open) && t.ends_with(close) {
            let inner = &t[open.len_utf8()..t.len() - close.len_utf8()];
            // Only strip when the quotes wrap the whole answer, not two quoted phrases.
            if !inner.contains(close) {
                return inner.to_string();
            }
        }
    }
    t.to_string()
}

// ── Rule 5: Markdown markers ─────────────────────────────────────────────────

static RE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*|__").unwrap());
static RE_LINE_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:#{1,6}\s+|[-*•]\s+)").unwrap());

fn strip_markdown_markers(input: &str) -> String {
    let s = RE_EMPHASIS.replace_all(input, "");
    RE_LINE_MARKERS.replace_all(&s, "").to_string()
}

// ── Rule 6: Invisible characters ─────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

// ── Rule 7: Whitespace ───────────────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_caption_untouched() {
        let s = "A red bicycle leaning against a brick wall.";
        assert_eq!(clean_caption(s), s);
    }

    #[test]
    fn strips_fences() {
        let s = "```text\nA bar chart of monthly sales.\n```";
        assert_eq!(clean_caption(s), "A bar chart of monthly sales.");
    }

    #[test]
    fn strips_label_and_quotes() {
        let s = "Alt text: \"Two people shaking hands in an office.\"";
        assert_eq!(clean_caption(s), "Two people shaking hands in an office.");
    }

    #[test]
    fn strips_bold_label() {
        let s = "**Description:** A map of Europe with capitals marked.";
        assert_eq!(clean_caption(s), "A map of Europe with capitals marked.");
    }

    #[test]
    fn keeps_inner_quotes() {
        let s = "\"Sales\" rises while \"Costs\" falls";
        assert_eq!(clean_caption(s), s);
    }

    #[test]
    fn removes_markdown_markers() {
        let s = "# Chart\n- **Revenue** grows\n- Costs shrink";
        assert_eq!(clean_caption(s), "Chart\nRevenue grows\nCosts shrink");
    }

    #[test]
    fn collapses_blank_lines_and_spaces() {
        let s = "First   sentence.\r\n\r\n\r\nSecond\tsentence.";
        assert_eq!(clean_caption(s), "First sentence.\nSecond sentence.");
    }

    #[test]
    fn removes_invisible_chars() {
        let s = "A\u{200B} cat\u{FEFF}.";
        assert_eq!(clean_caption(s), "A cat.");
    }

    #[test]
    fn decoration_only_is_empty() {
        assert_eq!(clean_caption("```\n\n```"), "");
        assert_eq!(clean_caption("   "), "");
        assert_eq!(clean_caption("Alt text:"), "");
    }
}
