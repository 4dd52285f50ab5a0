//! Post-processing: deterministic cleanup of the model's free-text answer.
//!
//! Vision models asked for `Label - NN%` lines still answer in their own
//! style: the whole reply wrapped in a code fence, Windows line endings,
//! zero-width characters pasted from their training data, ragged blank
//! lines. None of that changes the meaning, but all of it gets in the way
//! of line-based parsing and of showing the raw text to the user.
//!
//! The rules here never drop or reorder content lines, so the composition
//! extracted from the cleaned text is the one the model meant.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so a CRLF reply
//! still has its fence recognised (the fence regex tolerates `\r`), and
//! invisible characters go before trimming so a line holding only a
//! zero-width space becomes blank and can be collapsed.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all clean-up rules to the raw VLM output.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (models sometimes disobey the prompt)
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
/// 4. Trim trailing whitespace per line
/// 5. Collapse runs of blank lines down to one
/// 6. Trim leading and trailing blank lines
pub fn clean_response(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language() {
        let input = "```text\nGrains - 30%\nFruit - 20%\n```";
        assert_eq!(strip_outer_fence(input), "Grains - 30%\nFruit - 20%");
    }

    #[test]
    fn test_strip_fence_no_lang() {
        let input = "```\nGrains - 30%\n```";
        assert_eq!(strip_outer_fence(input), "Grains - 30%");
    }

    #[test]
    fn test_no_fence_passthrough() {
        let input = "Grains - 30%";
        assert_eq!(strip_outer_fence(input), "Grains - 30%");
    }

    #[test]
    fn test_inner_fence_is_kept() {
        let input = "Intro\n```\nGrains - 30%\n```\nOutro";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  Fruit - 20%   \nVeg - 10%\t"),
            "  Fruit - 20%\nVeg - 10%"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "Fru\u{200B}it\u{FEFF} - 2\u{00AD}0%";
        assert_eq!(remove_invisible_chars(input), "Fruit - 20%");
    }

    #[test]
    fn test_clean_response_full_pipeline() {
        let input = "```\r\nThe plan breaks down as:\r\n\r\n\r\n\r\nGrains - 30%   \r\nFruit\u{200B} - 20%\r\n```\r\n";
        assert_eq!(
            clean_response(input),
            "The plan breaks down as:\n\nGrains - 30%\nFruit - 20%"
        );
    }

    #[test]
    fn test_clean_response_empty() {
        assert_eq!(clean_response(""), "");
        assert_eq!(clean_response("\n\n  \n"), "");
    }
}
