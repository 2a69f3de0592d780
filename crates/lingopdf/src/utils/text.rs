//! Text normalization applied before submission to the translation service.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]")
        .expect("control char pattern is valid and should compile")
});
static INLINE_RUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t\r\x{A0}\x{2000}-\x{200B}\x{3000}]{2,}|[\t\r\x{A0}\x{2000}-\x{200B}\x{3000}]")
        .expect("inline whitespace pattern is valid and should compile")
});
static NEEDS_NEWLINE_FIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r" \n|\n |\n{2,}").expect("newline detector pattern is valid and should compile")
});
static NEWLINE_FIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r" *\n[ \n]*").expect("newline fix pattern is valid and should compile")
});

/// Collapse runs of spaces and newlines and strip control characters.
///
/// Interior newlines survive as single newlines so line boundaries
/// reported by the OCR parser are kept; all other whitespace collapses to
/// single spaces. Already-clean text is returned borrowed.
pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
    let mut out: Cow<'_, str> = Cow::Borrowed(text.trim());

    for (pattern, replacement) in [
        (&*CONTROL_CHARS, ""),
        (&*INLINE_RUNS, " "),
    ] {
        if pattern.is_match(&out) {
            let replaced = pattern.replace_all(&out, replacement).into_owned();
            out = Cow::Owned(replaced);
        }
    }

    if NEEDS_NEWLINE_FIX.is_match(&out) {
        let replaced = NEWLINE_FIX.replace_all(&out, "\n").into_owned();
        out = Cow::Owned(replaced);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_space_runs() {
        assert_eq!(normalize_whitespace("a   b\t\tc"), "a b c");
    }

    #[test]
    fn test_collapses_newline_runs() {
        assert_eq!(normalize_whitespace("a\n\n\nb"), "a\nb");
    }

    #[test]
    fn test_spaces_around_newlines_removed() {
        assert_eq!(normalize_whitespace("a \n b"), "a\nb");
    }

    #[test]
    fn test_trims_and_strips_controls() {
        assert_eq!(normalize_whitespace("  a\u{0000}b  "), "ab");
    }

    #[test]
    fn test_clean_text_is_borrowed() {
        assert!(matches!(normalize_whitespace("already clean"), Cow::Borrowed(_)));
        assert!(matches!(normalize_whitespace("two\nlines"), Cow::Borrowed(_)));
    }
}
