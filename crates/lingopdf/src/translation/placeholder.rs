//! Placeholder protocol for passing protected terms through translation.
//!
//! Protected terms are replaced by `⟦NEO:<n>⟧` markers before the text is
//! sent out; the service passes them through untouched and they are
//! restored afterwards. Natural text never contains the markers; should
//! the delimiters appear anyway, they are doubled on the way out and
//! collapsed on the way back.

const OPEN: char = '⟦';
const CLOSE: char = '⟧';

/// What to put back in place of a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreAction {
    /// The original term, verbatim.
    Preserve,
    /// A user-chosen replacement.
    Replace(String),
}

/// One masked term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderEntry {
    pub token: String,
    pub term: String,
    pub action: RestoreAction,
}

/// Stateful marker allocator; indexes are unique per document.
#[derive(Debug, Default)]
pub struct PlaceholderMasker {
    next_index: usize,
}

impl PlaceholderMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the given byte spans of `text` with fresh markers.
    ///
    /// Spans must be non-overlapping and sorted ascending; they are
    /// processed back-to-front so earlier offsets stay valid.
    pub fn mask(
        &mut self,
        text: &str,
        spans: &[(usize, usize, RestoreAction)],
    ) -> (String, Vec<PlaceholderEntry>) {
        let mut masked = escape_delimiters(text);
        let mut entries = Vec::with_capacity(spans.len());

        // Escaping may shift offsets; recompute them against the escaped
        // text by adjusting for doubled delimiters before each span.
        let mut adjusted: Vec<(usize, usize, RestoreAction)> = Vec::with_capacity(spans.len());
        for (start, end, action) in spans {
            let shift_start = delimiter_count(&text[..*start]);
            let shift_end = delimiter_count(&text[..*end]);
            adjusted.push((
                start + shift_start * OPEN.len_utf8(),
                end + shift_end * OPEN.len_utf8(),
                action.clone(),
            ));
        }

        for (start, end, action) in adjusted.into_iter().rev() {
            let term = masked[start..end].to_string();
            let token = format!("{OPEN}NEO:{}{CLOSE}", self.next_index);
            self.next_index += 1;

            masked.replace_range(start..end, &token);
            entries.push(PlaceholderEntry {
                token,
                term: unescape_delimiters(&term),
                action,
            });
        }

        entries.reverse();
        (masked, entries)
    }
}

/// Swap markers back for their restored text and collapse escaped
/// delimiters.
pub fn restore(text: &str, entries: &[PlaceholderEntry]) -> String {
    let mut restored = text.to_string();
    for entry in entries {
        let replacement = match &entry.action {
            RestoreAction::Preserve => entry.term.clone(),
            RestoreAction::Replace(replacement) => replacement.clone(),
        };
        restored = restored.replace(&entry.token, &escape_delimiters(&replacement));
    }
    unescape_delimiters(&restored)
}

fn delimiter_count(text: &str) -> usize {
    text.chars().filter(|c| *c == OPEN || *c == CLOSE).count()
}

fn escape_delimiters(text: &str) -> String {
    if delimiter_count(text) == 0 {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        out.push(c);
        if c == OPEN || c == CLOSE {
            out.push(c);
        }
    }
    out
}

fn unescape_delimiters(text: &str) -> String {
    if delimiter_count(text) == 0 {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if (c == OPEN || c == CLOSE) && chars.peek() == Some(&c) {
            chars.next();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_and_restore_preserve() {
        let mut masker = PlaceholderMasker::new();
        let text = "the concept of Dasein matters";
        let start = text.find("Dasein").unwrap();
        let (masked, entries) = masker.mask(text, &[(start, start + 6, RestoreAction::Preserve)]);

        assert_eq!(masked, "the concept of ⟦NEO:0⟧ matters");
        // A passthrough translation restores the original term.
        assert_eq!(restore(&masked, &entries), text);
    }

    #[test]
    fn test_mask_and_restore_replace() {
        let mut masker = PlaceholderMasker::new();
        let text = "on Aufhebung and method";
        let start = text.find("Aufhebung").unwrap();
        let (masked, entries) = masker.mask(
            text,
            &[(start, start + 9, RestoreAction::Replace("sublation".into()))],
        );

        let translated = masked.replace("on", "über").replace("and method", "und Methode");
        assert_eq!(restore(&translated, &entries), "über sublation und Methode");
    }

    #[test]
    fn test_indexes_are_unique_across_calls() {
        let mut masker = PlaceholderMasker::new();
        let (first, _) = masker.mask("abc", &[(0, 3, RestoreAction::Preserve)]);
        let (second, _) = masker.mask("def", &[(0, 3, RestoreAction::Preserve)]);
        assert_eq!(first, "⟦NEO:0⟧");
        assert_eq!(second, "⟦NEO:1⟧");
    }

    #[test]
    fn test_multiple_spans_restore_in_order() {
        let mut masker = PlaceholderMasker::new();
        let text = "Sein and Zeit together";
        let (masked, entries) = masker.mask(
            text,
            &[
                (0, 4, RestoreAction::Preserve),
                (9, 13, RestoreAction::Preserve),
            ],
        );
        assert_eq!(masked, "⟦NEO:0⟧ and ⟦NEO:1⟧ together");
        assert_eq!(restore(&masked, &entries), text);
    }

    #[test]
    fn test_natural_delimiters_are_doubled_and_survive() {
        let mut masker = PlaceholderMasker::new();
        let text = "weird ⟦bracket⟧ then Dasein here";
        let start = text.find("Dasein").unwrap();
        let (masked, entries) = masker.mask(text, &[(start, start + 6, RestoreAction::Preserve)]);

        assert!(masked.contains("⟦⟦bracket⟧⟧"));
        assert_eq!(restore(&masked, &entries), text);
    }

    #[test]
    fn test_replacement_containing_delimiters() {
        let mut masker = PlaceholderMasker::new();
        let (masked, entries) = masker.mask(
            "Dasein",
            &[(0, 6, RestoreAction::Replace("a⟦b⟧c".into()))],
        );
        assert_eq!(restore(&masked, &entries), "a⟦b⟧c");
    }
}
