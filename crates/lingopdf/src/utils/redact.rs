//! Redaction of sensitive values from user-visible error messages.

use once_cell::sync::Lazy;
use regex::Regex;

static BEARER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bearer|token|api[_-]?key)[=: ]+\S+")
        .expect("bearer token pattern is valid and should compile")
});
static ABSOLUTE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[A-Za-z]:\\|/)(?:[\w.-]+[/\\])+[\w.-]+")
        .expect("absolute path pattern is valid and should compile")
});

/// Strip tokens and filesystem paths from a message.
///
/// The unredacted message is still available to internal logs; only text
/// destined for job records and API consumers passes through here.
pub fn redact(message: &str) -> String {
    let without_tokens = BEARER_TOKEN.replace_all(message, "$1=[redacted]");
    ABSOLUTE_PATH.replace_all(&without_tokens, "[path]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_bearer_tokens() {
        let msg = "request failed: Bearer sk-live-abcdef123456";
        let redacted = redact(msg);
        assert!(!redacted.contains("sk-live"));
        assert!(redacted.contains("[redacted]"));
    }

    #[test]
    fn test_redacts_api_keys() {
        let redacted = redact("api_key=secret-value rejected");
        assert!(!redacted.contains("secret-value"));
    }

    #[test]
    fn test_redacts_paths() {
        let redacted = redact("failed to open /home/user/docs/report.pdf");
        assert!(!redacted.contains("/home/user"));
        assert!(redacted.contains("[path]"));
    }

    #[test]
    fn test_plain_messages_unchanged() {
        assert_eq!(redact("document is encrypted"), "document is encrypted");
    }
}
