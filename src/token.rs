//! SSO token extraction from the inbox landing page.

use regex::Regex;
use std::sync::LazyLock;

static SSO_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""sso-token" content="([a-z0-9\-]*)""#).expect("sso-token pattern is valid")
});

/// Find the SSO token embedded in the inbox landing page markup.
///
/// The page carries the token as `"sso-token" content="<token>"`. Stale
/// sessions still render the attribute but with an empty value, so empty
/// matches are skipped and the first non-empty one wins.
///
/// Returns `None` when no usable token is present.
pub fn extract_sso_token(html: &str) -> Option<String> {
    SSO_TOKEN_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_token_in_meta_tag() {
        let html = r#"<head><meta name="sso-token" content="3f2a-9bc0-11ee"></head>"#;
        assert_eq!(extract_sso_token(html).as_deref(), Some("3f2a-9bc0-11ee"));
    }

    #[test]
    fn skips_empty_values() {
        let html = r#"
            <meta name="sso-token" content="">
            <meta name="sso-token" content="abc-123">
            <meta name="sso-token" content="def-456">
        "#;
        assert_eq!(extract_sso_token(html).as_deref(), Some("abc-123"));
    }

    #[test]
    fn none_when_only_empty_or_missing() {
        assert_eq!(extract_sso_token(r#"<meta name="sso-token" content="">"#), None);
        assert_eq!(extract_sso_token("<html><body>Sign in</body></html>"), None);
    }

    #[test]
    fn rejects_characters_outside_lowercase_hex_and_hyphen() {
        // Uppercase breaks the match entirely rather than yielding a prefix.
        assert_eq!(extract_sso_token(r#""sso-token" content="ABC-123""#), None);
    }
}
