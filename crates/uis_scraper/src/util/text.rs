//! Whitespace cleanup, sanitization and link handling for scraped text.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Collapses every whitespace run (including NBSP) to one space and trims.
pub fn clean_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes each line independently and drops the empty ones.
pub fn clean_multiline(text: &str) -> String {
    text.lines()
        .map(clean_text)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strips markup and quote characters from untrusted text and caps its length.
///
/// # Arguments
/// * `input` - Raw text pulled out of the page
/// * `max_chars` - Maximum length in characters (not bytes)
///
/// # Returns
/// The cleaned string, possibly empty
pub fn sanitize(input: &str, max_chars: usize) -> String {
    let stripped = HTML_TAG.replace_all(input, "");
    let filtered: String = stripped
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '\\' | '\0'))
        .collect();

    clean_text(&filtered).chars().take(max_chars).collect::<String>().trim_end().to_string()
}

/// Upper-cases the first character, leaving the rest untouched.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolves a possibly-relative link against `base` and appends `;lang=cz`
/// when the link carries no language parameter.
///
/// The portal separates query parameters with `;`, so the pin is appended
/// the same way.
pub fn pin_language(href: &str, base: &str) -> String {
    let absolute = match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    };

    if absolute.contains("lang=") {
        absolute
    } else if absolute.contains('?') {
        format!("{absolute};lang=cz")
    } else {
        format!("{absolute}?lang=cz")
    }
}

/// Makes a link absolute and checks it points at the allow-listed host over https.
///
/// Returns None for foreign hosts, plain http and unparseable input.
pub fn validate_url(href: &str, allowed_host: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let parsed = if href.starts_with('/') {
        Url::parse(&format!("https://{allowed_host}{href}")).ok()?
    } else {
        Url::parse(href).ok()?
    };

    if parsed.scheme() != "https" {
        return None;
    }

    let host = parsed.host_str()?;
    if host == allowed_host || host.ends_with(&format!(".{allowed_host}")) {
        Some(parsed.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a \n\t b\u{a0}c  "), "a b c");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_clean_multiline_drops_empty_lines() {
        assert_eq!(clean_multiline("  first   line \n\n   \n second\tline "), "first line\nsecond line");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("<b>Jan</b> \"Novák\"", 200), "Jan Novák");
        assert_eq!(sanitize("a\\b'c\0", 200), "abc");
        assert_eq!(sanitize("abcdef", 3), "abc");
        assert_eq!(sanitize("<i></i>", 10), "");
        // Multi-byte characters count once
        assert_eq!(sanitize("čřž", 2), "čř");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("zkouška"), "Zkouška");
        assert_eq!(capitalize_first("čtvrtek"), "Čtvrtek");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_pin_language() {
        let base = "https://is.mendelu.cz/auth/lide/";
        assert_eq!(
            pin_language("clovek.pl?id=42", base),
            "https://is.mendelu.cz/auth/lide/clovek.pl?id=42;lang=cz"
        );
        assert_eq!(
            pin_language("clovek.pl?id=42;lang=en", base),
            "https://is.mendelu.cz/auth/lide/clovek.pl?id=42;lang=en"
        );
    }

    #[test]
    fn test_validate_url() {
        let host = "is.mendelu.cz";
        assert_eq!(
            validate_url("/auth/lide/clovek.pl?id=1", host).as_deref(),
            Some("https://is.mendelu.cz/auth/lide/clovek.pl?id=1")
        );
        assert!(validate_url("https://is.mendelu.cz/auth/", host).is_some());
        assert!(validate_url("http://is.mendelu.cz/auth/", host).is_none());
        assert!(validate_url("https://evil.example.com/is.mendelu.cz", host).is_none());
        assert!(validate_url("https://notis.mendelu.cz.evil.com/", host).is_none());
        assert!(validate_url("", host).is_none());
    }
}
