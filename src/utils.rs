// Utility functions

/// Turns a locale such as `es_MX` into an `Accept-Language` value (`es-MX,es;q=0.9`).
pub fn accept_language(locale: &str) -> String {
    let tag = locale.trim().replace('_', "-");
    match tag.split_once('-') {
        Some((lang, _)) if !lang.is_empty() => format!("{},{};q=0.9", tag, lang.to_lowercase()),
        _ if tag.is_empty() => "en-US,en;q=0.9".to_string(),
        _ => tag.to_lowercase(),
    }
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Percent-encodes a value for use inside a cookie.
pub fn encode_cookie_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_to_accept_language() {
        assert_eq!(accept_language("es_MX"), "es-MX,es;q=0.9");
        assert_eq!(accept_language("de"), "de");
        assert_eq!(accept_language(""), "en-US,en;q=0.9");
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace("  500 Main St\n\n  San Francisco "), "500 Main St San Francisco");
    }

    #[test]
    fn cookie_values_are_encoded() {
        assert_eq!(encode_cookie_value("San Francisco, CA"), "San+Francisco%2C+CA");
    }
}
