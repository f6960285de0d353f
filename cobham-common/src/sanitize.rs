//! Input sanitizing
//!
//! Every string supplied by a client (JSON body, query string, path
//! parameters, form fields) is trimmed and HTML-escaped before it reaches
//! a handler.

use serde_json::Value;

/// Escape the characters that are significant in HTML
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape_html`]
///
/// Used for values that must be stored verbatim, such as avatar URLs handed
/// over by the identity provider.
pub fn unescape_html(input: &str) -> String {
    input
        .replace("&#x2F;", "/")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

/// Trim surrounding whitespace, then escape
pub fn clean(input: &str) -> String {
    escape_html(input.trim())
}

/// Recursively clean every string inside a JSON value
///
/// Object keys are left untouched; numbers, booleans and nulls pass through.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(clean(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_json(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_all_special_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;&#x2F;a&gt;"
        );
    }

    #[test]
    fn test_clean_trims_before_escaping() {
        assert_eq!(clean("   rock/pop  "), "rock&#x2F;pop");
    }

    #[test]
    fn test_unescape_restores_urls() {
        let url = "https://cdn.example.com/a.png?x=1&y=2";
        assert_eq!(unescape_html(&escape_html(url)), url);
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(clean("Midnight City"), "Midnight City");
    }

    #[test]
    fn test_sanitize_nested_json() {
        let input = json!({
            "title": " <b>Hello</b> ",
            "isPrivate": true,
            "duration": 215,
            "items": [{ "songId": " abc " }, null],
            "nested": { "note": "a&b" }
        });

        let output = sanitize_json(input);

        assert_eq!(output["title"], "&lt;b&gt;Hello&lt;&#x2F;b&gt;");
        assert_eq!(output["isPrivate"], true);
        assert_eq!(output["duration"], 215);
        assert_eq!(output["items"][0]["songId"], "abc");
        assert!(output["items"][1].is_null());
        assert_eq!(output["nested"]["note"], "a&amp;b");
    }
}
