//! CSS injected while the overlay is active

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::overlay::{CONTAINER_ID, TOGGLE_ID, Z_INDEX_CONTAINER, Z_INDEX_TOGGLE};

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?(.*?)['"]?\s*\)"#).expect("static regex")
});

/// Inline styles of the toggle control
pub fn toggle_control_styles() -> [(&'static str, String); 8] {
    [
        ("position", "fixed".to_string()),
        ("bottom", "20px".to_string()),
        ("left", "20px".to_string()),
        ("z-index", Z_INDEX_TOGGLE.to_string()),
        ("padding", "8px 16px".to_string()),
        ("background", "rgba(0, 0, 0, 0.6)".to_string()),
        ("color", "white".to_string()),
        ("cursor", "pointer".to_string()),
    ]
}

/// Stylesheet that hides the page behind the overlay container
pub fn overlay_stylesheet() -> String {
    format!(
        r#"html, body {{
  margin: 0 !important;
  padding: 0 !important;
  overflow: hidden !important;
  overscroll-behavior: none !important;
  height: 100% !important;
  width: 100% !important;
}}
::-webkit-scrollbar {{
  display: none !important;
  width: 0 !important;
  height: 0 !important;
}}
* {{
  scrollbar-width: none !important;
  -ms-overflow-style: none !important;
}}
body > *:not(#{TOGGLE_ID}):not(#{CONTAINER_ID}) {{
  display: none !important;
}}
#{CONTAINER_ID} {{
  display: block !important;
  position: fixed !important;
  top: 0 !important;
  left: 0 !important;
  width: 100vw !important;
  height: 100vh !important;
  z-index: {Z_INDEX_CONTAINER} !important;
  background-size: cover !important;
  background-position: center center !important;
  background-repeat: no-repeat !important;
  margin: 0 !important;
  padding: 0 !important;
  border: none !important;
  overflow: hidden !important;
}}
"#
    )
}

/// URL inside a `background-image` value; `None` for `none` or no `url()`
pub fn extract_css_url(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return None;
    }
    CSS_URL
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| !url.is_empty())
}

/// `url('...')` value safe to put back into a declaration
pub fn css_url_value(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '\\' | '\'' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' | '\r' => {}
            c => escaped.push(c),
        }
    }
    format!("url('{escaped}')")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_css_url_quote_styles() {
        assert_eq!(
            extract_css_url(r#"url("https://img/a.jpg")"#).as_deref(),
            Some("https://img/a.jpg")
        );
        assert_eq!(extract_css_url("url('/a.jpg')").as_deref(), Some("/a.jpg"));
        assert_eq!(extract_css_url("URL( /a.jpg )").as_deref(), Some("/a.jpg"));
    }

    #[test]
    fn test_extract_css_url_absent() {
        assert_eq!(extract_css_url("none"), None);
        assert_eq!(extract_css_url(""), None);
        assert_eq!(extract_css_url("linear-gradient(red, blue)"), None);
        assert_eq!(extract_css_url("url('')"), None);
    }

    #[test]
    fn test_css_url_value_escapes_quotes() {
        assert_eq!(css_url_value("/a'b.jpg"), r"url('/a\'b.jpg')");
    }

    #[test]
    fn test_stylesheet_spares_control_and_container() {
        let css = overlay_stylesheet();
        assert!(css.contains("body > *:not(#bt-fs-toggle):not(#bt-fs-bg)"));
        assert!(css.contains("z-index: 9998"));
        assert!(css.contains("background-size: cover"));
    }
}
