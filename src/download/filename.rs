//! Pure filename helpers
//!
//! Everything here works on plain strings so the naming rules can be tested
//! without a page.

use chrono::{Days, NaiveDate};
use regex::{NoExpand, Regex};
use std::sync::LazyLock;

use crate::config::{NamingRule, NamingRules, Resolution, Separator};
use crate::constants::download::{MAX_DATE_OFFSET, MIN_DATE_OFFSET};
use crate::constants::filename::{FORBIDDEN_CHARS, MAX_LENGTH};

static RESOLUTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}x[0-9]{3,4}").expect("static regex"));

static IMAGE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=(.+?\.(jpg|png))").expect("static regex"));

static DESCRIPTION_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Date:%([0-9]+)_").expect("static regex"));

static RESERVED_STEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])$").expect("static regex")
});

/// Drop the tracking suffix (`&rf` onward)
pub fn strip_tracking(url: &str) -> &str {
    url.split("&rf").next().unwrap_or(url)
}

/// Replace the first `WIDTHxHEIGHT` token with the configured resolution
pub fn rewrite_resolution(url: &str, resolution: Resolution) -> String {
    match resolution.token() {
        Some(token) => RESOLUTION_TOKEN.replace(url, NoExpand(token)).into_owned(),
        None => url.to_string(),
    }
}

/// Positional tokens of the image id (`OHR.<base>_<number>_<resolution>.<ext>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfo {
    pub base: String,
    pub number: Option<String>,
    /// Resolution tag without its extension
    pub resolution: Option<String>,
    pub extension: String,
}

/// Parse the `id=` segment of an image URL; `None` when the page format changed
pub fn parse_name_info(url: &str) -> Option<NameInfo> {
    let caps = IMAGE_ID.captures(url)?;
    let segment = caps.get(1)?.as_str();
    let extension = caps.get(2)?.as_str().to_string();

    let segment = segment.strip_prefix("OHR.").unwrap_or(segment);
    let tokens: Vec<&str> = segment.split('_').collect();
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    Some(NameInfo {
        base: tokens.first().copied().unwrap_or_default().to_string(),
        number: tokens.get(1).copied().and_then(non_empty),
        resolution: tokens
            .get(2)
            .copied()
            .and_then(|t| t.split('.').next())
            .and_then(non_empty),
        extension,
    })
}

/// Eight-digit date from a description link (`...Date:%2220240501_...`)
///
/// The digit run starts with the two hex digits of an encoded quote, so only
/// its last eight digits are the date.
pub fn extract_date_from_url(url: &str) -> Option<String> {
    let digits = DESCRIPTION_DATE.captures(url)?.get(1)?.as_str();
    let count = digits.chars().count();
    if count < 8 {
        return None;
    }
    Some(digits.chars().skip(count - 8).collect())
}

/// `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Session-only day offset driven by the page's previous/next controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationOffset(i32);

impl NavigationOffset {
    pub fn value(self) -> i32 {
        self.0
    }

    pub fn previous(&mut self) {
        self.0 = (self.0 - 1).max(MIN_DATE_OFFSET);
    }

    pub fn next(&mut self) {
        self.0 = (self.0 + 1).min(MAX_DATE_OFFSET);
    }

    /// `today` shifted by the offset
    pub fn apply(self, today: NaiveDate) -> NaiveDate {
        let days = Days::new(u64::from(self.0.unsigned_abs()));
        let shifted = if self.0 < 0 {
            today.checked_sub_days(days)
        } else {
            today.checked_add_days(days)
        };
        shifted.unwrap_or(today)
    }
}

/// Candidate values for each naming rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFields {
    pub base: String,
    pub image_number: Option<String>,
    pub resolution: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
    pub date: Option<String>,
    pub extension: String,
}

impl NameFields {
    fn part(&self, rule: NamingRule) -> Option<&str> {
        match rule {
            NamingRule::BaseName => Some(self.base.as_str()),
            NamingRule::ImageNumber => self.image_number.as_deref(),
            NamingRule::Resolution => self.resolution.as_deref(),
            NamingRule::Description => self.description.as_deref(),
            NamingRule::Copyright => self.copyright.as_deref(),
            NamingRule::DateInfo => self.date.as_deref(),
        }
    }
}

/// Build the sanitized download filename from the enabled rules
pub fn compose_filename(fields: &NameFields, rules: &NamingRules, separator: Separator) -> String {
    let parts: Vec<&str> = rules
        .enabled()
        .filter_map(|rule| fields.part(rule))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let joined = parts.join(&separator.as_char().to_string());
    let mut name = collapse_separators(&joined, separator);

    if name.is_empty() || name == format!(".{}", fields.extension) {
        name = fields.base.clone();
    }
    sanitize_filename(&format!("{name}.{}", fields.extension))
}

/// Collapse runs of 2+ separator characters and trim them from both ends
pub fn collapse_separators(name: &str, separator: Separator) -> String {
    let mut out = String::with_capacity(name.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.chars().count() >= 2 {
            out.push(separator.as_char());
        } else {
            out.push_str(run);
        }
        run.clear();
    };

    for c in name.chars() {
        if separator.matches(c) {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);

    out.trim_matches(|c| separator.matches(c)).to_string()
}

/// Make `name` safe for common filesystems
pub fn sanitize_filename(name: &str) -> String {
    let mut clean = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if FORBIDDEN_CHARS.contains(&c) { '_' } else { c };
        if c == '.' && clean.ends_with('.') {
            continue;
        }
        clean.push(c);
    }

    let stem = clean.split('.').next().unwrap_or_default();
    if RESERVED_STEM.is_match(stem) {
        clean.insert(0, '_');
    }

    clean.chars().take(MAX_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str =
        "https://www.bing.com/th?id=OHR.Foo_EN-US1234567890_1366x768.jpg&rf=LaDigue_1366x768.jpg&pid=hp";

    #[test]
    fn test_strip_tracking() {
        assert_eq!(
            strip_tracking(PAGE_URL),
            "https://www.bing.com/th?id=OHR.Foo_EN-US1234567890_1366x768.jpg"
        );
        assert_eq!(strip_tracking("/th?id=a.jpg"), "/th?id=a.jpg");
    }

    #[test]
    fn test_rewrite_resolution_replaces_token_only() {
        let url = strip_tracking(PAGE_URL);
        assert_eq!(
            rewrite_resolution(url, Resolution::FullHd),
            "https://www.bing.com/th?id=OHR.Foo_EN-US1234567890_1920x1080.jpg"
        );
        assert_eq!(
            rewrite_resolution(url, Resolution::Uhd),
            "https://www.bing.com/th?id=OHR.Foo_EN-US1234567890_UHD.jpg"
        );
        assert_eq!(rewrite_resolution(url, Resolution::Native), url);
    }

    #[test]
    fn test_rewrite_resolution_first_match_only() {
        assert_eq!(
            rewrite_resolution("/1366x768/OHR.A_1_1366x768.jpg", Resolution::Hd720),
            "/1280x720/OHR.A_1_1366x768.jpg"
        );
    }

    #[test]
    fn test_parse_name_info() {
        let info = parse_name_info("/th?id=OHR.Foo_EN-US1234567890_1920x1080.jpg").unwrap();
        assert_eq!(info.base, "Foo");
        assert_eq!(info.number.as_deref(), Some("EN-US1234567890"));
        assert_eq!(info.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(info.extension, "jpg");
    }

    #[test]
    fn test_parse_name_info_short_id() {
        let info = parse_name_info("/th?id=Foo.png").unwrap();
        assert_eq!(info.base, "Foo.png");
        assert_eq!(info.number, None);
        assert_eq!(info.resolution, None);
        assert_eq!(info.extension, "png");
    }

    #[test]
    fn test_parse_name_info_mismatch() {
        assert_eq!(parse_name_info("/th?q=Foo.webp"), None);
        assert_eq!(parse_name_info("/images/Foo.jpg"), None);
    }

    #[test]
    fn test_extract_date_from_url() {
        assert_eq!(
            extract_date_from_url("/search?q=Foo&filters=HpDate:%2220240501_0700%22").as_deref(),
            Some("20240501")
        );
        assert_eq!(extract_date_from_url("/search?q=Foo"), None);
        assert_eq!(extract_date_from_url("HpDate:%22_"), None);
    }

    #[test]
    fn test_non_ascii_digits_are_not_a_date() {
        // Arabic-Indic digits are multi-byte and must not be sliced
        assert_eq!(
            extract_date_from_url("/search?q=x&filters=HpDate:%\u{0660}1234567_"),
            None
        );
        assert_eq!(
            extract_date_from_url("/search?filters=HpDate:%\u{0661}\u{0662}20240501_").as_deref(),
            None
        );
        assert_eq!(
            rewrite_resolution("/th?id=OHR.A_1_\u{0661}920x1080.jpg", Resolution::Uhd),
            "/th?id=OHR.A_1_\u{0661}920x1080.jpg"
        );
    }

    #[test]
    fn test_navigation_offset_is_clamped() {
        let mut offset = NavigationOffset::default();
        offset.next();
        assert_eq!(offset.value(), 0);
        for _ in 0..20 {
            offset.previous();
            assert!((MIN_DATE_OFFSET..=MAX_DATE_OFFSET).contains(&offset.value()));
        }
        assert_eq!(offset.value(), -7);
        offset.next();
        assert_eq!(offset.value(), -6);
    }

    #[test]
    fn test_offset_applies_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let mut offset = NavigationOffset::default();
        offset.previous();
        offset.previous();
        assert_eq!(format_date(offset.apply(today)), "2024-05-01");
        assert_eq!(format_date(NavigationOffset::default().apply(today)), "2024-05-03");
    }

    fn fields() -> NameFields {
        NameFields {
            base: "Foo".to_string(),
            image_number: Some("EN-US1234567890".to_string()),
            resolution: Some("1920x1080".to_string()),
            description: Some("  Lighthouse at dusk ".to_string()),
            copyright: Some("© Someone/Getty Images".to_string()),
            date: Some("2024-05-01".to_string()),
            extension: "jpg".to_string(),
        }
    }

    #[test]
    fn test_compose_base_and_date() {
        let mut rules = NamingRules::none();
        rules.base_name = true;
        rules.date_info = true;
        assert_eq!(
            compose_filename(&fields(), &rules, Separator::Hyphen),
            "Foo-2024-05-01.jpg"
        );
    }

    #[test]
    fn test_compose_keeps_fixed_order() {
        let mut rules = NamingRules::none();
        for rule in NamingRule::ORDER.into_iter().rev() {
            rules.set(rule, true);
        }
        assert_eq!(
            compose_filename(&fields(), &rules, Separator::Underscore),
            "Foo_EN-US1234567890_1920x1080_Lighthouse at dusk_© Someone_Getty Images_2024-05-01.jpg"
        );
    }

    #[test]
    fn test_compose_skips_empty_parts() {
        let mut f = fields();
        f.description = Some("   ".to_string());
        f.image_number = None;
        let mut rules = NamingRules::default();
        rules.image_number = true;
        assert_eq!(compose_filename(&f, &rules, Separator::Comma), "Foo,2024-05-01.jpg");
    }

    #[test]
    fn test_compose_empty_falls_back_to_base() {
        assert_eq!(
            compose_filename(&fields(), &NamingRules::none(), Separator::Underscore),
            "Foo.jpg"
        );
    }

    #[test]
    fn test_compose_has_no_separator_runs() {
        let mut f = fields();
        f.description = Some("__Sea__stacks_".to_string());
        let rules = NamingRules::default();
        let name = compose_filename(&f, &rules, Separator::Underscore);
        assert_eq!(name, "Foo_Sea_stacks_2024-05-01.jpg");
        assert!(!name.contains("__"));
    }

    #[test]
    fn test_compose_every_rule_subset() {
        for separator in Separator::ALL {
            let sep = separator.as_char();
            let f = NameFields {
                base: "Foo".to_string(),
                image_number: Some("N123".to_string()),
                resolution: Some(String::new()),
                description: Some(format!("Sea{sep}stacks")),
                copyright: Some("Getty".to_string()),
                date: Some("20240501".to_string()),
                extension: "jpg".to_string(),
            };

            for mask in 0u8..64 {
                let mut rules = NamingRules::none();
                for (bit, rule) in NamingRule::ORDER.into_iter().enumerate() {
                    rules.set(rule, mask & (1 << bit) != 0);
                }

                let mut expected: Vec<&str> = rules
                    .enabled()
                    .filter_map(|rule| f.part(rule))
                    .filter(|part| !part.is_empty())
                    .collect();
                if expected.is_empty() {
                    expected.push("Foo");
                }

                let name = compose_filename(&f, &rules, separator);
                let stem = name.strip_suffix(".jpg").unwrap();
                assert_eq!(stem, expected.join(&sep.to_string()), "{separator:?} {mask:#08b}");

                let chars: Vec<char> = stem.chars().collect();
                assert!(!separator.matches(chars[0]), "{name}");
                assert!(!separator.matches(chars[chars.len() - 1]), "{name}");
                assert!(
                    !chars.windows(2).any(|w| separator.matches(w[0]) && separator.matches(w[1])),
                    "{name}"
                );
            }
        }
    }

    #[test]
    fn test_space_separator_collapses_any_whitespace() {
        assert_eq!(collapse_separators(" a \t b  c ", Separator::Space), "a b c");
        // A lone tab is not a run
        assert_eq!(collapse_separators("a\tb", Separator::Space), "a\tb");
    }

    #[test]
    fn test_sanitize_forbidden_chars_and_dots() {
        assert_eq!(sanitize_filename(r#"a<b>c:d"e/f\g|h?i*.jpg"#), "a_b_c_d_e_f_g_h_i_.jpg");
        assert_eq!(sanitize_filename("a...b..jpg"), "a.b.jpg");
    }

    #[test]
    fn test_sanitize_reserved_names() {
        assert_eq!(sanitize_filename("CON.jpg"), "_CON.jpg");
        assert_eq!(sanitize_filename("lpt1"), "_lpt1");
        assert_eq!(sanitize_filename("com7.tar.gz"), "_com7.tar.gz");
        assert_eq!(sanitize_filename("console.jpg"), "console.jpg");
    }

    #[test]
    fn test_sanitize_truncates_chars() {
        let long = "é".repeat(300);
        let clean = sanitize_filename(&long);
        assert_eq!(clean.chars().count(), MAX_LENGTH);

        let input: String = (0..1000).map(|i| ['a', '?', '.', '|'][i % 4]).collect();
        let clean = sanitize_filename(&input);
        assert!(clean.chars().count() <= MAX_LENGTH);
        assert!(!clean.chars().any(|c| FORBIDDEN_CHARS.contains(&c)));
    }
}
