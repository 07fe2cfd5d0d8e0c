//! Filename rule set persisted under `bt_download_settings`
//!
//! Field names follow the stored JSON blob (`namingRules`, `imgNO`, ...), so
//! blobs written by older builds keep loading.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target resolution written into the image URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "UHD")]
    Uhd,
    #[serde(rename = "1920x1080")]
    FullHd,
    #[serde(rename = "1366x768")]
    Hd1366,
    #[serde(rename = "1280x720")]
    Hd720,
    /// Leave whatever resolution the page offers
    #[serde(rename = "")]
    Native,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::Uhd,
        Resolution::FullHd,
        Resolution::Hd1366,
        Resolution::Hd720,
        Resolution::Native,
    ];

    /// Token substituted into the URL, `None` for the page default
    pub fn token(self) -> Option<&'static str> {
        match self {
            Resolution::Uhd => Some("UHD"),
            Resolution::FullHd => Some("1920x1080"),
            Resolution::Hd1366 => Some("1366x768"),
            Resolution::Hd720 => Some("1280x720"),
            Resolution::Native => None,
        }
    }

    pub fn label(self) -> &'static str {
        self.token().unwrap_or("Default")
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(Resolution::Native);
        }
        Resolution::ALL
            .into_iter()
            .find(|r| r.token().is_some_and(|t| t.eq_ignore_ascii_case(s)))
            .ok_or_else(|| anyhow::anyhow!("unsupported resolution '{s}'"))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Character joining filename parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Separator {
    #[default]
    #[serde(rename = "_")]
    Underscore,
    #[serde(rename = "-")]
    Hyphen,
    #[serde(rename = ",")]
    Comma,
    #[serde(rename = " ")]
    Space,
    #[serde(rename = ".")]
    Dot,
}

impl Separator {
    pub const ALL: [Separator; 5] = [
        Separator::Underscore,
        Separator::Hyphen,
        Separator::Comma,
        Separator::Space,
        Separator::Dot,
    ];

    pub fn as_char(self) -> char {
        match self {
            Separator::Underscore => '_',
            Separator::Hyphen => '-',
            Separator::Comma => ',',
            Separator::Space => ' ',
            Separator::Dot => '.',
        }
    }

    /// Whether `c` counts as this separator when collapsing runs
    pub fn matches(self, c: char) -> bool {
        match self {
            Separator::Space => c.is_whitespace(),
            other => c == other.as_char(),
        }
    }
}

impl FromStr for Separator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("space") {
            return Ok(Separator::Space);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Separator::ALL
                .into_iter()
                .find(|sep| sep.as_char() == c)
                .ok_or_else(|| anyhow::anyhow!("unsupported separator '{s}'")),
            _ => Err(anyhow::anyhow!("separator must be a single character, got '{s}'")),
        }
    }
}

/// One togglable component of the composed filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamingRule {
    BaseName,
    ImageNumber,
    Resolution,
    Description,
    Copyright,
    DateInfo,
}

impl NamingRule {
    /// Composition order of the filename parts
    pub const ORDER: [NamingRule; 6] = [
        NamingRule::BaseName,
        NamingRule::ImageNumber,
        NamingRule::Resolution,
        NamingRule::Description,
        NamingRule::Copyright,
        NamingRule::DateInfo,
    ];

    /// Key used in the stored blob
    pub fn key(self) -> &'static str {
        match self {
            NamingRule::BaseName => "baseName",
            NamingRule::ImageNumber => "imgNO",
            NamingRule::Resolution => "imgResolution",
            NamingRule::Description => "description",
            NamingRule::Copyright => "copyright",
            NamingRule::DateInfo => "dateInfo",
        }
    }
}

impl FromStr for NamingRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamingRule::ORDER
            .into_iter()
            .find(|rule| rule.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown naming rule '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingRules {
    #[serde(rename = "baseName")]
    pub base_name: bool,
    #[serde(rename = "imgNO")]
    pub image_number: bool,
    #[serde(rename = "imgResolution")]
    pub resolution: bool,
    #[serde(rename = "dateInfo")]
    pub date_info: bool,
    pub description: bool,
    pub copyright: bool,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            base_name: true,
            image_number: false,
            resolution: false,
            date_info: true,
            description: true,
            copyright: false,
        }
    }
}

impl NamingRules {
    /// All rules off
    pub fn none() -> Self {
        Self {
            base_name: false,
            image_number: false,
            resolution: false,
            date_info: false,
            description: false,
            copyright: false,
        }
    }

    pub fn is_enabled(&self, rule: NamingRule) -> bool {
        match rule {
            NamingRule::BaseName => self.base_name,
            NamingRule::ImageNumber => self.image_number,
            NamingRule::Resolution => self.resolution,
            NamingRule::Description => self.description,
            NamingRule::Copyright => self.copyright,
            NamingRule::DateInfo => self.date_info,
        }
    }

    pub fn set(&mut self, rule: NamingRule, enabled: bool) {
        let flag = match rule {
            NamingRule::BaseName => &mut self.base_name,
            NamingRule::ImageNumber => &mut self.image_number,
            NamingRule::Resolution => &mut self.resolution,
            NamingRule::Description => &mut self.description,
            NamingRule::Copyright => &mut self.copyright,
            NamingRule::DateInfo => &mut self.date_info,
        };
        *flag = enabled;
    }

    pub fn toggle(&mut self, rule: NamingRule) {
        self.set(rule, !self.is_enabled(rule));
    }

    /// Enabled rules in composition order
    pub fn enabled(&self) -> impl Iterator<Item = NamingRule> + '_ {
        NamingRule::ORDER.into_iter().filter(|rule| self.is_enabled(*rule))
    }
}

/// User-configured naming rules for downloaded images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilenameRuleSet {
    pub resolution: Resolution,
    pub naming_rules: NamingRules,
    pub separator: Separator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_stored_shape() {
        let value = serde_json::to_value(FilenameRuleSet::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "resolution": "UHD",
                "namingRules": {
                    "baseName": true,
                    "imgNO": false,
                    "imgResolution": false,
                    "dateInfo": true,
                    "description": true,
                    "copyright": false
                },
                "separator": "_"
            })
        );
    }

    #[test]
    fn test_native_resolution_is_empty_string() {
        let rules: FilenameRuleSet = serde_json::from_value(json!({ "resolution": "" })).unwrap();
        assert_eq!(rules.resolution, Resolution::Native);
        assert_eq!(rules.resolution.token(), None);
    }

    #[test]
    fn test_partial_blob_is_fully_defined() {
        let rules: FilenameRuleSet = serde_json::from_value(json!({
            "separator": "-",
            "namingRules": { "copyright": true }
        }))
        .unwrap();

        assert_eq!(rules.separator, Separator::Hyphen);
        assert_eq!(rules.resolution, Resolution::Uhd);
        assert!(rules.naming_rules.copyright);
        assert!(rules.naming_rules.base_name);
        assert!(!rules.naming_rules.image_number);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        // Older builds stored the last url/name in the same blob
        let rules: FilenameRuleSet = serde_json::from_value(json!({
            "url": "https://example.com/a.jpg",
            "name": "a.jpg",
            "enabled": true,
            "resolution": "1366x768"
        }))
        .unwrap();
        assert_eq!(rules.resolution, Resolution::Hd1366);
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!("1920x1080".parse::<Resolution>().unwrap(), Resolution::FullHd);
        assert_eq!("uhd".parse::<Resolution>().unwrap(), Resolution::Uhd);
        assert_eq!("default".parse::<Resolution>().unwrap(), Resolution::Native);
        assert!("800x600".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_separator_from_str() {
        assert_eq!("space".parse::<Separator>().unwrap(), Separator::Space);
        assert_eq!(".".parse::<Separator>().unwrap(), Separator::Dot);
        assert!("+".parse::<Separator>().is_err());
        assert!("--".parse::<Separator>().is_err());
    }

    #[test]
    fn test_space_separator_matches_any_whitespace() {
        assert!(Separator::Space.matches('\t'));
        assert!(!Separator::Hyphen.matches('_'));
    }

    #[test]
    fn test_toggle_and_order() {
        let mut rules = NamingRules::none();
        rules.toggle(NamingRule::DateInfo);
        rules.toggle(NamingRule::BaseName);
        rules.set(NamingRule::Copyright, true);

        let enabled: Vec<_> = rules.enabled().collect();
        assert_eq!(
            enabled,
            vec![NamingRule::BaseName, NamingRule::Copyright, NamingRule::DateInfo]
        );
    }

    #[test]
    fn test_naming_rule_from_key() {
        assert_eq!("imgNO".parse::<NamingRule>().unwrap(), NamingRule::ImageNumber);
        assert_eq!("dateinfo".parse::<NamingRule>().unwrap(), NamingRule::DateInfo);
        assert!("colour".parse::<NamingRule>().is_err());
    }
}
