//! Feature toggles (`bt_settings`) and the overlay record (`bt_fullscreen_state`)

use serde::{Deserialize, Serialize};

use super::download::FilenameRuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FullscreenFeature {
    pub enabled: bool,
    /// Re-enter the overlay on page load when it was active last time
    pub auto_fullscreen: bool,
}

impl Default for FullscreenFeature {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_fullscreen: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadFeature {
    pub enabled: bool,
    #[serde(flatten)]
    pub rules: FilenameRuleSet,
}

impl Default for DownloadFeature {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: FilenameRuleSet::default(),
        }
    }
}

/// Global feature toggles plus per-feature sub-settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub fullscreen: FullscreenFeature,
    pub download: DownloadFeature,
}

/// Which feature a `toggleFeature` request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Fullscreen,
    Download,
}

impl FeatureSettings {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Fullscreen => self.fullscreen.enabled,
            Feature::Download => self.download.enabled,
        }
    }

    pub fn set_enabled(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::Fullscreen => self.fullscreen.enabled = enabled,
            Feature::Download => self.download.enabled = enabled,
        }
    }
}

/// Overlay state written on every settled transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FullscreenRecord {
    pub enabled: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl FullscreenRecord {
    pub fn now(enabled: bool) -> Self {
        Self {
            enabled,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
