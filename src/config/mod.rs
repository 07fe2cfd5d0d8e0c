//! Configuration for bing-tools
//!
//! - **download**: the filename rule set edited from the settings panel
//! - **features**: feature toggles and the last overlay record
//! - **app**: paths and locale resolved at startup

pub mod app;
pub mod download;
pub mod features;

// Re-export commonly used types
pub use app::AppConfig;
pub use download::{FilenameRuleSet, NamingRule, NamingRules, Resolution, Separator};
pub use features::{Feature, FeatureSettings, FullscreenRecord};
