//! Download control and filename composer
//!
//! Renders a "download image" control whose target URL and filename follow
//! the user's [`FilenameRuleSet`], plus a settings panel opened by a
//! secondary activation of the control.

pub mod fetch;
pub mod filename;
pub mod menu;

pub use fetch::{Downloader, HttpDownloader};
pub use filename::NavigationOffset;
pub use menu::SettingsMenu;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{FeatureSettings, FilenameRuleSet, NamingRule, Resolution, Separator};
use crate::constants::download::{
    BUTTON_ID, FALLBACK_FILENAME, MENU_ID, NAMESPACE, NOTIFICATION_CLASS, Z_INDEX_BUTTON, Z_INDEX_MENU,
};
use crate::constants::selectors::{COPYRIGHT, DOWNLOAD_LINK, IMAGE_DESCRIPTION};
use crate::constants::storage;
use crate::constants::timing::BANNER_LIFETIME;
use crate::error::{Error, Result};
use crate::i18n::{Localizer, TextKey};
use crate::page::{Dom, NodeId, Scope};
use crate::settings::{SettingsAdapter, merge_shallow};
use filename::NameFields;

/// Source of the local calendar date
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Everything derived from the page by the last successful recompute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedImageInfo {
    pub source_url: String,
    pub base_name: String,
    pub image_number: Option<String>,
    pub resolution_token: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
    pub date_token: Option<String>,
    pub final_filename: String,
    pub extension: String,
}

pub struct DownloadComposer {
    dom: Arc<dyn Dom>,
    settings: SettingsAdapter,
    strings: Arc<dyn Localizer>,
    today: Clock,

    rules: FilenameRuleSet,
    offset: NavigationOffset,
    info: Option<ResolvedImageInfo>,
    menu: SettingsMenu,
    enabled: bool,
}

impl DownloadComposer {
    pub fn new(dom: Arc<dyn Dom>, settings: SettingsAdapter, strings: Arc<dyn Localizer>) -> Self {
        Self {
            dom,
            settings,
            strings,
            today: Arc::new(|| Local::now().date_naive()),
            rules: FilenameRuleSet::default(),
            offset: NavigationOffset::default(),
            info: None,
            menu: SettingsMenu::default(),
            enabled: true,
        }
    }

    /// Replace the calendar used for the fallback date
    pub fn with_clock(mut self, today: Clock) -> Self {
        self.today = today;
        self
    }

    /// Load the rule set, render the control and panel, compute the first name
    pub async fn mount(&mut self, features: &FeatureSettings) {
        self.rules = self.settings.load_merged(storage::DOWNLOAD_SETTINGS).await;

        if self.dom.element_by_id(BUTTON_ID).is_none() {
            let button = self.dom.create_element("a", Some(BUTTON_ID));
            self.dom.set_attribute(button, "class", &format!("{NAMESPACE}-main-btn"));
            self.dom.set_text(button, &self.strings.text(TextKey::DownloadButton));
            for (property, value) in button_styles() {
                self.dom.set_inline_style(button, property, Some(&value));
            }
            self.dom.append_child(self.dom.scope(Scope::Body), button);
        }
        menu::mount_panel(self.dom.as_ref());

        self.set_enabled(features.download.enabled);
        self.refresh();
        info!(enabled = self.enabled, rules = ?self.rules, "Download feature initialized");
    }

    pub fn rules(&self) -> &FilenameRuleSet {
        &self.rules
    }

    pub fn info(&self) -> Option<&ResolvedImageInfo> {
        self.info.as_ref()
    }

    pub fn offset(&self) -> NavigationOffset {
        self.offset
    }

    pub fn menu(&self) -> &SettingsMenu {
        &self.menu
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rebuild the URL and filename from the current page.
    ///
    /// `Ok(None)` when the page has no download link; the previous result is
    /// kept both then and on error.
    pub fn recompute(&mut self) -> Result<Option<&ResolvedImageInfo>> {
        let Some(link) = self.dom.query(DOWNLOAD_LINK) else {
            debug!("No download link on page");
            return Ok(None);
        };
        let href = self.dom.attribute(link, "href").unwrap_or_default();

        let url = filename::strip_tracking(&href);
        let url = filename::rewrite_resolution(url, self.rules.resolution);
        let name = filename::parse_name_info(&url)
            .ok_or_else(|| Error::PageFormat(format!("no image id in '{url}'")))?;

        let description_link = self.dom.query(IMAGE_DESCRIPTION);
        let description = description_link.and_then(|node| self.text_of(node));
        let copyright = self.dom.query(COPYRIGHT).and_then(|node| self.text_of(node));
        let date = description_link
            .and_then(|node| self.dom.attribute(node, "href"))
            .and_then(|href| filename::extract_date_from_url(&href))
            .unwrap_or_else(|| filename::format_date(self.offset.apply((self.today)())));

        let fields = NameFields {
            base: name.base,
            image_number: name.number,
            resolution: name.resolution,
            description,
            copyright,
            date: Some(date),
            extension: name.extension,
        };
        let final_filename =
            filename::compose_filename(&fields, &self.rules.naming_rules, self.rules.separator);

        let info = ResolvedImageInfo {
            source_url: url,
            base_name: fields.base,
            image_number: fields.image_number,
            resolution_token: fields.resolution,
            description: fields.description,
            copyright: fields.copyright,
            date_token: fields.date,
            final_filename,
            extension: fields.extension,
        };
        debug!(url = %info.source_url, filename = %info.final_filename, "Recomputed download target");
        self.info = Some(info);
        self.update_control();
        Ok(self.info.as_ref())
    }

    /// Pointer entered the control
    pub fn on_hover(&mut self) {
        self.refresh();
    }

    /// Secondary (context) activation of the control opens the panel
    pub fn on_secondary_activation(&mut self) {
        if !self.enabled {
            return;
        }
        self.menu.open(self.rules);
        self.render_menu();
        self.show_menu(true);
    }

    /// Page's "previous image" control
    pub fn on_previous(&mut self) {
        self.offset.previous();
        debug!(offset = self.offset.value(), "Navigated to previous image");
    }

    /// Page's "next image" control
    pub fn on_next(&mut self) {
        self.offset.next();
        debug!(offset = self.offset.value(), "Navigated to next image");
    }

    pub fn select_resolution(&mut self, resolution: Resolution) {
        self.menu.select_resolution(resolution);
        self.render_menu();
    }

    pub fn toggle_rule(&mut self, rule: NamingRule) {
        self.menu.toggle_rule(rule);
        self.render_menu();
    }

    pub fn select_separator(&mut self, separator: Separator) {
        self.menu.select_separator(separator);
        self.render_menu();
    }

    /// Apply the draft, persist it, confirm and close the panel
    pub async fn save_menu(&mut self) -> Option<JoinHandle<()>> {
        let draft = self.menu.draft()?;
        self.rules = draft;
        self.persist().await;
        self.refresh();
        let banner = self.show_banner();
        self.menu.close();
        self.show_menu(false);
        Some(banner)
    }

    /// Restore the default rule set; the panel stays open showing it
    pub async fn reset_menu(&mut self) {
        self.rules = FilenameRuleSet::default();
        self.persist().await;
        self.refresh();
        if self.menu.is_open() {
            self.menu.open(self.rules);
            self.render_menu();
        }
        info!("Download settings reset to defaults");
    }

    /// Close the panel without applying the draft
    pub fn cancel_menu(&mut self) {
        self.menu.close();
        self.show_menu(false);
    }

    /// Show or hide the control; hiding also closes the panel
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if let Some(button) = self.dom.element_by_id(BUTTON_ID) {
            let display = if enabled { "block" } else { "none" };
            self.dom.set_inline_style(button, "display", Some(display));
        }
        if !enabled {
            self.cancel_menu();
        }
    }

    /// Rule set plus the last resolved `url`/`name`
    pub fn download_settings_json(&self) -> Value {
        let mut value = serde_json::to_value(self.rules).unwrap_or(Value::Null);
        if let (Some(map), Some(info)) = (value.as_object_mut(), &self.info) {
            map.insert("url".to_string(), Value::String(info.source_url.clone()));
            map.insert("name".to_string(), Value::String(info.final_filename.clone()));
        }
        value
    }

    /// Merge a settings blob over the current rules, persist and recompute
    pub async fn apply_download_settings(&mut self, blob: Value) -> anyhow::Result<()> {
        let merged = merge_shallow(&self.rules, blob)
            .ok_or_else(|| anyhow::anyhow!("invalid download settings"))?;
        self.rules = merged;
        self.persist().await;
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        if let Err(e) = self.recompute() {
            warn!(error = %e, "Keeping previous download target");
        }
    }

    fn text_of(&self, node: NodeId) -> Option<String> {
        let text = self.dom.text_content(node);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    fn update_control(&self) {
        let (Some(button), Some(info)) = (self.dom.element_by_id(BUTTON_ID), &self.info) else {
            return;
        };
        let name = if info.final_filename.is_empty() {
            FALLBACK_FILENAME
        } else {
            info.final_filename.as_str()
        };
        self.dom.set_attribute(button, "href", &info.source_url);
        self.dom.set_attribute(button, "download", name);
        let hint = self.strings.text(TextKey::SettingsHint);
        self.dom.set_attribute(button, "title", &format!("img name: {name}\n{hint}"));
    }

    fn render_menu(&self) {
        if let (Some(panel), Some(draft)) = (self.panel(), self.menu.draft()) {
            menu::render(self.dom.as_ref(), panel, &draft);
        }
    }

    fn show_menu(&self, visible: bool) {
        if let Some(panel) = self.panel() {
            menu::set_visible(self.dom.as_ref(), panel, visible);
        }
    }

    fn panel(&self) -> Option<NodeId> {
        self.dom.element_by_id(MENU_ID)
    }

    fn show_banner(&self) -> JoinHandle<()> {
        let banner = self.dom.create_element("div", None);
        self.dom.set_attribute(banner, "class", NOTIFICATION_CLASS);
        self.dom.set_text(banner, &self.strings.text(TextKey::SettingsSaved));
        self.dom
            .set_inline_style(banner, "z-index", Some(&(Z_INDEX_MENU + 1).to_string()));
        self.dom.append_child(self.dom.scope(Scope::Body), banner);

        let dom = self.dom.clone();
        tokio::spawn(async move {
            tokio::time::sleep(BANNER_LIFETIME).await;
            dom.remove(banner);
        })
    }

    async fn persist(&self) {
        if !self.settings.set_as(storage::DOWNLOAD_SETTINGS, &self.rules).await {
            debug!("Download settings kept in memory only");
        }
    }
}

fn button_styles() -> [(&'static str, String); 9] {
    [
        ("position", "fixed".to_string()),
        ("right", "20%".to_string()),
        ("top", "12.5%".to_string()),
        ("z-index", Z_INDEX_BUTTON.to_string()),
        ("padding", "0.5em 1em".to_string()),
        ("background", "rgba(195, 209, 207, 0.58)".to_string()),
        ("color", "#333".to_string()),
        ("border-radius", "0.25em".to_string()),
        ("cursor", "pointer".to_string()),
    ]
}
