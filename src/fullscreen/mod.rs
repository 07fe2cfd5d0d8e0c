//! Fullscreen overlay controller
//!
//! Renders the page's background image in a full-viewport container, hides
//! everything else and keeps native fullscreen in step with it.
//!
//! ```text
//! Normal --toggle--> Entering --found--> Active --toggle/Escape--> Exiting --> Normal
//!                       |
//!                       +--search exhausted--> Normal
//! ```

pub mod native;
pub mod styles;

pub use native::{MemoryFullscreen, NativeFullscreen};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{FeatureSettings, FullscreenRecord};
use crate::constants::overlay::{CONTAINER_ID, NAMESPACE, STYLE_ID, TOGGLE_ID};
use crate::constants::selectors::BACKGROUND_IMAGE;
use crate::constants::storage;
use crate::constants::timing::{BACKGROUND_SEARCH_ATTEMPTS, BACKGROUND_SEARCH_PERIOD};
use crate::error::Error;
use crate::i18n::{Localizer, TextKey};
use crate::page::{self, Dom, LayoutStyle, NodeId, Scope};
use crate::settings::SettingsAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Normal,
    Entering,
    Active,
    Exiting,
}

/// Root/body layout captured on entry
pub type LayoutSnapshot = HashMap<Scope, LayoutStyle>;

type Search = Pin<Box<dyn Future<Output = Option<(NodeId, u32)>> + Send>>;

pub struct OverlayController {
    dom: Arc<dyn Dom>,
    native: Arc<dyn NativeFullscreen>,
    settings: SettingsAdapter,
    strings: Arc<dyn Localizer>,

    phase: Phase,
    native_active: bool,
    snapshot: Option<LayoutSnapshot>,
    background_url: Option<String>,
    pending_toggle: bool,
    enabled: bool,

    /// Background element search started by an enter that found nothing
    search: Option<Search>,
    search_retries: u32,
    search_period: Duration,
}

impl OverlayController {
    pub fn new(
        dom: Arc<dyn Dom>,
        native: Arc<dyn NativeFullscreen>,
        settings: SettingsAdapter,
        strings: Arc<dyn Localizer>,
    ) -> Self {
        let native_active = native.is_active();
        Self {
            dom,
            native,
            settings,
            strings,
            phase: Phase::Normal,
            native_active,
            snapshot: None,
            background_url: None,
            pending_toggle: false,
            enabled: true,
            search: None,
            search_retries: BACKGROUND_SEARCH_ATTEMPTS,
            search_period: BACKGROUND_SEARCH_PERIOD,
        }
    }

    /// Render the toggle control and optionally restore the last overlay
    pub async fn mount(&mut self, features: &FeatureSettings) {
        let control = match self.dom.element_by_id(TOGGLE_ID) {
            Some(control) => control,
            None => {
                let control = self.dom.create_element("button", Some(TOGGLE_ID));
                self.dom.set_attribute(control, "class", &format!("{NAMESPACE}-toggle"));
                for (property, value) in styles::toggle_control_styles() {
                    self.dom.set_inline_style(control, property, Some(&value));
                }
                self.dom.append_child(self.dom.scope(Scope::Body), control);
                control
            }
        };
        debug!(control, "Mounted fullscreen toggle");
        self.set_enabled(features.fullscreen.enabled);
        self.update_label();

        if self.enabled && features.fullscreen.auto_fullscreen {
            let record: Option<FullscreenRecord> =
                self.settings.get_as(storage::FULLSCREEN_STATE).await;
            if record.is_some_and(|r| r.enabled) {
                info!("Restoring overlay from last session");
                self.toggle().await;
            }
        }
        info!(enabled = self.enabled, "Fullscreen feature initialized");
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_overlay_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn is_native_active(&self) -> bool {
        self.native_active
    }

    pub fn snapshot(&self) -> Option<&LayoutSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn background_url(&self) -> Option<&str> {
        self.background_url.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Override the background search cadence
    pub fn with_search_policy(mut self, retries: u32, period: Duration) -> Self {
        self.search_retries = retries;
        self.search_period = period;
        self
    }

    /// Enter when normal, exit when active; queued while transitioning
    pub async fn toggle(&mut self) {
        match self.phase {
            Phase::Normal => self.begin_enter().await,
            Phase::Active => self.exit().await,
            Phase::Entering | Phase::Exiting => {
                debug!(phase = ?self.phase, "Toggle while transitioning, queued");
                self.pending_toggle = true;
            }
        }
        self.apply_pending().await;
    }

    /// Key press forwarded from the page
    pub async fn on_key(&mut self, key: &str) {
        if key == "Escape" && self.phase == Phase::Active {
            debug!("Escape pressed, leaving overlay");
            self.exit().await;
            self.apply_pending().await;
        }
    }

    /// Host reported a native fullscreen change; never moves the phase
    pub fn on_native_fullscreen_change(&mut self) {
        self.native_active = self.native.is_active();
        debug!(native = self.native_active, "Native fullscreen state updated");
        self.update_label();
    }

    /// Show or hide the toggle control
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if let Some(control) = self.dom.element_by_id(TOGGLE_ID) {
            let display = if enabled { "block" } else { "none" };
            self.dom.set_inline_style(control, "display", Some(display));
        }
    }

    /// Wait for the pending background search; never resolves when idle
    pub async fn next_search_result(&mut self) -> Option<(NodeId, u32)> {
        match self.search.as_mut() {
            Some(search) => search.await,
            None => std::future::pending().await,
        }
    }

    /// Finish an enter whose element lookup had to be retried
    pub async fn finish_search(&mut self, found: Option<(NodeId, u32)>) {
        self.search = None;
        if self.phase != Phase::Entering {
            return;
        }
        match found {
            Some((node, attempt)) => {
                debug!(attempt, "Background search succeeded");
                self.complete_enter(node).await;
            }
            None => {
                let err = Error::ElementNotFound {
                    attempts: self.search_retries + 1,
                };
                error!(error = %err, "Fullscreen unavailable on this page");
                self.snapshot = None;
                self.phase = Phase::Normal;
                if self.pending_toggle {
                    debug!("Dropping toggle queued during failed search");
                    self.pending_toggle = false;
                }
            }
        }
        self.apply_pending().await;
    }

    /// Drive a pending search to completion
    pub async fn settle(&mut self) {
        if self.search.is_some() {
            let found = self.next_search_result().await;
            self.finish_search(found).await;
        }
    }

    fn label_key(&self) -> TextKey {
        match (self.phase, self.native_active) {
            (Phase::Active, true) => TextKey::ExitAllFullscreen,
            (Phase::Active, false) => TextKey::ExitFullscreen,
            _ => TextKey::EnableFullscreen,
        }
    }

    /// Current control text
    pub fn label(&self) -> String {
        self.strings.text(self.label_key())
    }

    fn update_label(&self) {
        if let Some(control) = self.dom.element_by_id(TOGGLE_ID) {
            self.dom.set_text(control, &self.label());
        }
    }

    async fn begin_enter(&mut self) {
        self.phase = Phase::Entering;
        let snapshot = Scope::ALL
            .into_iter()
            .map(|scope| (scope, LayoutStyle::capture(self.dom.as_ref(), self.dom.scope(scope))))
            .collect();
        self.snapshot = Some(snapshot);

        if let Some(node) = page::find_first(self.dom.as_ref(), BACKGROUND_IMAGE) {
            self.complete_enter(node).await;
            return;
        }

        warn!(
            retries = self.search_retries,
            "Background element not found, retrying"
        );
        self.search = Some(Box::pin(page::poll_for_element(
            self.dom.clone(),
            BACKGROUND_IMAGE,
            self.search_retries,
            self.search_period,
        )));
    }

    async fn complete_enter(&mut self, node: NodeId) {
        let url = resolve_background_url(self.dom.as_ref(), node);

        let style = self.dom.create_element("style", Some(STYLE_ID));
        self.dom.set_text(style, &styles::overlay_stylesheet());
        self.dom.append_child(self.dom.head(), style);

        let container = self.dom.create_element("div", Some(CONTAINER_ID));
        match &url {
            Some(url) => {
                let value = styles::css_url_value(url);
                self.dom.set_inline_style(container, "background-image", Some(&value));
            }
            None => {
                debug!("No background URL, cloning element into overlay");
                let copy = self.dom.deep_clone(node);
                self.dom.append_child(container, copy);
            }
        }
        self.dom.append_child(self.dom.scope(Scope::Body), container);
        self.background_url = url;

        if let Err(e) = self.native.request().await {
            let err = Error::NativeFullscreen(e.to_string());
            warn!(error = %err, "Keeping overlay without native fullscreen");
        }

        self.phase = Phase::Active;
        self.update_label();
        self.persist().await;
        info!(url = ?self.background_url, "Overlay active");
    }

    async fn exit(&mut self) {
        self.phase = Phase::Exiting;

        self.dom.remove_by_id(CONTAINER_ID);
        self.dom.remove_by_id(STYLE_ID);
        for scope in Scope::ALL {
            LayoutStyle::clear_inline(self.dom.as_ref(), self.dom.scope(scope));
        }

        // The change notification may still be queued behind this exit
        if (self.native_active || self.native.is_active())
            && let Err(e) = self.native.exit().await
        {
            let err = Error::NativeFullscreen(e.to_string());
            warn!(error = %err, "Failed to leave native fullscreen");
        }

        self.snapshot = None;
        self.background_url = None;
        self.phase = Phase::Normal;
        self.update_label();
        self.persist().await;
        info!("Overlay closed");
    }

    /// Run toggles queued while a transition was in flight
    async fn apply_pending(&mut self) {
        while self.pending_toggle {
            match self.phase {
                Phase::Normal => {
                    self.pending_toggle = false;
                    self.begin_enter().await;
                }
                Phase::Active => {
                    self.pending_toggle = false;
                    self.exit().await;
                }
                // Still waiting on the search; it will call back in
                Phase::Entering | Phase::Exiting => break,
            }
        }
    }

    // `&mut self` keeps the future `Send`; the pending search is not `Sync`
    async fn persist(&mut self) {
        let record = FullscreenRecord::now(self.is_overlay_active());
        if !self.settings.set_as(storage::FULLSCREEN_STATE, &record).await {
            debug!("Overlay state not persisted");
        }
    }
}

/// Background image URL of `node`: inline style, then `<img>`, then computed style
pub fn resolve_background_url(dom: &dyn Dom, node: NodeId) -> Option<String> {
    dom.inline_style(node, "background-image")
        .and_then(|v| styles::extract_css_url(&v))
        .or_else(|| {
            dom.first_descendant(node, "img")
                .and_then(|img| dom.attribute(img, "src"))
                .filter(|src| !src.is_empty())
        })
        .or_else(|| {
            dom.computed_style(node, "background-image")
                .and_then(|v| styles::extract_css_url(&v))
        })
}
