//! Page session
//!
//! One instance per page context. Owns the overlay controller and the
//! download composer and drives both from a single event loop, so every
//! feature operation runs to completion between suspension points.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::background::Background;
use crate::config::{Feature, FeatureSettings, NamingRule, Resolution, Separator};
use crate::constants::storage;
use crate::download::DownloadComposer;
use crate::fullscreen::{NativeFullscreen, OverlayController};
use crate::i18n::Localizer;
use crate::ipc::{FullscreenState, Request, Response, Surface, ToggleFeature, route};
use crate::page::Dom;
use crate::settings::SettingsAdapter;

const EVENT_QUEUE: usize = 64;

/// Everything the page session reacts to
#[derive(Debug)]
pub enum PageEvent {
    /// Primary activation of the fullscreen toggle control
    ToggleClicked,
    Key(String),
    /// Host reported a native fullscreen change
    NativeFullscreenChanged,
    DownloadHover,
    /// Secondary activation of the download control
    DownloadContextMenu,
    PreviousImage,
    NextImage,
    MenuResolution(Resolution),
    MenuToggleRule(NamingRule),
    MenuSeparator(Separator),
    MenuSave,
    MenuReset,
    MenuCancel,
    Request(Request, oneshot::Sender<Response>),
    Shutdown,
}

/// Cloneable sender side of a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<PageEvent>,
}

impl SessionHandle {
    pub async fn send(&self, event: PageEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("page session has stopped"))
    }

    /// Queue an event from synchronous code; dropped when the queue is full
    pub fn notify(&self, event: PageEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!(error = %e, "Dropping page event");
        }
    }

    pub async fn request(&self, request: Request) -> Result<Response> {
        let (reply, response) = oneshot::channel();
        self.send(PageEvent::Request(request, reply)).await?;
        response.await.context("page session dropped the request")
    }
}

pub struct PageSession {
    settings: SettingsAdapter,
    overlay: OverlayController,
    composer: DownloadComposer,
    events: mpsc::Receiver<PageEvent>,
}

impl PageSession {
    pub fn new(
        dom: Arc<dyn Dom>,
        native: Arc<dyn NativeFullscreen>,
        settings: SettingsAdapter,
        strings: Arc<dyn Localizer>,
    ) -> (Self, SessionHandle) {
        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let overlay =
            OverlayController::new(dom.clone(), native, settings.clone(), strings.clone());
        let composer = DownloadComposer::new(dom, settings.clone(), strings);
        let session = Self {
            settings,
            overlay,
            composer,
            events,
        };
        (session, SessionHandle { tx })
    }

    /// Replace the download composer (custom clock)
    pub fn with_composer(mut self, composer: DownloadComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    pub fn composer(&self) -> &DownloadComposer {
        &self.composer
    }

    /// Initialise both features from the stored toggles
    pub async fn mount(&mut self) {
        let features: FeatureSettings = self.settings.load_merged(storage::SETTINGS).await;
        self.overlay.mount(&features).await;
        self.composer.mount(&features).await;
        info!("Page session mounted");
    }

    /// Process events until shutdown or until every handle is gone
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    None | Some(PageEvent::Shutdown) => break,
                    Some(event) => self.handle(event).await,
                },
                found = self.overlay.next_search_result(), if self.overlay.is_searching() => {
                    self.overlay.finish_search(found).await;
                }
            }
        }
        info!("Page session stopped");
    }

    async fn handle(&mut self, event: PageEvent) {
        debug!(?event, "Page event");
        match event {
            PageEvent::ToggleClicked => self.overlay.toggle().await,
            PageEvent::Key(key) => self.overlay.on_key(&key).await,
            PageEvent::NativeFullscreenChanged => self.overlay.on_native_fullscreen_change(),
            PageEvent::DownloadHover => self.composer.on_hover(),
            PageEvent::DownloadContextMenu => self.composer.on_secondary_activation(),
            PageEvent::PreviousImage => self.composer.on_previous(),
            PageEvent::NextImage => self.composer.on_next(),
            PageEvent::MenuResolution(resolution) => self.composer.select_resolution(resolution),
            PageEvent::MenuToggleRule(rule) => self.composer.toggle_rule(rule),
            PageEvent::MenuSeparator(separator) => self.composer.select_separator(separator),
            PageEvent::MenuSave => {
                self.composer.save_menu().await;
            }
            PageEvent::MenuReset => self.composer.reset_menu().await,
            PageEvent::MenuCancel => self.composer.cancel_menu(),
            PageEvent::Request(request, reply) => {
                let response = self.answer(request).await;
                if reply.send(response).is_err() {
                    debug!("Requester went away before the response");
                }
            }
            PageEvent::Shutdown => {}
        }
    }

    async fn answer(&mut self, request: Request) -> Response {
        match request {
            Request::ToggleFullscreen => {
                self.overlay.toggle().await;
                Response::ok()
            }
            Request::GetFullscreenState => {
                let state = FullscreenState {
                    is_fullscreen: self.overlay.is_overlay_active(),
                    is_browser_fullscreen: self.overlay.is_native_active(),
                };
                Response::with_data(serde_json::to_value(state).unwrap_or(Value::Null))
            }
            Request::ToggleFeature(ToggleFeature { feature, enabled }) => {
                match feature {
                    Feature::Fullscreen => self.overlay.set_enabled(enabled),
                    Feature::Download => self.composer.set_enabled(enabled),
                }
                Response::ok()
            }
            Request::GetDownloadSettings => {
                Response::with_data(self.composer.download_settings_json())
            }
            Request::SetDownloadSettings(data) => {
                match self.composer.apply_download_settings(data).await {
                    Ok(()) => Response::ok(),
                    Err(e) => Response::failure(e.to_string()),
                }
            }
            other => Response::failure(format!("{} is not a page action", other.action())),
        }
    }
}

/// Routes raw protocol messages to the page session or the background
#[derive(Clone)]
pub struct Dispatcher {
    page: Option<SessionHandle>,
    background: Arc<Background>,
}

impl Dispatcher {
    pub fn new(page: Option<SessionHandle>, background: Arc<Background>) -> Self {
        Self { page, background }
    }

    pub async fn dispatch(&self, raw: Value) -> Response {
        let request = match Request::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected request");
                return Response::from(&e);
            }
        };
        let action = request.action();

        match (route(action, self.page.is_some()), &self.page) {
            (Surface::Page, Some(page)) => match page.request(request).await {
                Ok(response) => response,
                Err(e) => Response::failure(e.to_string()),
            },
            _ => self.background.handle(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::Downloader;
    use crate::fullscreen::MemoryFullscreen;
    use crate::i18n::BuiltinStrings;
    use crate::page::{MemoryDom, NodeSpec, Scope};
    use crate::settings::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct NoDownloads;

    #[async_trait]
    impl Downloader for NoDownloads {
        async fn has_permission(&self) -> bool {
            false
        }

        async fn download(&self, _url: &str, _filename: &str) -> anyhow::Result<u64> {
            anyhow::bail!("downloads disabled")
        }
    }

    fn gallery() -> Vec<NodeSpec> {
        vec![
            NodeSpec::new("div")
                .with_id("bgDiv")
                .with_style("background-image", "url('/th?id=OHR.Foo_1920x1080.jpg')"),
            NodeSpec::new("a")
                .with_class("downloadLink")
                .with_attr("href", "/th?id=OHR.Foo_EN-US1_1920x1080.jpg&rf=x"),
        ]
    }

    async fn start(body: Vec<NodeSpec>) -> (Arc<MemoryDom>, Arc<MemoryStore>, Dispatcher) {
        let dom = Arc::new(MemoryDom::from_body(body));
        let store = Arc::new(MemoryStore::new());
        let settings = SettingsAdapter::new(store.clone());
        let (mut session, handle) = PageSession::new(
            dom.clone(),
            Arc::new(MemoryFullscreen::new()),
            settings.clone(),
            Arc::new(BuiltinStrings::default()),
        );
        session.mount().await;
        tokio::spawn(session.run());

        let background = Arc::new(Background::new(settings, Arc::new(NoDownloads)));
        (dom, store, Dispatcher::new(Some(handle), background))
    }

    async fn fullscreen_state(dispatcher: &Dispatcher) -> Value {
        dispatcher
            .dispatch(json!({ "action": "getFullscreenState" }))
            .await
            .data
            .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_over_protocol() {
        let (_, _, dispatcher) = start(gallery()).await;

        let response = dispatcher.dispatch(json!({ "action": "toggleFullscreen" })).await;
        assert!(response.success);
        assert_eq!(
            fullscreen_state(&dispatcher).await,
            json!({ "isFullscreen": true, "isBrowserFullscreen": false })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_loop_finishes_background_search() {
        let (dom, _, dispatcher) = start(vec![]).await;

        dispatcher.dispatch(json!({ "action": "toggleFullscreen" })).await;
        assert_eq!(fullscreen_state(&dispatcher).await["isFullscreen"], json!(false));

        let bg = dom.create_element("div", Some("bgDiv"));
        dom.set_inline_style(bg, "background-image", Some("url('/late.jpg')"));
        dom.append_child(dom.scope(Scope::Body), bg);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(fullscreen_state(&dispatcher).await["isFullscreen"], json!(true));
    }

    #[tokio::test]
    async fn test_download_settings_served_by_page() {
        let (_, _, dispatcher) = start(gallery()).await;
        let response = dispatcher.dispatch(json!({ "action": "getDownloadSettings" })).await;
        let data = response.data.unwrap();
        assert_eq!(data["url"], json!("/th?id=OHR.Foo_EN-US1_UHD.jpg"));
        assert!(data["name"].as_str().unwrap().starts_with("Foo_"));
    }

    #[tokio::test]
    async fn test_feature_toggle_hides_download_control() {
        let (dom, _, dispatcher) = start(gallery()).await;
        let response = dispatcher
            .dispatch(json!({
                "action": "toggleFeature",
                "data": { "feature": "download", "enabled": false }
            }))
            .await;
        assert!(response.success);
        let button = dom.element_by_id("bt-dl-btn").unwrap();
        assert_eq!(dom.inline_style(button, "display").as_deref(), Some("none"));
    }

    #[tokio::test]
    async fn test_background_actions_and_unknown() {
        let (_, store, dispatcher) = start(gallery()).await;

        let response = dispatcher
            .dispatch(json!({ "action": "setSettings", "data": { "fullscreen": { "enabled": false } } }))
            .await;
        assert!(response.success);
        assert!(store.peek("bt_settings").is_some());

        let response = dispatcher
            .dispatch(json!({ "action": "downloadImage", "data": { "url": "/a.jpg", "filename": "a.jpg" } }))
            .await;
        assert_eq!(response.need_permission, Some(true));

        let response = dispatcher.dispatch(json!({ "action": "refreshPage" })).await;
        assert_eq!(response.error.as_deref(), Some("Unknown action: refreshPage"));
    }

    #[tokio::test]
    async fn test_without_page_background_answers() {
        let store = Arc::new(MemoryStore::new());
        let background = Arc::new(Background::new(SettingsAdapter::new(store), Arc::new(NoDownloads)));
        let dispatcher = Dispatcher::new(None, background);

        let response = dispatcher.dispatch(json!({ "action": "toggleFullscreen" })).await;
        assert_eq!(response.error.as_deref(), Some("No active tab"));
        let response = dispatcher.dispatch(json!({ "action": "getDownloadSettings" })).await;
        assert_eq!(response.data.unwrap()["separator"], json!("_"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let dom = Arc::new(MemoryDom::from_body(vec![]));
        let (session, handle) = PageSession::new(
            dom,
            Arc::new(MemoryFullscreen::new()),
            SettingsAdapter::new(Arc::new(MemoryStore::new())),
            Arc::new(BuiltinStrings::default()),
        );
        let running = tokio::spawn(session.run());
        handle.send(PageEvent::Shutdown).await.unwrap();
        running.await.unwrap();
        assert!(handle.request(Request::GetSettings).await.is_err());
    }
}
