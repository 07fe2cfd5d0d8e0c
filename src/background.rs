//! Background surface
//!
//! Answers settings and download requests, and the page actions whenever no
//! page session is mounted.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{FeatureSettings, FilenameRuleSet};
use crate::constants::storage;
use crate::download::Downloader;
use crate::error::Error;
use crate::ipc::{DownloadImage, FullscreenState, Request, Response, ToggleFeature};
use crate::settings::SettingsAdapter;

pub struct Background {
    settings: SettingsAdapter,
    downloader: Arc<dyn Downloader>,
}

impl Background {
    pub fn new(settings: SettingsAdapter, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            settings,
            downloader,
        }
    }

    /// Write first-run defaults; `false` when settings already exist
    pub async fn install(&self) -> bool {
        if self.settings.get(storage::SETTINGS).await.is_some() {
            return false;
        }
        let saved = self
            .settings
            .set_as(storage::SETTINGS, &FeatureSettings::default())
            .await;
        self.settings
            .set(storage::INSTALL_DATE, Value::from(chrono::Utc::now().timestamp_millis()))
            .await;
        self.settings
            .set(storage::VERSION, Value::from(env!("CARGO_PKG_VERSION")))
            .await;
        info!(saved, version = env!("CARGO_PKG_VERSION"), "Installed default settings");
        true
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::ToggleFullscreen => Response::failure("No active tab"),
            Request::GetFullscreenState => self.data_of(FullscreenState::default()),
            Request::DownloadImage(download) => self.download(download).await,
            Request::GetDownloadSettings => {
                self.stored_or(storage::DOWNLOAD_SETTINGS, FilenameRuleSet::default())
                    .await
            }
            Request::SetDownloadSettings(data) => self.store(storage::DOWNLOAD_SETTINGS, data).await,
            Request::GetSettings => {
                self.stored_or(storage::SETTINGS, FeatureSettings::default())
                    .await
            }
            Request::SetSettings(data) => self.store(storage::SETTINGS, data).await,
            Request::ToggleFeature(toggle) => self.toggle_feature(toggle).await,
        }
    }

    async fn download(&self, DownloadImage { url, filename }: DownloadImage) -> Response {
        if !self.downloader.has_permission().await {
            let err = Error::PermissionDenied("downloads".to_string());
            warn!(error = %err, "Download refused");
            return Response::from(&err);
        }
        match self.downloader.download(&url, &filename).await {
            Ok(id) => Response::download_started(id),
            Err(e) => {
                error!(url = %url, error = %e, "Download failed");
                match e.downcast_ref::<Error>() {
                    Some(err) => Response::from(err),
                    None => Response::failure(e.to_string()),
                }
            }
        }
    }

    async fn stored_or<T: Serialize>(&self, key: &str, default: T) -> Response {
        match self.settings.get(key).await {
            Some(value) => Response::with_data(value),
            None => self.data_of(default),
        }
    }

    fn data_of<T: Serialize>(&self, default: T) -> Response {
        Response::with_data(serde_json::to_value(default).unwrap_or(Value::Null))
    }

    async fn store(&self, key: &str, data: Value) -> Response {
        if self.settings.set(key, data).await {
            Response::ok()
        } else {
            Response::from(&Error::StoreUnavailable(key.to_string()))
        }
    }

    async fn toggle_feature(&self, ToggleFeature { feature, enabled }: ToggleFeature) -> Response {
        let mut features: FeatureSettings = self.settings.load_merged(storage::SETTINGS).await;
        features.set_enabled(feature, enabled);
        if self.settings.set_as(storage::SETTINGS, &features).await {
            info!(?feature, enabled, "Feature toggled");
            Response::ok()
        } else {
            Response::from(&Error::StoreUnavailable(storage::SETTINGS.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Feature;
    use serde_json::json;
    use crate::settings::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingDownloader {
        denied: AtomicBool,
        saved: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Downloader for RecordingDownloader {
        async fn has_permission(&self) -> bool {
            !self.denied.load(Ordering::Relaxed)
        }

        async fn download(&self, url: &str, filename: &str) -> anyhow::Result<u64> {
            let mut saved = self.saved.lock().unwrap();
            saved.push((url.to_string(), filename.to_string()));
            Ok(saved.len() as u64)
        }
    }

    fn background() -> (Arc<MemoryStore>, Arc<RecordingDownloader>, Background) {
        let store = Arc::new(MemoryStore::new());
        let downloader = Arc::new(RecordingDownloader::default());
        let background = Background::new(SettingsAdapter::new(store.clone()), downloader.clone());
        (store, downloader, background)
    }

    #[tokio::test]
    async fn test_install_writes_defaults_once() {
        let (store, _, background) = background();
        assert!(background.install().await);
        assert_eq!(
            store.peek(storage::SETTINGS),
            Some(serde_json::to_value(FeatureSettings::default()).unwrap())
        );
        assert_eq!(store.peek(storage::VERSION), Some(json!("1.0.0")));
        assert!(store.peek(storage::INSTALL_DATE).is_some());

        assert!(!background.install().await);
    }

    #[tokio::test]
    async fn test_download_reports_id() {
        let (_, downloader, background) = background();
        let response = background
            .handle(Request::DownloadImage(DownloadImage {
                url: "/th?id=OHR.Foo_UHD.jpg".to_string(),
                filename: "Foo.jpg".to_string(),
            }))
            .await;
        assert_eq!(response, Response::download_started(1));
        assert_eq!(downloader.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_download_without_permission() {
        let (_, downloader, background) = background();
        downloader.denied.store(true, Ordering::Relaxed);
        let response = background
            .handle(Request::DownloadImage(DownloadImage {
                url: "/a.jpg".to_string(),
                filename: "a.jpg".to_string(),
            }))
            .await;
        assert!(!response.success);
        assert_eq!(response.need_permission, Some(true));
        assert!(downloader.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_default_then_stored() {
        let (_, _, background) = background();
        let response = background.handle(Request::GetSettings).await;
        assert_eq!(response.data.unwrap()["fullscreen"]["enabled"], json!(true));

        let blob = json!({ "fullscreen": { "enabled": false } });
        assert!(background.handle(Request::SetSettings(blob.clone())).await.success);
        assert_eq!(background.handle(Request::GetSettings).await.data, Some(blob));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let (store, _, background) = background();
        store.set_failing(true);
        let response = background
            .handle(Request::SetDownloadSettings(json!({ "separator": "-" })))
            .await;
        assert!(!response.success);

        // Reads still answer with defaults
        let response = background.handle(Request::GetDownloadSettings).await;
        assert_eq!(response.data.unwrap()["resolution"], json!("UHD"));
    }

    #[tokio::test]
    async fn test_toggle_feature_persists_flag() {
        let (store, _, background) = background();
        let response = background
            .handle(Request::ToggleFeature(ToggleFeature {
                feature: Feature::Download,
                enabled: false,
            }))
            .await;
        assert!(response.success);
        let stored: FeatureSettings =
            serde_json::from_value(store.peek(storage::SETTINGS).unwrap()).unwrap();
        assert!(!stored.download.enabled);
        assert!(stored.fullscreen.enabled);
    }

    #[tokio::test]
    async fn test_page_actions_without_page() {
        let (_, _, background) = background();
        let response = background.handle(Request::ToggleFullscreen).await;
        assert_eq!(response.error.as_deref(), Some("No active tab"));

        let response = background.handle(Request::GetFullscreenState).await;
        assert_eq!(
            response.data,
            Some(json!({ "isFullscreen": false, "isBrowserFullscreen": false }))
        );
    }
}
