//! Runtime configuration resolved from CLI flags and the environment

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::debug;

use crate::constants::config::{APP_DIR, SOCKET_FILENAME, STORE_ENV, STORE_FILENAME};

/// Paths and locale for one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// JSON key-value store backing the settings adapter
    pub store_path: PathBuf,
    /// Unix socket used by `serve` / `send`
    pub socket_path: PathBuf,
    /// Where downloaded images land
    pub download_dir: PathBuf,
    /// Lower-case language tag used for labels (`en`, `zh-cn`, ...)
    pub language: String,
}

impl AppConfig {
    /// Resolve from the environment; explicit values win over env vars
    pub fn resolve(
        store: Option<PathBuf>,
        socket: Option<PathBuf>,
        language: Option<String>,
    ) -> Result<Self> {
        let store_path = match store {
            Some(path) => path,
            None => default_store_path(),
        };
        let socket_path = match socket {
            Some(path) => path,
            None => default_socket_path()?,
        };
        let download_dir = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."));
        let language = language
            .map(|l| l.to_lowercase())
            .or_else(|| env::var("LANG").ok().and_then(|l| language_tag(&l)))
            .unwrap_or_else(|| "en".to_string());

        let config = Self {
            store_path,
            socket_path,
            download_dir,
            language,
        };
        debug!(config = ?config, "Resolved app config");
        Ok(config)
    }
}

/// `$BING_TOOLS_STORE`, else `<config_dir>/bing-tools/storage.json`
pub fn default_store_path() -> PathBuf {
    if let Ok(path) = env::var(STORE_ENV) {
        return PathBuf::from(path);
    }
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(STORE_FILENAME);
    path
}

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(APP_DIR).join(SOCKET_FILENAME))
}

/// Turn a POSIX locale (`zh_TW.UTF-8`) into a language tag (`zh-tw`)
pub fn language_tag(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next()?.trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-").to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_tag_from_posix_locale() {
        assert_eq!(language_tag("zh_TW.UTF-8").as_deref(), Some("zh-tw"));
        assert_eq!(language_tag("fr_FR@euro").as_deref(), Some("fr-fr"));
        assert_eq!(language_tag("ja").as_deref(), Some("ja"));
    }

    #[test]
    fn test_language_tag_ignores_c_locale() {
        assert_eq!(language_tag("C"), None);
        assert_eq!(language_tag("POSIX"), None);
        assert_eq!(language_tag(""), None);
    }

    #[test]
    fn test_explicit_values_win() {
        let config = AppConfig::resolve(
            Some(PathBuf::from("/tmp/store.json")),
            Some(PathBuf::from("/tmp/s.sock")),
            Some("KO".to_string()),
        )
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(config.socket_path, PathBuf::from("/tmp/s.sock"));
        assert_eq!(config.language, "ko");
    }

    #[test]
    fn test_store_path_ends_with_app_dir() {
        if env::var(STORE_ENV).is_ok() {
            return;
        }
        let path = default_store_path();
        assert!(path.ends_with("bing-tools/storage.json"));
    }
}
