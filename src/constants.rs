//! Application-wide constants
//!
//! Page selectors, injected element ids, storage keys and timing values used
//! throughout the crate, kept in one place so both features agree on them.

/// Persisted key-value store keys
pub mod storage {
    /// Global feature toggles plus per-feature sub-settings
    pub const SETTINGS: &str = "bt_settings";

    /// Last overlay state (`{enabled, timestamp}`)
    pub const FULLSCREEN_STATE: &str = "bt_fullscreen_state";

    /// Filename rule set used by the download control
    pub const DOWNLOAD_SETTINGS: &str = "bt_download_settings";

    /// Written once on first install
    pub const INSTALL_DATE: &str = "installDate";
    pub const VERSION: &str = "version";
}

/// Selectors for the hosting gallery page
pub mod selectors {
    /// Background image element candidates, first match wins
    pub const BACKGROUND_IMAGE: &[&str] = &[".img_cont", "#bgDiv", "#b_sydBgCont"];

    /// Native "download image" anchor
    pub const DOWNLOAD_LINK: &str = "a.downloadLink";

    /// Image description link (its href may carry the image date)
    pub const IMAGE_DESCRIPTION: &str = ".musCardCont a.title";

    pub const COPYRIGHT: &str = ".musCardCont div.copyright";
}

/// Fullscreen overlay elements
pub mod overlay {
    pub const NAMESPACE: &str = "bt-fs";

    /// Toggle control rendered into the page
    pub const TOGGLE_ID: &str = "bt-fs-toggle";

    /// Overlay container holding the background image
    pub const CONTAINER_ID: &str = "bt-fs-bg";

    /// Injected style block
    pub const STYLE_ID: &str = "bt-fs-style";

    pub const Z_INDEX_CONTAINER: u32 = 9998;
    pub const Z_INDEX_TOGGLE: u32 = 10000;
}

/// Download control elements
pub mod download {
    pub const NAMESPACE: &str = "bt-dl";

    pub const BUTTON_ID: &str = "bt-dl-btn";
    pub const MENU_ID: &str = "bt-dl-menu";
    pub const NOTIFICATION_CLASS: &str = "bt-dl-notification";

    pub const Z_INDEX_BUTTON: u32 = 9999;
    pub const Z_INDEX_MENU: u32 = 10001;

    /// Origin prepended to root-relative image URLs
    pub const PAGE_ORIGIN: &str = "https://www.bing.com";

    /// Used for the `download` attribute before the first successful recompute
    pub const FALLBACK_FILENAME: &str = "bing-image.jpg";

    /// Navigation offset bounds in days (past week up to today)
    pub const MIN_DATE_OFFSET: i32 = -7;
    pub const MAX_DATE_OFFSET: i32 = 0;
}

/// Timing values
pub mod timing {
    use std::time::Duration;

    /// Extra lookups after the first failed background search
    pub const BACKGROUND_SEARCH_ATTEMPTS: u32 = 10;

    /// Delay between background searches
    pub const BACKGROUND_SEARCH_PERIOD: Duration = Duration::from_secs(1);

    /// Lifetime of the "settings saved" banner
    pub const BANNER_LIFETIME: Duration = Duration::from_secs(2);
}

/// Filename sanitization limits
pub mod filename {
    /// Characters rejected by common filesystems
    pub const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    pub const MAX_LENGTH: usize = 255;
}

/// Config file and socket locations
pub mod config {
    /// Directory under the user's config/cache/runtime dir
    pub const APP_DIR: &str = "bing-tools";

    /// JSON key-value store file
    pub const STORE_FILENAME: &str = "storage.json";

    pub const SOCKET_FILENAME: &str = "session.sock";

    /// Overrides the store file location
    pub const STORE_ENV: &str = "BING_TOOLS_STORE";
}
