//! Localized control labels
//!
//! Labels are looked up through [`Localizer`]; [`BuiltinStrings`] is the
//! default table keyed by lower-case language tag with an English fallback.

/// Every string the page controls display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKey {
    EnableFullscreen,
    /// Overlay active, native fullscreen inactive
    ExitFullscreen,
    /// Overlay and native fullscreen both active
    ExitAllFullscreen,
    DownloadButton,
    SettingsSaved,
    /// Appended to the download control's tooltip
    SettingsHint,
}

pub trait Localizer: Send + Sync {
    fn text(&self, key: TextKey) -> String;
}

/// Languages with a dedicated table
pub const SUPPORTED_LANGUAGES: [&str; 7] = ["zh", "zh-cn", "zh-tw", "en", "ko", "ja", "fr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    ZhHans,
    ZhHant,
    En,
    Ko,
    Ja,
    Fr,
}

/// Built-in string table
#[derive(Debug, Clone)]
pub struct BuiltinStrings {
    table: Table,
}

impl BuiltinStrings {
    /// Exact tag match (case-insensitive), English otherwise
    pub fn for_language(tag: &str) -> Self {
        let table = match tag.to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" => Table::ZhHans,
            "zh-tw" => Table::ZhHant,
            "ko" => Table::Ko,
            "ja" => Table::Ja,
            "fr" => Table::Fr,
            _ => Table::En,
        };
        Self { table }
    }
}

impl Default for BuiltinStrings {
    fn default() -> Self {
        Self { table: Table::En }
    }
}

impl Localizer for BuiltinStrings {
    fn text(&self, key: TextKey) -> String {
        use Table::*;
        use TextKey::*;

        let s = match (key, self.table) {
            (EnableFullscreen, ZhHans) => "开启背景全屏",
            (EnableFullscreen, ZhHant) => "開啟背景全螢幕",
            (EnableFullscreen, En) => "Enable Fullscreen",
            (EnableFullscreen, Ko) => "전체 화면 켜기",
            (EnableFullscreen, Ja) => "全画面表示を有効にする",
            (EnableFullscreen, Fr) => "Activer le plein écran",

            (ExitFullscreen, ZhHans) => "退出背景全屏",
            (ExitFullscreen, ZhHant) => "退出背景全螢幕",
            (ExitFullscreen, En) => "Exit Fullscreen",
            (ExitFullscreen, Ko) => "전체 화면 끄기",
            (ExitFullscreen, Ja) => "全画面表示を終了",
            (ExitFullscreen, Fr) => "Quitter le plein écran",

            (ExitAllFullscreen, ZhHans) => "退出全部全屏",
            (ExitAllFullscreen, ZhHant) => "退出全部全螢幕",
            (ExitAllFullscreen, En) => "Exit All Fullscreen",
            (ExitAllFullscreen, Ko) => "모든 전체 화면 종료",
            (ExitAllFullscreen, Ja) => "すべての全画面表示を終了",
            (ExitAllFullscreen, Fr) => "Quitter tous les pleins écrans",

            (DownloadButton, ZhHans) => "下载今日必应图片",
            (DownloadButton, ZhHant) => "下載今日必應圖片",
            (DownloadButton, En) => "Download Today's Bing Image",
            (DownloadButton, Ko) => "오늘의 Bing 이미지 다운로드",
            (DownloadButton, Ja) => "今日のBing画像をダウンロード",
            (DownloadButton, Fr) => "Télécharger l'image Bing du jour",

            (SettingsSaved, ZhHans) => "设置已保存",
            (SettingsSaved, ZhHant) => "設定已儲存",
            (SettingsSaved, En) => "Settings Saved",
            (SettingsSaved, Ko) => "설정이 저장되었습니다",
            (SettingsSaved, Ja) => "設定を保存しました",
            (SettingsSaved, Fr) => "Paramètres enregistrés",

            (SettingsHint, ZhHans) => "右键打开设置菜单",
            (SettingsHint, ZhHant) => "右鍵開啟設定選單",
            (SettingsHint, En) => "Right click to open settings",
            (SettingsHint, Ko) => "마우스 오른쪽 버튼으로 설정 열기",
            (SettingsHint, Ja) => "右クリックで設定を開く",
            (SettingsHint, Fr) => "Clic droit pour ouvrir les paramètres",
        };
        s.to_string()
    }
}
