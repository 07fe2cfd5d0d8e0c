//! Which surface answers each action

use super::messages::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// The page session owning the overlay and the download control
    Page,
    /// Settings, downloads and install-time state
    Background,
}

/// Route `action`; page actions fall back to the background when no page
/// session is mounted
pub fn route(action: Action, page_mounted: bool) -> Surface {
    match action {
        Action::DownloadImage | Action::GetSettings | Action::SetSettings => Surface::Background,
        Action::ToggleFullscreen
        | Action::GetFullscreenState
        | Action::ToggleFeature
        | Action::GetDownloadSettings
        | Action::SetDownloadSettings => {
            if page_mounted {
                Surface::Page
            } else {
                Surface::Background
            }
        }
    }
}
