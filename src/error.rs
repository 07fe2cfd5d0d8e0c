use thiserror::Error;

/// Failure kinds that callers branch on.
///
/// None of these are fatal: every feature degrades to "stay in the previous
/// state" and logs the error.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings read/write failed (store unavailable, permission denied)
    #[error("settings store unavailable: {0}")]
    StoreUnavailable(String),

    /// Background element search exhausted its attempts
    #[error("background element not found after {attempts} attempts")]
    ElementNotFound { attempts: u32 },

    /// Expected filename pattern absent from the page
    #[error("page format mismatch: {0}")]
    PageFormat(String),

    /// Native fullscreen request or exit rejected by the host
    #[error("native fullscreen rejected: {0}")]
    NativeFullscreen(String),

    /// Downloads collaborator refused the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
