//! Protocol message types shared by the page, background and popup surfaces

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

use crate::config::Feature;
use crate::error::Error;

/// Action names understood by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ToggleFullscreen,
    GetFullscreenState,
    DownloadImage,
    GetDownloadSettings,
    SetDownloadSettings,
    GetSettings,
    SetSettings,
    ToggleFeature,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::ToggleFullscreen,
        Action::GetFullscreenState,
        Action::DownloadImage,
        Action::GetDownloadSettings,
        Action::SetDownloadSettings,
        Action::GetSettings,
        Action::SetSettings,
        Action::ToggleFeature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ToggleFullscreen => "toggleFullscreen",
            Action::GetFullscreenState => "getFullscreenState",
            Action::DownloadImage => "downloadImage",
            Action::GetDownloadSettings => "getDownloadSettings",
            Action::SetDownloadSettings => "setDownloadSettings",
            Action::GetSettings => "getSettings",
            Action::SetSettings => "setSettings",
            Action::ToggleFeature => "toggleFeature",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| Error::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadImage {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleFeature {
    pub feature: Feature,
    pub enabled: bool,
}

/// `getFullscreenState` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullscreenState {
    pub is_fullscreen: bool,
    pub is_browser_fullscreen: bool,
}

/// `{"action": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum Request {
    ToggleFullscreen,
    GetFullscreenState,
    DownloadImage(DownloadImage),
    GetDownloadSettings,
    SetDownloadSettings(Value),
    GetSettings,
    SetSettings(Value),
    ToggleFeature(ToggleFeature),
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Request::ToggleFullscreen => Action::ToggleFullscreen,
            Request::GetFullscreenState => Action::GetFullscreenState,
            Request::DownloadImage(_) => Action::DownloadImage,
            Request::GetDownloadSettings => Action::GetDownloadSettings,
            Request::SetDownloadSettings(_) => Action::SetDownloadSettings,
            Request::GetSettings => Action::GetSettings,
            Request::SetSettings(_) => Action::SetSettings,
            Request::ToggleFeature(_) => Action::ToggleFeature,
        }
    }

    /// Decode a raw message.
    ///
    /// Unit actions ignore whatever `data` carries; unknown actions fail
    /// with [`Error::UnknownAction`].
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let name = match value.get("action") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => other.to_string(),
            None => "undefined".to_string(),
        };
        let action: Action = name.parse()?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);

        let request = match action {
            Action::ToggleFullscreen => Request::ToggleFullscreen,
            Action::GetFullscreenState => Request::GetFullscreenState,
            Action::GetDownloadSettings => Request::GetDownloadSettings,
            Action::GetSettings => Request::GetSettings,
            Action::DownloadImage => Request::DownloadImage(decode(action, data)?),
            Action::ToggleFeature => Request::ToggleFeature(decode(action, data)?),
            Action::SetDownloadSettings => Request::SetDownloadSettings(data),
            Action::SetSettings => Request::SetSettings(data),
        };
        Ok(request)
    }
}

fn decode<T: serde::de::DeserializeOwned>(action: Action, data: Value) -> Result<T, Error> {
    serde_json::from_value(data)
        .map_err(|e| Error::Other(anyhow::anyhow!("invalid data for {action}: {e}")))
}

/// `{"success": bool, "data"?: ..., "error"?: string, "needPermission"?: bool}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_permission: Option<bool>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn download_started(download_id: u64) -> Self {
        Self::with_data(json!({ "downloadId": download_id }))
    }
}

impl From<&Error> for Response {
    fn from(err: &Error) -> Self {
        let mut response = Response::failure(err.to_string());
        if matches!(err, Error::PermissionDenied(_)) {
            response.need_permission = Some(true);
        }
        response
    }
}
