//! Fullscreen background viewer and download filename composer for the
//! Bing wallpaper gallery page.

#![forbid(unsafe_code)]

pub mod background;
pub mod config;
pub mod constants;
pub mod download;
pub mod error;
pub mod fullscreen;
pub mod i18n;
pub mod ipc;
pub mod page;
pub mod session;
pub mod settings;
