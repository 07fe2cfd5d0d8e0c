//! Native (browser/OS level) fullscreen capability

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Host fullscreen API with vendor differences hidden behind it
#[async_trait]
pub trait NativeFullscreen: Send + Sync {
    /// Ask the host to enter fullscreen on the document root
    async fn request(&self) -> Result<()>;

    async fn exit(&self) -> Result<()>;

    fn is_active(&self) -> bool;
}

type ChangeListener = Box<dyn Fn(bool) + Send + Sync>;

/// In-process fullscreen flag.
///
/// Every state change, whether requested by the overlay or simulated as a
/// user action, is reported to the registered listener, mirroring the
/// host's change notification.
#[derive(Default)]
pub struct MemoryFullscreen {
    active: AtomicBool,
    reject: AtomicBool,
    listener: Mutex<Option<ChangeListener>>,
}

impl MemoryFullscreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `request`/`exit` fail like a host without user activation
    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::Relaxed);
    }

    pub fn on_change(&self, listener: impl Fn(bool) + Send + Sync + 'static) {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(listener));
    }

    /// User pressed the host's own fullscreen key
    pub fn user_toggle(&self, active: bool) {
        self.change(active);
    }

    fn change(&self, active: bool) {
        let previous = self.active.swap(active, Ordering::Relaxed);
        if previous == active {
            return;
        }
        debug!(active, "Native fullscreen changed");
        if let Some(listener) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            listener(active);
        }
    }
}

#[async_trait]
impl NativeFullscreen for MemoryFullscreen {
    async fn request(&self) -> Result<()> {
        if self.reject.load(Ordering::Relaxed) {
            bail!("fullscreen request denied by host");
        }
        self.change(true);
        Ok(())
    }

    async fn exit(&self) -> Result<()> {
        if self.reject.load(Ordering::Relaxed) {
            bail!("fullscreen exit denied by host");
        }
        self.change(false);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}
