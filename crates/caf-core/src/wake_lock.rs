//! Content-side wake-lock wrapper
//!
//! Holds the screen wake lock for the lifetime of the page while enabled,
//! reacquires it when the browser drops it (tab hidden, page restored from
//! the back/forward cache) and reports every status change to the
//! background coordinator.
//!
//! iOS denies the very first request of a manual session because the
//! extension popup still holds focus. That denial is not reported; the
//! request is retried once the page window regains focus.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HostError;
use crate::message::{ExtensionMessage, PlatformInfo};
use crate::types::{ErrorCode, LockError, LockStatus};

const IOS: &str = "ios";

/// Why a wake-lock request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeLockError {
    /// `NotAllowedError`: denied by the user agent or OS power policy
    #[error("Wake lock not allowed: {0}")]
    NotAllowed(String),
    /// `NotSupportedError`
    #[error("Wake lock not supported: {0}")]
    NotSupported(String),
    #[error("Wake lock request failed: {0}")]
    Other(String),
}

impl WakeLockError {
    /// Classify a DOMException by name.
    pub fn from_exception(name: &str, message: impl Into<String>) -> Self {
        match name {
            "NotAllowedError" => Self::NotAllowed(message.into()),
            "NotSupportedError" => Self::NotSupported(message.into()),
            _ => Self::Other(message.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotAllowed(_) => ErrorCode::SystemBlocked,
            Self::NotSupported(_) => ErrorCode::NotSupported,
            Self::Other(_) => ErrorCode::Unknown,
        }
    }
}

/// The page's screen wake-lock primitive.
#[async_trait(?Send)]
pub trait ScreenWakeLock {
    fn is_supported(&self) -> bool;

    async fn request(&self) -> Result<(), WakeLockError>;

    async fn release(&self) -> Result<(), WakeLockError>;
}

/// Messaging from a content context to the background.
#[async_trait(?Send)]
pub trait Messenger {
    /// Send a message; the reply is None when the receiver answered nothing.
    async fn send_message(&self, message: &ExtensionMessage) -> Result<Option<Value>, HostError>;
}

/// Holds the single request slot until dropped.
struct RequestGuard<'a>(&'a Cell<bool>);

impl<'a> RequestGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct WakeLockManager<W, M> {
    wake_lock: W,
    messenger: M,
    enabled: Cell<bool>,
    held: Cell<bool>,
    /// A request is awaiting the platform
    requesting: Cell<bool>,
    requests: Cell<u32>,
    retry_on_focus: Cell<bool>,
    platform: RefCell<PlatformInfo>,
}

impl<W: ScreenWakeLock, M: Messenger> WakeLockManager<W, M> {
    pub fn new(wake_lock: W, messenger: M) -> Self {
        Self {
            wake_lock,
            messenger,
            enabled: Cell::new(false),
            held: Cell::new(false),
            requesting: Cell::new(false),
            requests: Cell::new(0),
            retry_on_focus: Cell::new(false),
            platform: RefCell::new(PlatformInfo::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }

    pub async fn start(&self) {
        if !self.wake_lock.is_supported() {
            log::warn!("Screen wake lock is not supported here");
            self.report(LockStatus::Error, Some(ErrorCode::NotSupported.into())).await;
            return;
        }

        self.enabled.set(true);
        let platform = self.fetch_platform_info().await;
        *self.platform.borrow_mut() = platform;
        self.request_lock().await;
    }

    pub async fn stop(&self) {
        self.enabled.set(false);
        self.retry_on_focus.set(false);
        if self.held.replace(false) {
            if let Err(e) = self.wake_lock.release().await {
                log::warn!("Failed to release wake lock: {e}");
            }
        }
        self.report(LockStatus::Inactive, None).await;
    }

    /// Handle a message addressed to this content context.
    /// Returns true when the message was consumed.
    pub async fn handle_message(&self, message: &ExtensionMessage) -> bool {
        match message {
            ExtensionMessage::ReleaseLock => {
                self.stop().await;
                true
            }
            _ => false,
        }
    }

    pub async fn on_visibility_change(&self, visible: bool) {
        if visible {
            self.reacquire().await;
        }
    }

    /// `pageshow`; `persisted` is set when the page came out of the bfcache.
    pub async fn on_page_show(&self, persisted: bool) {
        if persisted {
            self.reacquire().await;
        }
    }

    pub async fn on_focus(&self) {
        if self.retry_on_focus.get() {
            log::debug!("Window focused, retrying deferred wake lock request");
            self.reacquire().await;
        }
    }

    /// The platform dropped the lock.
    pub async fn on_lock_released(&self) {
        self.held.set(false);
        if self.enabled.get() {
            self.report(LockStatus::Inactive, None).await;
        }
    }

    async fn reacquire(&self) {
        if self.enabled.get() && !self.held.get() {
            self.request_lock().await;
        }
    }

    async fn request_lock(&self) {
        if !self.enabled.get() {
            return;
        }
        let Some(_guard) = RequestGuard::acquire(&self.requesting) else {
            log::debug!("Wake lock request already in flight");
            return;
        };

        let first_request = self.requests.replace(self.requests.get() + 1) == 0;
        self.retry_on_focus.set(false);

        match self.wake_lock.request().await {
            Ok(()) => {
                if !self.enabled.get() {
                    // Stopped while the request was pending
                    if let Err(e) = self.wake_lock.release().await {
                        log::warn!("Failed to release wake lock: {e}");
                    }
                    return;
                }
                self.held.set(true);
                self.report(LockStatus::Active, None).await;
            }
            Err(WakeLockError::NotAllowed(_)) if first_request && self.is_manual_ios() => {
                log::debug!("Initial request denied while the popup had focus, deferring");
                self.retry_on_focus.set(true);
            }
            Err(e) => {
                log::warn!("{e}");
                self.report(LockStatus::Error, Some(e.code().into())).await;
            }
        }
    }

    fn is_manual_ios(&self) -> bool {
        let platform = self.platform.borrow();
        platform.is_manual && platform.os.as_deref() == Some(IOS)
    }

    async fn fetch_platform_info(&self) -> PlatformInfo {
        match self.messenger.send_message(&ExtensionMessage::GetPlatformInfo).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("Unexpected platform info reply: {e}");
                PlatformInfo::default()
            }),
            Ok(None) => PlatformInfo::default(),
            Err(e) => {
                log::warn!("Failed to fetch platform info: {e}");
                PlatformInfo::default()
            }
        }
    }

    async fn report(&self, status: LockStatus, error: Option<LockError>) {
        let message = ExtensionMessage::status_update(status, error);
        if let Err(e) = self.messenger.send_message(&message).await {
            log::debug!("Status update not delivered: {e}");
        }
    }
}
