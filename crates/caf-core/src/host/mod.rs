//! Host (browser) capabilities
//!
//! The coordinator never talks to the browser directly. Each API family it
//! needs is a trait here; the wasm crate implements them over `chrome.*`
//! and the tests use [`fake::FakeHost`].

use async_trait::async_trait;

use crate::error::HostError;
use crate::message::ExtensionMessage;
use crate::types::{TabId, TabInfo};

#[cfg(test)]
pub(crate) mod fake;

/// Tab enumeration and messaging.
#[async_trait(?Send)]
pub trait Tabs {
    /// The active tab of the current window, if any.
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError>;

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, HostError>;

    /// Deliver a message to the content context of a tab.
    /// Fails when nothing in the tab is listening.
    async fn send_to_tab(&self, tab_id: TabId, message: &ExtensionMessage) -> Result<(), HostError>;
}

/// Content-script injection.
#[async_trait(?Send)]
pub trait Scripting {
    async fn inject_content_script(&self, tab_id: TabId) -> Result<(), HostError>;
}

/// Host permission checks.
#[async_trait(?Send)]
pub trait Permissions {
    /// True when every origin pattern is granted.
    async fn contains_origins(&self, origins: &[String]) -> Result<bool, HostError>;
}

/// Toolbar badge.
#[async_trait(?Send)]
pub trait Badge {
    async fn set_badge_text(&self, tab_id: TabId, text: &str) -> Result<(), HostError>;

    async fn set_badge_color(&self, tab_id: TabId, color: &str) -> Result<(), HostError>;
}

/// Runtime platform details.
#[async_trait(?Send)]
pub trait Platform {
    /// Operating system name as reported by the runtime (`android`, `mac`, ...).
    async fn operating_system(&self) -> Result<String, HostError>;
}

/// Everything the background coordinator needs from the browser.
pub trait Host: Tabs + Scripting + Permissions + Badge + Platform {}

impl<T> Host for T where T: Tabs + Scripting + Permissions + Badge + Platform {}

/// OS lookup that degrades to `None`, as every caller treats a failure
/// as "unknown platform".
pub async fn operating_system<P: Platform + ?Sized>(platform: &P) -> Option<String> {
    match platform.operating_system().await {
        Ok(os) => Some(os),
        Err(e) => {
            log::debug!("Platform info unavailable: {e}");
            None
        }
    }
}
