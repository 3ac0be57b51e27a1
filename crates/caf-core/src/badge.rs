//! Toolbar badge rendering for a tab's lock status.

use crate::host::{operating_system, Badge, Platform};
use crate::types::{LockStatus, TabId};

/// Badge appearance for one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeStyle {
    /// Label on Android, where the badge is shown as text in a menu
    pub android_text: &'static str,
    pub desktop_text: &'static str,
    /// Background color; None leaves the current color alone
    pub color: Option<&'static str>,
}

impl BadgeStyle {
    pub fn text(&self, is_android: bool) -> &'static str {
        if is_android {
            self.android_text
        } else {
            self.desktop_text
        }
    }
}

pub fn badge_style(status: LockStatus) -> BadgeStyle {
    match status {
        LockStatus::Active => BadgeStyle {
            android_text: "ACTIVE",
            desktop_text: "ON",
            color: Some("#2ecc71"),
        },
        LockStatus::Pending => BadgeStyle {
            android_text: "PENDING",
            desktop_text: "",
            color: Some("#f39c12"),
        },
        LockStatus::Error => BadgeStyle {
            android_text: "ERROR",
            desktop_text: "ERR",
            color: Some("#e74c3c"),
        },
        LockStatus::Inactive => BadgeStyle {
            android_text: "OFF",
            desktop_text: "",
            color: None,
        },
    }
}

/// Render `status` on the badge of `tab_id`.
///
/// Invalid tab ids are ignored. Host failures are logged and swallowed.
pub async fn update_badge<H>(host: &H, tab_id: TabId, status: LockStatus)
where
    H: Badge + Platform + ?Sized,
{
    if tab_id <= 0 {
        return;
    }

    let is_android = operating_system(host).await.as_deref() == Some("android");
    let style = badge_style(status);

    if let Err(e) = host.set_badge_text(tab_id, style.text(is_android)).await {
        log::error!("Failed to set badge text for tab {tab_id}: {e}");
    }
    if let Some(color) = style.color {
        if let Err(e) = host.set_badge_color(tab_id, color).await {
            log::error!("Failed to set badge color for tab {tab_id}: {e}");
        }
    }
}
