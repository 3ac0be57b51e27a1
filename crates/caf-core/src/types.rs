//! Core type definitions for Caffeine
//!
//! These types are shared by the background coordinator, the content-side
//! wake-lock wrapper and the popup. Their serde representation is the wire
//! and storage format, so field names stay camelCase.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Browser tab identifier.
pub type TabId = i32;

// =============================================================================
// Lock Status
// =============================================================================

/// Wake-lock status of a single tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum LockStatus {
    /// No lock held (also the implicit state of an unknown tab)
    #[default]
    Inactive,
    /// Content script injected, lock not acquired yet
    Pending,
    /// Lock held
    Active,
    /// Activation or the running session failed
    Error,
}

impl LockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Error Codes
// =============================================================================

/// Short error codes rendered by the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorCode {
    /// A rule matched but the host permission for its domain is missing
    PermissionRequired,
    /// Page is not served over https
    NotSecure,
    /// Platform has no wake-lock support
    NotSupported,
    /// OS power policy denied the lock (battery saver and friends)
    SystemBlocked,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionRequired => "PERMISSION_REQUIRED",
            Self::NotSecure => "NOT_SECURE",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::SystemBlocked => "SYSTEM_BLOCKED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a session: a known code or a free-form host message.
///
/// Both variants serialize as a plain string. Known codes are tried first
/// when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum LockError {
    Code(ErrorCode),
    Detail(String),
}

impl From<ErrorCode> for LockError {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code)
    }
}

impl From<String> for LockError {
    fn from(detail: String) -> Self {
        Self::Detail(detail)
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => code.fmt(f),
            Self::Detail(detail) => f.write_str(detail),
        }
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Per-tab session record, also the response to status queries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionState {
    pub status: LockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<LockError>,
}

impl SessionState {
    pub fn new(status: LockStatus) -> Self {
        Self { status, error: None }
    }

    /// Error state carrying `error`.
    pub fn failed(error: impl Into<LockError>) -> Self {
        Self {
            status: LockStatus::Error,
            error: Some(error.into()),
        }
    }

    pub fn inactive() -> Self {
        Self::new(LockStatus::Inactive)
    }
}

// =============================================================================
// Rules
// =============================================================================

/// Scope of an automation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RuleType {
    /// Exact page URL
    Page,
    /// Whole registrable domain
    Domain,
}

/// Persisted rules for one registrable domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRuleset {
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
    pub is_domain_wide: bool,
    /// Exact page URLs, in insertion order and without duplicates
    pub pages: Vec<String>,
}

impl DomainRuleset {
    pub fn new(created_at: u64) -> Self {
        Self {
            created_at,
            is_domain_wide: false,
            pages: Vec::new(),
        }
    }

    /// True when the ruleset no longer carries any rule and must not be stored.
    pub fn is_empty(&self) -> bool {
        !self.is_domain_wide && self.pages.is_empty()
    }
}

/// Rules that apply to a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleState {
    pub has_page_rule: bool,
    pub has_domain_rule: bool,
    pub root_domain: String,
}

// =============================================================================
// Tabs
// =============================================================================

/// Snapshot of the tab fields the coordinator reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabInfo {
    #[serde(default)]
    pub id: Option<TabId>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl TabInfo {
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }
}

/// Loading phase reported by a tab update event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabLoadStatus {
    Loading,
    Complete,
    #[serde(other)]
    Unknown,
}

/// Subset of the tab update change set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabChange {
    #[serde(default)]
    pub status: Option<TabLoadStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_wire_format() {
        let state = SessionState::failed(ErrorCode::NotSecure);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "error": "NOT_SECURE"}));

        let inactive = serde_json::to_value(SessionState::inactive()).unwrap();
        assert_eq!(inactive, serde_json::json!({"status": "inactive"}));
    }

    #[test]
    fn test_lock_error_prefers_known_codes() {
        let known: LockError = serde_json::from_str("\"SYSTEM_BLOCKED\"").unwrap();
        assert_eq!(known, LockError::Code(ErrorCode::SystemBlocked));

        let detail: LockError = serde_json::from_str("\"Cannot access contents of url\"").unwrap();
        assert_eq!(detail, LockError::Detail("Cannot access contents of url".to_string()));
    }

    #[test]
    fn test_domain_ruleset_storage_format() {
        let ruleset = DomainRuleset {
            created_at: 1_700_000_000_000,
            is_domain_wide: true,
            pages: vec!["https://example.com/a".to_string()],
        };
        let json = serde_json::to_value(&ruleset).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "createdAt": 1_700_000_000_000u64,
                "isDomainWide": true,
                "pages": ["https://example.com/a"],
            })
        );
        assert!(!ruleset.is_empty());
        assert!(DomainRuleset::new(0).is_empty());
    }

    #[test]
    fn test_tab_change_unknown_status() {
        let change: TabChange = serde_json::from_str(r#"{"status": "unloaded"}"#).unwrap();
        assert_eq!(change.status, Some(TabLoadStatus::Unknown));
        let empty: TabChange = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.status, None);
    }
}
