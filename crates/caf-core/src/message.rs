//! Cross-context message protocol
//!
//! Requests travel as JSON objects tagged by `type`. Responses are untagged:
//! the requesting side knows which shape to expect for the kind it sent.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{LockError, LockStatus, RuleState, RuleType, SessionState, TabId};

/// Every message understood by the background coordinator or a content context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ExtensionMessage {
    ToggleSession,
    GetStatus,
    StatusUpdate {
        status: LockStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        #[ts(optional)]
        error: Option<LockError>,
    },
    GetPlatformInfo,
    /// Reserved; accepted and ignored by the coordinator.
    AcquireLock,
    ReleaseLock,
    AddRule {
        #[serde(rename = "ruleType")]
        rule_type: RuleType,
        url: String,
    },
    RemoveRule {
        #[serde(rename = "ruleType")]
        rule_type: RuleType,
        url: String,
    },
    GetRuleForTab,
    GetPermissionForTab,
}

impl ExtensionMessage {
    /// Wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToggleSession => "TOGGLE_SESSION",
            Self::GetStatus => "GET_STATUS",
            Self::StatusUpdate { .. } => "STATUS_UPDATE",
            Self::GetPlatformInfo => "GET_PLATFORM_INFO",
            Self::AcquireLock => "ACQUIRE_LOCK",
            Self::ReleaseLock => "RELEASE_LOCK",
            Self::AddRule { .. } => "ADD_RULE",
            Self::RemoveRule { .. } => "REMOVE_RULE",
            Self::GetRuleForTab => "GET_RULE_FOR_TAB",
            Self::GetPermissionForTab => "GET_PERMISSION_FOR_TAB",
        }
    }

    pub fn status_update(status: LockStatus, error: Option<LockError>) -> Self {
        Self::StatusUpdate { status, error }
    }
}

/// Where a message came from. Content contexts carry their tab id, the popup does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageSender {
    pub tab_id: Option<TabId>,
}

impl MessageSender {
    pub fn popup() -> Self {
        Self { tab_id: None }
    }

    pub fn tab(tab_id: TabId) -> Self {
        Self { tab_id: Some(tab_id) }
    }
}

/// Platform details for a content context.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlatformInfo {
    /// Host OS name (`android`, `ios`, `mac`, `win`, ...), null when unknown
    pub os: Option<String>,
    /// True when the lock was requested by an explicit toggle
    #[serde(default)]
    pub is_manual: bool,
}

/// `GET_RULE_FOR_TAB` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleForTab {
    pub rule_state: Option<RuleState>,
}

/// A coordinator reply. Absent replies are modelled as `Option::None` by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum MessageResponse {
    Session(SessionState),
    PlatformInfo(PlatformInfo),
    RuleForTab(Option<RuleForTab>),
    Permission(Option<bool>),
}

impl From<SessionState> for MessageResponse {
    fn from(state: SessionState) -> Self {
        Self::Session(state)
    }
}
