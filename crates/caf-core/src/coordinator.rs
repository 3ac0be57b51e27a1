//! Background coordinator
//!
//! Receives messages from the popup and content contexts, reacts to tab
//! lifecycle events, and drives injection, release and badge updates. One
//! instance lives for the lifetime of the background context; the owner
//! registers the host listeners and forwards events here.
//!
//! Every host failure is handled in this module: it is logged and turned
//! into a session error or an absent response, never propagated.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use crate::badge::update_badge;
use crate::host::{operating_system, Host};
use crate::message::{ExtensionMessage, MessageResponse, MessageSender, PlatformInfo, RuleForTab};
use crate::permission::domain_origin_permission;
use crate::rules::RuleManager;
use crate::session::SessionManager;
use crate::storage::KeyValueStore;
use crate::types::{
    ErrorCode, LockError, LockStatus, RuleType, SessionState, TabChange, TabId, TabInfo,
    TabLoadStatus,
};
use crate::url::{is_secure_url, is_web_url};

// =============================================================================
// Toggle Guard
// =============================================================================

/// Holds the single toggle slot; releases it on drop, whatever the exit path.
struct ToggleGuard<'a>(&'a Cell<bool>);

impl<'a> ToggleGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for ToggleGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// =============================================================================
// Background Manager
// =============================================================================

pub struct BackgroundManager<H, S, L> {
    host: H,
    sessions: SessionManager<S>,
    rules: RuleManager<L>,
    initialized: Cell<bool>,
    toggle_in_flight: Cell<bool>,
    /// Fallback target when the focused tab is not a web page (e.g. the popup
    /// opened as a tab on mobile)
    last_active_web_tab: Cell<Option<TabId>>,
    /// Tabs injected by an explicit toggle, until their content script asks
    manual_trigger_tabs: RefCell<HashSet<TabId>>,
}

impl<H, S, L> BackgroundManager<H, S, L>
where
    H: Host,
    S: KeyValueStore,
    L: KeyValueStore,
{
    pub fn new(host: H, sessions: SessionManager<S>, rules: RuleManager<L>) -> Self {
        Self {
            host,
            sessions,
            rules,
            initialized: Cell::new(false),
            toggle_in_flight: Cell::new(false),
            last_active_web_tab: Cell::new(None),
            manual_trigger_tabs: RefCell::new(HashSet::new()),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn rules(&self) -> &RuleManager<L> {
        &self.rules
    }

    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    /// Mark the coordinator as initialized. Returns true only on the first
    /// call; the caller registers host listeners when it does.
    pub fn init(&self) -> bool {
        if self.initialized.replace(true) {
            return false;
        }
        log::info!("Background coordinator initializing");
        true
    }

    pub fn last_active_web_tab(&self) -> Option<TabId> {
        self.last_active_web_tab.get()
    }

    // -------------------------------------------------------------------------
    // Message dispatch
    // -------------------------------------------------------------------------

    /// Handle one message. `None` means no response is sent.
    pub async fn handle_message(
        &self,
        message: ExtensionMessage,
        sender: MessageSender,
    ) -> Option<MessageResponse> {
        log::debug!("Message received: {} (sender tab {:?})", message.kind(), sender.tab_id);

        match message {
            ExtensionMessage::StatusUpdate { status, error } => {
                self.handle_status_update(status, error, sender.tab_id).await;
                None
            }
            ExtensionMessage::GetStatus => Some(self.handle_get_status().await.into()),
            ExtensionMessage::ToggleSession => self.handle_toggle_session().await,
            ExtensionMessage::GetPlatformInfo => Some(MessageResponse::PlatformInfo(
                self.handle_get_platform_info(sender.tab_id).await,
            )),
            ExtensionMessage::AddRule { rule_type, url } => {
                self.handle_add_rule(rule_type, &url).await;
                None
            }
            ExtensionMessage::RemoveRule { rule_type, url } => {
                self.handle_remove_rule(rule_type, &url).await;
                None
            }
            ExtensionMessage::GetRuleForTab => {
                Some(MessageResponse::RuleForTab(self.handle_get_rule_for_tab().await))
            }
            ExtensionMessage::GetPermissionForTab => Some(MessageResponse::Permission(
                self.handle_get_permission_for_tab().await,
            )),
            ExtensionMessage::AcquireLock | ExtensionMessage::ReleaseLock => None,
        }
    }

    async fn handle_status_update(
        &self,
        status: LockStatus,
        error: Option<LockError>,
        tab_id: Option<TabId>,
    ) {
        let Some(tab_id) = tab_id else {
            log::debug!("Status update without a sender tab, ignoring");
            return;
        };

        match &error {
            Some(error) => log::info!("Status update for tab {tab_id}: {status} ({error})"),
            None => log::info!("Status update for tab {tab_id}: {status}"),
        }

        if status == LockStatus::Inactive {
            self.clear_session(tab_id).await;
        } else {
            self.record(tab_id, status, error).await;
        }
    }

    async fn handle_get_status(&self) -> SessionState {
        match self.active_tab_id().await {
            Some(tab_id) => self.session_state(tab_id).await,
            None => SessionState::inactive(),
        }
    }

    async fn handle_toggle_session(&self) -> Option<MessageResponse> {
        let Some(_guard) = ToggleGuard::acquire(&self.toggle_in_flight) else {
            log::debug!("Toggle already in progress, ignoring");
            return None;
        };

        let tab_id = self.active_tab_id().await?;
        let current = self.session_state(tab_id).await;
        log::info!("Toggling session for tab {tab_id}, current status: {}", current.status);

        if current.status == LockStatus::Active {
            if let Err(e) = self.host.send_to_tab(tab_id, &ExtensionMessage::ReleaseLock).await {
                log::warn!("Failed to send RELEASE_LOCK to tab {tab_id}, inactivating directly: {e}");
                self.clear_session(tab_id).await;
            }
            return Some(SessionState::inactive().into());
        }

        let tab = match self.host.get_tab(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                log::error!("Failed to read tab {tab_id}: {e}");
                let error = e.to_lock_error();
                self.record(tab_id, LockStatus::Error, Some(error.clone())).await;
                return Some(SessionState::failed(error).into());
            }
        };

        if !is_secure_url(tab.url()) {
            log::warn!("Cannot toggle session for insecure or unsupported URL: {}", tab.url());
            let error = LockError::Code(ErrorCode::NotSecure);
            self.record(tab_id, LockStatus::Error, Some(error.clone())).await;
            return Some(SessionState::failed(error).into());
        }

        self.manual_trigger_tabs.borrow_mut().insert(tab_id);
        if let Err(error) = self.activate(tab_id).await {
            self.manual_trigger_tabs.borrow_mut().remove(&tab_id);
            return Some(SessionState::failed(error).into());
        }

        Some(SessionState::new(LockStatus::Pending).into())
    }

    async fn handle_get_platform_info(&self, tab_id: Option<TabId>) -> PlatformInfo {
        let os = operating_system(&self.host).await;
        let is_manual = match tab_id {
            Some(tab_id) => self.manual_trigger_tabs.borrow_mut().remove(&tab_id),
            None => false,
        };
        PlatformInfo { os, is_manual }
    }

    async fn handle_add_rule(&self, rule_type: RuleType, url: &str) {
        log::info!("Adding {rule_type:?} rule for {url}");
        if let Err(e) = self.rules.add_rule(rule_type, url).await {
            log::error!("Failed to add {rule_type:?} rule for {url}: {e}");
        }
    }

    async fn handle_remove_rule(&self, rule_type: RuleType, url: &str) {
        log::info!("Removing {rule_type:?} rule for {url}");
        if let Err(e) = self.rules.remove_rule(rule_type, url).await {
            log::error!("Failed to remove {rule_type:?} rule for {url}: {e}");
        }
    }

    async fn handle_get_rule_for_tab(&self) -> Option<RuleForTab> {
        let (_, tab) = self.active_web_tab().await?;
        let rule_state = match self.rules.get_rule_state(tab.url()).await {
            Ok(rule_state) => rule_state,
            Err(e) => {
                log::error!("Failed to read rules for {}: {e}", tab.url());
                None
            }
        };
        Some(RuleForTab { rule_state })
    }

    async fn handle_get_permission_for_tab(&self) -> Option<bool> {
        let (_, tab) = self.active_web_tab().await?;
        let root_domain = self.rules.root_domain(tab.url())?;
        self.has_domain_permission(&root_domain).await
    }

    // -------------------------------------------------------------------------
    // Tab events
    // -------------------------------------------------------------------------

    pub async fn on_tab_updated(&self, tab_id: TabId, change: &TabChange, tab: &TabInfo) {
        match change.status {
            Some(TabLoadStatus::Loading) => {
                self.clear_session(tab_id).await;
            }
            Some(TabLoadStatus::Complete) if tab.active && is_secure_url(tab.url()) => {
                self.last_active_web_tab.set(Some(tab_id));
                self.auto_activate(tab_id, tab.url()).await;
            }
            _ => {}
        }
    }

    pub async fn on_tab_removed(&self, tab_id: TabId) {
        if self.last_active_web_tab.get() == Some(tab_id) {
            self.last_active_web_tab.set(None);
        }
        self.manual_trigger_tabs.borrow_mut().remove(&tab_id);
        log::debug!("Tab {tab_id} removed, cleaning up session");
        if let Err(e) = self.sessions.delete(tab_id).await {
            log::error!("Failed to clear session for tab {tab_id}: {e}");
        }
    }

    pub async fn on_tab_activated(&self, tab_id: TabId) {
        match self.host.get_tab(tab_id).await {
            Ok(tab) if is_web_url(tab.url()) => self.last_active_web_tab.set(Some(tab_id)),
            Ok(_) => {}
            Err(e) => log::debug!("Activated tab {tab_id} unavailable: {e}"),
        }
    }

    async fn auto_activate(&self, tab_id: TabId, url: &str) {
        let rule_state = match self.rules.get_rule_state(url).await {
            Ok(Some(rule_state)) => rule_state,
            Ok(None) => return,
            Err(e) => {
                log::error!("Failed to read rules for {url}: {e}");
                return;
            }
        };

        log::info!("Rule found for {url}, attempting auto-activation: {rule_state:?}");
        if self.has_domain_permission(&rule_state.root_domain).await == Some(true) {
            log::info!("Auto-activating wake lock for tab {tab_id}");
            // Failures are already recorded on the session
            let _ = self.activate(tab_id).await;
        } else {
            log::warn!("Permission required for auto-activation on {}", rule_state.root_domain);
            self.record(
                tab_id,
                LockStatus::Error,
                Some(ErrorCode::PermissionRequired.into()),
            )
            .await;
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Inject the content script. The tab is `pending` until the script
    /// reports in; on failure it is `error` with the host's reason.
    async fn activate(&self, tab_id: TabId) -> Result<(), LockError> {
        self.record(tab_id, LockStatus::Pending, None).await;

        log::info!("Injecting content script into tab {tab_id}");
        if let Err(e) = self.host.inject_content_script(tab_id).await {
            log::error!("Error injecting content script into tab {tab_id}: {e}");
            let error = e.to_lock_error();
            self.record(tab_id, LockStatus::Error, Some(error.clone())).await;
            return Err(error);
        }
        Ok(())
    }

    /// Focused web tab, or the last web tab that had focus.
    async fn active_tab_id(&self) -> Option<TabId> {
        match self.host.active_tab().await {
            Ok(Some(tab)) if is_web_url(tab.url()) => tab.id,
            Ok(_) => self.last_active_web_tab.get(),
            Err(e) => {
                log::warn!("Failed to query the active tab: {e}");
                self.last_active_web_tab.get()
            }
        }
    }

    async fn active_web_tab(&self) -> Option<(TabId, TabInfo)> {
        let tab_id = self.active_tab_id().await?;
        match self.host.get_tab(tab_id).await {
            Ok(tab) if is_web_url(tab.url()) => Some((tab_id, tab)),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to read tab {tab_id}: {e}");
                None
            }
        }
    }

    async fn has_domain_permission(&self, root_domain: &str) -> Option<bool> {
        let origins = [domain_origin_permission(root_domain)];
        match self.host.contains_origins(&origins).await {
            Ok(granted) => Some(granted),
            Err(e) => {
                log::warn!("Permission check for {root_domain} failed: {e}");
                None
            }
        }
    }

    async fn session_state(&self, tab_id: TabId) -> SessionState {
        self.sessions.get(tab_id).await.unwrap_or_else(|e| {
            log::error!("Failed to read session for tab {tab_id}: {e}");
            SessionState::inactive()
        })
    }

    /// Store a status and show it on the badge.
    async fn record(&self, tab_id: TabId, status: LockStatus, error: Option<LockError>) {
        if let Err(e) = self.sessions.set(tab_id, status, error).await {
            log::error!("Failed to store session for tab {tab_id}: {e}");
        }
        update_badge(&self.host, tab_id, status).await;
    }

    async fn clear_session(&self, tab_id: TabId) {
        if let Err(e) = self.sessions.delete(tab_id).await {
            log::error!("Failed to clear session for tab {tab_id}: {e}");
        }
        update_badge(&self.host, tab_id, LockStatus::Inactive).await;
    }
}
