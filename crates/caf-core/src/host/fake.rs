//! Recording fake of the browser host for tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{Badge, Permissions, Platform, Scripting, Tabs};
use crate::error::HostError;
use crate::message::ExtensionMessage;
use crate::types::{TabId, TabInfo};

#[derive(Default)]
pub(crate) struct FakeState {
    pub tabs: HashMap<TabId, TabInfo>,
    pub active_tab: Option<TabId>,
    /// Tabs whose content context is gone
    pub unreachable_tabs: HashSet<TabId>,
    pub inject_error: Option<String>,
    pub granted_origins: HashSet<String>,
    pub os: Option<String>,
    pub badge_fails: bool,

    pub sent: Vec<(TabId, ExtensionMessage)>,
    pub injections: Vec<TabId>,
    pub badge_texts: Vec<(TabId, String)>,
    pub badge_colors: Vec<(TabId, String)>,
    pub permission_queries: Vec<Vec<String>>,
}

/// Clones share state, so a test can keep a handle after moving one into
/// the coordinator.
#[derive(Clone, Default)]
pub(crate) struct FakeHost {
    pub state: Rc<RefCell<FakeState>>,
    inject_gate: Rc<RefCell<Option<Rc<Notify>>>>,
}

impl FakeHost {
    pub fn new() -> Self {
        let host = Self::default();
        host.state.borrow_mut().os = Some("linux".to_string());
        host
    }

    /// Add a tab and focus it.
    pub fn open_tab(&self, tab_id: TabId, url: &str) {
        let mut state = self.state.borrow_mut();
        for tab in state.tabs.values_mut() {
            tab.active = false;
        }
        state.tabs.insert(
            tab_id,
            TabInfo {
                id: Some(tab_id),
                url: Some(url.to_string()),
                active: true,
            },
        );
        state.active_tab = Some(tab_id);
    }

    pub fn tab(&self, tab_id: TabId) -> TabInfo {
        self.state.borrow().tabs.get(&tab_id).cloned().unwrap_or_default()
    }

    pub fn grant(&self, origin: &str) {
        self.state.borrow_mut().granted_origins.insert(origin.to_string());
    }

    /// Block every following injection until the returned handle is notified.
    pub fn gate_injections(&self) -> Rc<Notify> {
        let notify = Rc::new(Notify::new());
        *self.inject_gate.borrow_mut() = Some(notify.clone());
        notify
    }

    pub fn injections(&self) -> Vec<TabId> {
        self.state.borrow().injections.clone()
    }

    pub fn sent(&self) -> Vec<(TabId, ExtensionMessage)> {
        self.state.borrow().sent.clone()
    }

    pub fn last_badge_text(&self, tab_id: TabId) -> Option<String> {
        self.state
            .borrow()
            .badge_texts
            .iter()
            .rev()
            .find(|(id, _)| *id == tab_id)
            .map(|(_, text)| text.clone())
    }

    pub fn last_badge_color(&self, tab_id: TabId) -> Option<String> {
        self.state
            .borrow()
            .badge_colors
            .iter()
            .rev()
            .find(|(id, _)| *id == tab_id)
            .map(|(_, color)| color.clone())
    }
}

#[async_trait(?Send)]
impl Tabs for FakeHost {
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        let state = self.state.borrow();
        Ok(state.active_tab.and_then(|id| state.tabs.get(&id).cloned()))
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, HostError> {
        self.state
            .borrow()
            .tabs
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| HostError::failed(format!("No tab with id: {tab_id}.")))
    }

    async fn send_to_tab(&self, tab_id: TabId, message: &ExtensionMessage) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.unreachable_tabs.contains(&tab_id) {
            return Err(HostError::failed(
                "Could not establish connection. Receiving end does not exist.",
            ));
        }
        state.sent.push((tab_id, message.clone()));
        Ok(())
    }
}

#[async_trait(?Send)]
impl Scripting for FakeHost {
    async fn inject_content_script(&self, tab_id: TabId) -> Result<(), HostError> {
        self.state.borrow_mut().injections.push(tab_id);

        let gate = self.inject_gate.borrow().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.state.borrow().inject_error.clone() {
            Some(message) => Err(HostError::Failed(message)),
            None => Ok(()),
        }
    }
}

#[async_trait(?Send)]
impl Permissions for FakeHost {
    async fn contains_origins(&self, origins: &[String]) -> Result<bool, HostError> {
        let mut state = self.state.borrow_mut();
        state.permission_queries.push(origins.to_vec());
        Ok(origins.iter().all(|origin| state.granted_origins.contains(origin)))
    }
}

#[async_trait(?Send)]
impl Badge for FakeHost {
    async fn set_badge_text(&self, tab_id: TabId, text: &str) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.badge_fails {
            return Err(HostError::failed("No tab with id"));
        }
        state.badge_texts.push((tab_id, text.to_string()));
        Ok(())
    }

    async fn set_badge_color(&self, tab_id: TabId, color: &str) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.badge_fails {
            return Err(HostError::failed("No tab with id"));
        }
        state.badge_colors.push((tab_id, color.to_string()));
        Ok(())
    }
}

#[async_trait(?Send)]
impl Platform for FakeHost {
    async fn operating_system(&self) -> Result<String, HostError> {
        self.state
            .borrow()
            .os
            .clone()
            .ok_or(HostError::Unavailable("runtime.getPlatformInfo"))
    }
}
