//! `chrome.*` implementation of the coordinator's host capabilities

use async_trait::async_trait;
use caf_core::host::{Badge, Permissions, Platform, Scripting, Tabs};
use caf_core::types::TabInfo;
use caf_core::{ExtensionMessage, HostError, TabId};
use serde_json::json;

use crate::chrome::{self, call, from_js, get_field, to_js};

pub struct ChromeHost {
    content_script_file: String,
}

impl ChromeHost {
    pub fn new(content_script_file: impl Into<String>) -> Self {
        Self {
            content_script_file: content_script_file.into(),
        }
    }
}

#[async_trait(?Send)]
impl Tabs for ChromeHost {
    async fn active_tab(&self) -> Result<Option<TabInfo>, HostError> {
        let query = to_js(&json!({ "active": true, "currentWindow": true }))?;
        let tabs = call(chrome::tabs_query(&query)).await?;
        let tabs: Vec<TabInfo> = from_js(tabs)?;
        Ok(tabs.into_iter().next())
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, HostError> {
        from_js(call(chrome::tabs_get(tab_id)).await?)
    }

    async fn send_to_tab(&self, tab_id: TabId, message: &ExtensionMessage) -> Result<(), HostError> {
        let message = to_js(message)?;
        call(chrome::tabs_send_message(tab_id, &message)).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl Scripting for ChromeHost {
    async fn inject_content_script(&self, tab_id: TabId) -> Result<(), HostError> {
        let injection = to_js(&json!({
            "target": { "tabId": tab_id },
            "files": [self.content_script_file],
        }))?;
        call(chrome::scripting_execute_script(&injection)).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl Permissions for ChromeHost {
    async fn contains_origins(&self, origins: &[String]) -> Result<bool, HostError> {
        let query = to_js(&json!({ "origins": origins }))?;
        let granted = call(chrome::permissions_contains(&query)).await?;
        Ok(granted.as_bool().unwrap_or(false))
    }
}

#[async_trait(?Send)]
impl Badge for ChromeHost {
    async fn set_badge_text(&self, tab_id: TabId, text: &str) -> Result<(), HostError> {
        let details = to_js(&json!({ "tabId": tab_id, "text": text }))?;
        call(chrome::action_set_badge_text(&details)).await?;
        Ok(())
    }

    async fn set_badge_color(&self, tab_id: TabId, color: &str) -> Result<(), HostError> {
        let details = to_js(&json!({ "tabId": tab_id, "color": color }))?;
        call(chrome::action_set_badge_background_color(&details)).await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl Platform for ChromeHost {
    async fn operating_system(&self) -> Result<String, HostError> {
        let info = call(chrome::runtime_get_platform_info()).await?;
        get_field(&info, "os")
            .and_then(|os| os.as_string())
            .ok_or(HostError::Unavailable("runtime.getPlatformInfo().os"))
    }
}
