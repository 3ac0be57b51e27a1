//! `Background` class: the coordinator bound to the service worker

use std::rc::Rc;

use caf_core::types::{TabChange, TabInfo};
use caf_core::{
    BackgroundManager, Clock, DomainResolver, ExtensionConfig, ExtensionMessage, MessageSender,
    RuleManager, SessionManager, TabId,
};
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};

use crate::chrome::{self, error_message, from_js, get_field, to_js};
use crate::host::ChromeHost;
use crate::storage::ChromeStorage;

type Manager = BackgroundManager<ChromeHost, ChromeStorage, ChromeStorage>;

/// `Date.now()`; `SystemTime` is unavailable on wasm32.
struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

#[wasm_bindgen]
pub struct Background {
    manager: Rc<Manager>,
    resolver: Rc<DomainResolver>,
    config: ExtensionConfig,
}

#[wasm_bindgen]
impl Background {
    /// Build the coordinator. `config` may be omitted; invalid fields fall
    /// back to their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Background {
        let config = crate::parse_config(config);
        crate::apply_log_level(&config);

        let resolver = Rc::new(DomainResolver::new());
        let rules = RuleManager::new(ChromeStorage::local(), resolver.clone(), Box::new(JsClock));
        let sessions = SessionManager::new(ChromeStorage::session());
        let host = ChromeHost::new(config.content_script_file.clone());

        Background {
            manager: Rc::new(BackgroundManager::new(host, sessions, rules)),
            resolver,
            config,
        }
    }

    /// Register the runtime and tab listeners and start loading the suffix
    /// list. Later calls do nothing and return false.
    pub fn init(&self) -> bool {
        if !self.manager.init() {
            return false;
        }

        self.register_listeners();

        let resolver = self.resolver.clone();
        let path = self.config.public_suffix_list_path.clone();
        spawn_local(async move {
            match fetch_text(&path).await {
                Ok(text) => {
                    if let Err(e) = resolver.load_list(&text) {
                        log::warn!("{e}, using built-in heuristic");
                    }
                }
                Err(e) => log::warn!("Failed to fetch {path}: {}", error_message(&e)),
            }
        });

        true
    }

    /// Dispatch one message. Resolves to the response, or `undefined` when
    /// there is none.
    pub fn handle_message(&self, message: JsValue, sender_tab_id: Option<i32>) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            let message: ExtensionMessage =
                from_js(message).map_err(|e| JsValue::from(JsError::new(&e.to_string())))?;
            let sender = MessageSender { tab_id: sender_tab_id };
            respond(&manager, message, sender).await
        })
    }

    pub fn on_tab_updated(&self, tab_id: i32, change: JsValue, tab: JsValue) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            tab_updated(&manager, tab_id, change, tab).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn on_tab_removed(&self, tab_id: i32) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            manager.on_tab_removed(tab_id).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn on_tab_activated(&self, tab_id: i32) -> Promise {
        let manager = self.manager.clone();
        future_to_promise(async move {
            manager.on_tab_activated(tab_id).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Replace the suffix list with `text` (PSL `.dat` format).
    pub fn load_public_suffix_list(&self, text: &str) -> Result<(), JsError> {
        self.resolver.load_list(text).map_err(|e| JsError::new(&e.to_string()))
    }

    pub fn has_public_suffix_list(&self) -> bool {
        self.resolver.has_list()
    }

    /// Root domain of `url` under the current suffix list.
    pub fn root_domain(&self, url: &str) -> Option<String> {
        self.resolver.root_domain(url)
    }
}

impl Background {
    fn register_listeners(&self) {
        let manager = self.manager.clone();
        let on_message = Closure::<dyn FnMut(JsValue, JsValue, Function) -> JsValue>::new(
            move |message: JsValue, sender: JsValue, send_response: Function| {
                let message: ExtensionMessage = match from_js(message) {
                    Ok(message) => message,
                    Err(e) => {
                        log::debug!("Ignoring unknown message: {e}");
                        return JsValue::FALSE;
                    }
                };
                let sender = MessageSender {
                    tab_id: sender_tab_id(&sender),
                };
                let manager = manager.clone();
                spawn_local(async move {
                    let response = respond(&manager, message, sender)
                        .await
                        .unwrap_or(JsValue::UNDEFINED);
                    if let Err(e) = send_response.call1(&JsValue::NULL, &response) {
                        log::debug!("Response not delivered: {}", error_message(&e));
                    }
                });
                // Keep the channel open for the async response
                JsValue::TRUE
            },
        );
        chrome::add_runtime_message_listener(on_message.as_ref().unchecked_ref());
        on_message.forget();

        let manager = self.manager.clone();
        let on_updated = Closure::<dyn FnMut(i32, JsValue, JsValue)>::new(
            move |tab_id: i32, change: JsValue, tab: JsValue| {
                let manager = manager.clone();
                spawn_local(async move { tab_updated(&manager, tab_id, change, tab).await });
            },
        );
        chrome::add_tab_updated_listener(on_updated.as_ref().unchecked_ref());
        on_updated.forget();

        let manager = self.manager.clone();
        let on_removed = Closure::<dyn FnMut(i32)>::new(move |tab_id: i32| {
            let manager = manager.clone();
            spawn_local(async move { manager.on_tab_removed(tab_id).await });
        });
        chrome::add_tab_removed_listener(on_removed.as_ref().unchecked_ref());
        on_removed.forget();

        let manager = self.manager.clone();
        let on_activated = Closure::<dyn FnMut(JsValue)>::new(move |info: JsValue| {
            let Some(tab_id) = get_field(&info, "tabId").and_then(|id| id.as_f64()) else {
                return;
            };
            let manager = manager.clone();
            spawn_local(async move { manager.on_tab_activated(tab_id as TabId).await });
        });
        chrome::add_tab_activated_listener(on_activated.as_ref().unchecked_ref());
        on_activated.forget();

        log::debug!("Background listeners registered");
    }
}

async fn respond(
    manager: &Manager,
    message: ExtensionMessage,
    sender: MessageSender,
) -> Result<JsValue, JsValue> {
    match manager.handle_message(message, sender).await {
        Some(response) => to_js(&response).map_err(|e| JsError::new(&e.to_string()).into()),
        None => Ok(JsValue::UNDEFINED),
    }
}

async fn tab_updated(manager: &Manager, tab_id: TabId, change: JsValue, tab: JsValue) {
    let change: TabChange = from_js(change).unwrap_or_default();
    let tab: TabInfo = from_js(tab).unwrap_or_default();
    manager.on_tab_updated(tab_id, &change, &tab).await;
}

/// `sender.tab.id`, absent for the popup.
fn sender_tab_id(sender: &JsValue) -> Option<TabId> {
    get_field(sender, "tab")
        .and_then(|tab| get_field(&tab, "id"))
        .and_then(|id| id.as_f64())
        .map(|id| id as TabId)
}

async fn fetch_text(path: &str) -> Result<String, JsValue> {
    let url = chrome::runtime_get_url(path)?;
    let response: web_sys::Response = JsFuture::from(chrome::global_fetch(&url)?).await?.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let text = JsFuture::from(response.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use caf_core::types::TabLoadStatus;
    use js_sys::JSON;
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn test_sender_tab_id() {
        let from_tab = JSON::parse(r#"{"id": "ext", "tab": {"id": 42, "url": "https://example.com/"}}"#).unwrap();
        assert_eq!(sender_tab_id(&from_tab), Some(42));

        let from_popup = JSON::parse(r#"{"id": "ext", "url": "chrome-extension://ext/popup.html"}"#).unwrap();
        assert_eq!(sender_tab_id(&from_popup), None);
        assert_eq!(sender_tab_id(&JsValue::UNDEFINED), None);
    }

    #[wasm_bindgen_test]
    fn test_chrome_tab_shapes() {
        let tab = JSON::parse(
            r#"{"id": 7, "index": 0, "windowId": 1, "active": true, "pinned": false,
                "url": "https://example.com/a", "title": "A", "status": "complete"}"#,
        )
        .unwrap();
        let tab: TabInfo = from_js(tab).unwrap();
        assert_eq!(tab.id, Some(7));
        assert_eq!(tab.url(), "https://example.com/a");
        assert!(tab.active);

        // Tabs without host permission carry no url
        let bare: TabInfo = from_js(JSON::parse(r#"{"id": 8, "active": false}"#).unwrap()).unwrap();
        assert_eq!(bare.url, None);

        let loading: TabChange = from_js(JSON::parse(r#"{"status": "loading"}"#).unwrap()).unwrap();
        assert_eq!(loading.status, Some(TabLoadStatus::Loading));
        let other: TabChange = from_js(JSON::parse(r#"{"status": "unloaded"}"#).unwrap()).unwrap();
        assert_eq!(other.status, Some(TabLoadStatus::Unknown));
        let title_only: TabChange = from_js(JSON::parse(r#"{"title": "B"}"#).unwrap()).unwrap();
        assert_eq!(title_only.status, None);
    }
}
