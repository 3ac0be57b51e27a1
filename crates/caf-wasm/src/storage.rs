//! `chrome.storage` backed key-value stores

use async_trait::async_trait;
use caf_core::{KeyValueStore, StorageError};
use js_sys::{Object, Reflect};
use serde_json::Value;
use wasm_bindgen::JsValue;

use crate::chrome::{self, call, from_js, get_field, host_error, to_js};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    /// Survives browser restarts
    Local,
    /// Cleared when the browser session ends
    Session,
}

#[derive(Debug, Clone, Copy)]
pub struct ChromeStorage {
    area: StorageArea,
}

impl ChromeStorage {
    pub fn local() -> Self {
        Self { area: StorageArea::Local }
    }

    pub fn session() -> Self {
        Self { area: StorageArea::Session }
    }
}

#[async_trait(?Send)]
impl KeyValueStore for ChromeStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let items = match self.area {
            StorageArea::Local => call(chrome::storage_local_get(key)).await?,
            StorageArea::Session => call(chrome::storage_session_get(key)).await?,
        };
        match get_field(&items, key) {
            Some(value) => Ok(Some(from_js(value)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let items = Object::new();
        Reflect::set(&items, &JsValue::from_str(key), &to_js(&value)?).map_err(host_error)?;
        match self.area {
            StorageArea::Local => call(chrome::storage_local_set(&items)).await?,
            StorageArea::Session => call(chrome::storage_session_set(&items)).await?,
        };
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.area {
            StorageArea::Local => call(chrome::storage_local_remove(key)).await?,
            StorageArea::Session => call(chrome::storage_session_remove(key)).await?,
        };
        Ok(())
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use serde_json::json;
    use wasm_bindgen_test::*;

    use super::*;

    /// In-memory `chrome.storage` areas with the promise API.
    fn install_storage_stub() {
        js_sys::eval(
            r#"
            (() => {
                const area = () => {
                    const items = {};
                    return {
                        get: async (key) => (key in items ? { [key]: items[key] } : {}),
                        set: async (values) => { Object.assign(items, values); },
                        remove: async (key) => { delete items[key]; },
                    };
                };
                globalThis.chrome = { storage: { local: area(), session: area() } };
            })()
            "#,
        )
        .unwrap();
    }

    #[wasm_bindgen_test]
    async fn test_get_set_remove() {
        install_storage_stub();
        let local = ChromeStorage::local();
        let session = ChromeStorage::session();
        let ruleset = json!({"createdAt": 1000, "isDomainWide": true, "pages": ["https://example.com/a"]});

        assert_eq!(local.get("rule:example.com").await.unwrap(), None);

        local.set("rule:example.com", ruleset.clone()).await.unwrap();
        assert_eq!(local.get("rule:example.com").await.unwrap(), Some(ruleset));
        // Areas are separate
        assert_eq!(session.get("rule:example.com").await.unwrap(), None);

        local.remove("rule:example.com").await.unwrap();
        local.remove("rule:example.com").await.unwrap();
        assert_eq!(local.get("rule:example.com").await.unwrap(), None);
    }
}
