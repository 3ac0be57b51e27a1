//! WebAssembly bindings for Caffeine
//!
//! Exposes two classes to the extension's JavaScript entrypoints:
//! `Background` for the service worker and `Content` for injected pages.

mod background;
mod chrome;
mod content;
mod host;
mod storage;

use caf_core::permission::{domain_origin_permission, GLOBAL_ORIGIN_PERMISSION};
use caf_core::{DomainResolver, ExtensionConfig};
use wasm_bindgen::prelude::*;

pub use background::Background;
pub use content::Content;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    // Filtering happens through `log::set_max_level`, see `apply_log_level`
    wasm_logger::init(wasm_logger::Config::new(log::Level::Trace));
    log::set_max_level(log::LevelFilter::Info);
}

/// Config from a JS object; `undefined`, `null` or invalid input yields defaults.
pub(crate) fn parse_config(value: JsValue) -> ExtensionConfig {
    if value.is_undefined() || value.is_null() {
        return ExtensionConfig::default();
    }
    serde_wasm_bindgen::from_value(value).unwrap_or_else(|e| {
        log::warn!("Invalid extension config, using defaults: {e}");
        ExtensionConfig::default()
    })
}

pub(crate) fn apply_log_level(config: &ExtensionConfig) {
    log::set_max_level(config.level().to_level_filter());
}

/// Registrable domain of `url` using the built-in heuristic.
#[wasm_bindgen]
pub fn root_domain(url: &str) -> Option<String> {
    DomainResolver::new().root_domain(url)
}

/// Host permission pattern covering `root` and all its subdomains.
#[wasm_bindgen(js_name = domainOriginPermission)]
pub fn domain_origin_permission_js(root: &str) -> String {
    domain_origin_permission(root)
}

#[wasm_bindgen(js_name = globalOriginPermission)]
pub fn global_origin_permission() -> String {
    GLOBAL_ORIGIN_PERMISSION.to_string()
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_root_domain_export() {
        assert_eq!(root_domain("https://news.example.co.uk/a").as_deref(), Some("example.co.uk"));
        assert_eq!(root_domain("http://192.168.1.1/"), None);
        assert_eq!(root_domain("not a url"), None);
    }

    #[wasm_bindgen_test]
    fn test_permission_exports() {
        assert_eq!(domain_origin_permission_js("example.com"), "*://*.example.com/*");
        assert_eq!(global_origin_permission(), "*://*/*");
    }

    #[wasm_bindgen_test]
    fn test_parse_config() {
        assert_eq!(parse_config(JsValue::UNDEFINED), ExtensionConfig::default());

        let raw = js_sys::JSON::parse(r#"{"logLevel": "debug"}"#).unwrap();
        let config = parse_config(raw);
        assert_eq!(config.level(), log::Level::Debug);
        assert_eq!(config.content_script_file, "/contents.js");

        let invalid = js_sys::JSON::parse(r#"{"logLevel": 3}"#).unwrap();
        assert_eq!(parse_config(invalid), ExtensionConfig::default());
    }
}
