//! Extension configuration
//!
//! Passed from the JavaScript entrypoint as a plain object. Every field has
//! a default, so an empty object (or none at all) is a valid config.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTENT_SCRIPT: &str = "/contents.js";
pub const DEFAULT_PSL_PATH: &str = "/public_suffix_list.dat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionConfig {
    /// Content script injected to hold the wake lock
    pub content_script_file: String,
    /// Extension-relative path of the bundled Public Suffix List
    pub public_suffix_list_path: String,
    /// `log` level filter name (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            content_script_file: DEFAULT_CONTENT_SCRIPT.to_string(),
            public_suffix_list_path: DEFAULT_PSL_PATH.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ExtensionConfig {
    /// Parsed log level; unknown names fall back to `Info`.
    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ExtensionConfig = serde_json::from_str(r#"{"logLevel": "debug"}"#).unwrap();
        assert_eq!(config.content_script_file, DEFAULT_CONTENT_SCRIPT);
        assert_eq!(config.public_suffix_list_path, DEFAULT_PSL_PATH);
        assert_eq!(config.level(), log::Level::Debug);
    }

    #[test]
    fn test_unknown_level() {
        let config = ExtensionConfig {
            log_level: "chatty".to_string(),
            ..ExtensionConfig::default()
        };
        assert_eq!(config.level(), log::Level::Info);
    }
}
