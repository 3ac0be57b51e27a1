//! Per-domain automation rules
//!
//! One [`DomainRuleset`] per registrable domain, stored under
//! `rule:<rootDomain>` in the durable store. A ruleset that ends up with no
//! domain-wide flag and no pages is deleted rather than written back.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::StorageError;
use crate::psl::DomainResolver;
use crate::storage::{get_record, set_record, KeyValueStore};
use crate::types::{DomainRuleset, RuleState, RuleType};
use crate::url::is_web_url;

/// Storage key prefix for rulesets.
pub const RULE_KEY_PREFIX: &str = "rule";

/// Storage key for a root domain.
pub fn domain_key(root_domain: &str) -> String {
    format!("{RULE_KEY_PREFIX}:{root_domain}")
}

// =============================================================================
// Clock
// =============================================================================

/// Source of ruleset creation timestamps.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock. Not available on `wasm32-unknown-unknown`; the wasm crate
/// supplies its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// =============================================================================
// Rule Manager
// =============================================================================

pub struct RuleManager<S> {
    store: S,
    resolver: Rc<DomainResolver>,
    clock: Box<dyn Clock>,
}

impl<S: KeyValueStore> RuleManager<S> {
    pub fn new(store: S, resolver: Rc<DomainResolver>, clock: Box<dyn Clock>) -> Self {
        Self { store, resolver, clock }
    }

    /// Registrable domain of `url`, if it has one.
    pub fn root_domain(&self, url: &str) -> Option<String> {
        self.resolver.root_domain(url)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        self.root_domain(url).map(|root| domain_key(&root))
    }

    async fn load(&self, key: &str) -> Result<Option<DomainRuleset>, StorageError> {
        get_record(&self.store, key).await
    }

    async fn load_or_create(&self, key: &str) -> Result<DomainRuleset, StorageError> {
        Ok(self
            .load(key)
            .await?
            .unwrap_or_else(|| DomainRuleset::new(self.clock.now_ms())))
    }

    /// Persist `ruleset`, or delete it once it carries no rule.
    async fn save(&self, key: &str, ruleset: &DomainRuleset) -> Result<(), StorageError> {
        if ruleset.is_empty() {
            log::debug!("Ruleset {key} is empty, deleting");
            self.store.remove(key).await
        } else {
            set_record(&self.store, key, ruleset).await
        }
    }

    /// Auto-activate on this exact page. No-op without a root domain.
    pub async fn add_page_rule(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_for_url(url) else {
            log::debug!("No root domain for {url}, page rule ignored");
            return Ok(());
        };

        let mut ruleset = self.load_or_create(&key).await?;
        if !ruleset.pages.iter().any(|page| page == url) {
            ruleset.pages.push(url.to_string());
        }
        self.save(&key, &ruleset).await
    }

    /// Auto-activate on the whole root domain. Existing pages are kept.
    pub async fn add_domain_rule(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_for_url(url) else {
            log::debug!("No root domain for {url}, domain rule ignored");
            return Ok(());
        };

        let mut ruleset = self.load_or_create(&key).await?;
        ruleset.is_domain_wide = true;
        self.save(&key, &ruleset).await
    }

    pub async fn remove_page_rule(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_for_url(url) else {
            return Ok(());
        };
        let Some(mut ruleset) = self.load(&key).await? else {
            return Ok(());
        };

        ruleset.pages.retain(|page| page != url);
        self.save(&key, &ruleset).await
    }

    pub async fn remove_domain_rule(&self, url: &str) -> Result<(), StorageError> {
        let Some(key) = self.key_for_url(url) else {
            return Ok(());
        };
        let Some(mut ruleset) = self.load(&key).await? else {
            return Ok(());
        };

        ruleset.is_domain_wide = false;
        self.save(&key, &ruleset).await
    }

    pub async fn add_rule(&self, rule_type: RuleType, url: &str) -> Result<(), StorageError> {
        match rule_type {
            RuleType::Page => self.add_page_rule(url).await,
            RuleType::Domain => self.add_domain_rule(url).await,
        }
    }

    pub async fn remove_rule(&self, rule_type: RuleType, url: &str) -> Result<(), StorageError> {
        match rule_type {
            RuleType::Page => self.remove_page_rule(url).await,
            RuleType::Domain => self.remove_domain_rule(url).await,
        }
    }

    /// Rules matching `url`, or None when nothing applies.
    pub async fn get_rule_state(&self, url: &str) -> Result<Option<RuleState>, StorageError> {
        if !is_web_url(url) {
            return Ok(None);
        }
        let Some(root_domain) = self.root_domain(url) else {
            return Ok(None);
        };
        let Some(ruleset) = self.load(&domain_key(&root_domain)).await? else {
            return Ok(None);
        };

        let has_page_rule = ruleset.pages.iter().any(|page| page == url);
        let has_domain_rule = ruleset.is_domain_wide;
        if !has_page_rule && !has_domain_rule {
            return Ok(None);
        }

        Ok(Some(RuleState {
            has_page_rule,
            has_domain_rule,
            root_domain,
        }))
    }
}
