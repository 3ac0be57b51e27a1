//! Root-domain (eTLD+1) resolution
//!
//! Uses the Public Suffix List when one has been loaded and falls back to a
//! small built-in heuristic otherwise.
//!
//! # Examples
//!
//! ```
//! use caf_core::psl::DomainResolver;
//!
//! let resolver = DomainResolver::new();
//! assert_eq!(resolver.root_domain("https://sub.example.com/a").as_deref(), Some("example.com"));
//! assert_eq!(resolver.root_domain("https://sub.example.co.uk/").as_deref(), Some("example.co.uk"));
//! assert_eq!(resolver.root_domain("http://localhost:3000/"), None);
//! ```

use std::cell::RefCell;

use publicsuffix::{List, Psl};

use crate::url::{extract_hostname, is_ip_literal};

/// PSL text could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Invalid public suffix list: {0}")]
pub struct PslError(String);

// =============================================================================
// Resolver
// =============================================================================

/// Resolves URLs to their registrable domain.
#[derive(Default)]
pub struct DomainResolver {
    list: RefCell<Option<List>>,
}

impl DomainResolver {
    /// Resolver without a suffix list (heuristic only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver backed by the given PSL text.
    pub fn with_list(psl_text: &str) -> Result<Self, PslError> {
        let resolver = Self::new();
        resolver.load_list(psl_text)?;
        Ok(resolver)
    }

    /// Replace the suffix list. On error the previous state is kept.
    pub fn load_list(&self, psl_text: &str) -> Result<(), PslError> {
        let list: List = psl_text.parse().map_err(|e| PslError(format!("{e}")))?;
        *self.list.borrow_mut() = Some(list);
        log::info!("Public suffix list loaded");
        Ok(())
    }

    pub fn has_list(&self) -> bool {
        self.list.borrow().is_some()
    }

    /// Registrable domain of a URL.
    ///
    /// None for malformed URLs, IP literals, single-label hosts and hosts
    /// that are a public suffix themselves.
    pub fn root_domain(&self, url: &str) -> Option<String> {
        let host = extract_hostname(url)?;
        self.root_domain_of_host(&host)
    }

    /// Registrable domain of an already normalized hostname.
    pub fn root_domain_of_host(&self, host: &str) -> Option<String> {
        if is_ip_literal(host) {
            return None;
        }

        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return None;
        }

        if let Some(ref list) = *self.list.borrow() {
            if let Some(domain) = list.domain(host.as_bytes()) {
                return std::str::from_utf8(domain.as_bytes()).ok().map(str::to_string);
            }
            // The whole host is a listed suffix, nothing registrable left
            if let Some(suffix) = list.suffix(host.as_bytes()) {
                if suffix.is_known() && suffix.as_bytes().len() == host.len() {
                    return None;
                }
            }
        }

        fallback_root_domain(&labels)
    }
}

// =============================================================================
// Fallback
// =============================================================================

/// Common two-part suffixes for the heuristic path.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Fallback eTLD+1 heuristic.
fn fallback_root_domain(labels: &[&str]) -> Option<String> {
    let n = labels.len();
    if n < 2 {
        return None;
    }

    let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        if n == 2 {
            return None;
        }
        return Some(labels[n - 3..].join("."));
    }

    Some(last_two)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const TEST_PSL: &str = "\
// ===BEGIN ICANN DOMAINS===
com
org
uk
co.uk
jp
*.kawasaki.jp
!city.kawasaki.jp
// ===END ICANN DOMAINS===
// ===BEGIN PRIVATE DOMAINS===
github.io
// ===END PRIVATE DOMAINS===
";

    #[test]
    fn test_fallback_simple() {
        assert_eq!(fallback_root_domain(&["example", "com"]).as_deref(), Some("example.com"));
        assert_eq!(fallback_root_domain(&["sub", "example", "com"]).as_deref(), Some("example.com"));
    }

    #[test]
    fn test_fallback_two_part() {
        assert_eq!(
            fallback_root_domain(&["sub", "example", "co", "uk"]).as_deref(),
            Some("example.co.uk")
        );
        assert_eq!(fallback_root_domain(&["co", "uk"]), None);
    }

    #[test]
    fn test_list_collapses_subdomains() {
        let resolver = DomainResolver::with_list(TEST_PSL).unwrap();
        assert!(resolver.has_list());
        assert_eq!(resolver.root_domain("https://sub.example.com/x").as_deref(), Some("example.com"));
        assert_eq!(resolver.root_domain("https://a.b.site.co.uk/").as_deref(), Some("site.co.uk"));
        assert_eq!(resolver.root_domain("https://site.co.uk").as_deref(), Some("site.co.uk"));
    }

    #[test]
    fn test_list_private_and_wildcard_rules() {
        let resolver = DomainResolver::with_list(TEST_PSL).unwrap();
        assert_eq!(
            resolver.root_domain("https://user.github.io/repo").as_deref(),
            Some("user.github.io")
        );
        assert_eq!(
            resolver.root_domain("https://www.foo.kawasaki.jp/").as_deref(),
            Some("www.foo.kawasaki.jp")
        );
        assert_eq!(
            resolver.root_domain("https://www.city.kawasaki.jp/").as_deref(),
            Some("city.kawasaki.jp")
        );
    }

    #[test]
    fn test_unresolvable_hosts() {
        let resolver = DomainResolver::with_list(TEST_PSL).unwrap();
        assert_eq!(resolver.root_domain("http://localhost:3000/"), None);
        assert_eq!(resolver.root_domain("http://127.0.0.1/"), None);
        assert_eq!(resolver.root_domain("http://[::1]/"), None);
        assert_eq!(resolver.root_domain("https://co.uk/"), None);
        assert_eq!(resolver.root_domain("not a url"), None);
    }

    #[test]
    fn test_heuristic_without_list() {
        let resolver = DomainResolver::new();
        assert!(!resolver.has_list());
        assert_eq!(resolver.root_domain("https://a.example.org").as_deref(), Some("example.org"));
    }
}
