//! Host permission origin patterns.

/// Pattern covering every site.
pub const GLOBAL_ORIGIN_PERMISSION: &str = "*://*/*";

/// Pattern scoped to one root domain and all of its subdomains.
pub fn domain_origin_permission(root_domain: &str) -> String {
    format!("*://*.{root_domain}/*")
}
