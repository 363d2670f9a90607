//! Known-platform fingerprints and their API endpoint templates.
//!
//! Fingerprint strength is the fraction of a platform's markers found in the
//! page: >= 0.7 is a high-confidence match, >= 0.4 medium, anything below is
//! no match.

use url::Url;

use crate::types::endpoint::Confidence;

/// E-commerce / CMS platforms we carry fingerprints for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Shopify,
    WooCommerce,
    Magento,
    BigCommerce,
    WordPress,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::WooCommerce => "woocommerce",
            Platform::Magento => "magento",
            Platform::BigCommerce => "bigcommerce",
            Platform::WordPress => "wordpress",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page signals that identify one platform, plus its endpoint templates.
pub struct Fingerprint {
    pub platform: Platform,
    meta_tag: Option<&'static str>,
    script_src: Option<&'static str>,
    html_markers: &'static [&'static str],
    /// Root-relative listing endpoints this platform conventionally exposes
    pub endpoint_templates: &'static [&'static str],
}

/// Generic listing endpoints probed for every platform, known or not.
pub const GENERIC_ENDPOINTS: &[&str] = &[
    "/api/products",
    "/api/v1/products",
    "/api/v2/products",
    "/products.json",
];

const FINGERPRINTS: &[Fingerprint] = &[
    Fingerprint {
        platform: Platform::Shopify,
        meta_tag: Some("shopify"),
        script_src: Some("cdn.shopify.com"),
        html_markers: &["shopify.theme", "shopify-section"],
        endpoint_templates: &["/products.json", "/collections/all/products.json"],
    },
    Fingerprint {
        platform: Platform::WooCommerce,
        meta_tag: Some("woocommerce"),
        script_src: Some("woocommerce"),
        html_markers: &["woocommerce-page", "wc-block"],
        endpoint_templates: &["/wp-json/wc/store/products", "/wp-json/wc/store/v1/products"],
    },
    Fingerprint {
        platform: Platform::Magento,
        meta_tag: None,
        script_src: Some("mage/"),
        html_markers: &["data-mage-init", "magento_theme"],
        endpoint_templates: &["/rest/V1/products", "/graphql"],
    },
    Fingerprint {
        platform: Platform::BigCommerce,
        meta_tag: Some("bigcommerce"),
        script_src: Some("cdn11.bigcommerce.com"),
        html_markers: &["data-stencil", "bigcommerce"],
        endpoint_templates: &["/api/storefront/products"],
    },
    Fingerprint {
        platform: Platform::WordPress,
        meta_tag: Some("wordpress"),
        script_src: Some("wp-content"),
        html_markers: &["wp-json", "wp-includes"],
        endpoint_templates: &["/wp-json/wp/v2/posts"],
    },
];

/// One fingerprint match, ranked by strength.
#[derive(Debug, Clone)]
pub struct PlatformMatch {
    pub platform: Platform,
    /// Fraction of the platform's markers found, 0.0 to 1.0
    pub strength: f64,
    pub confidence: Confidence,
}

/// Match page markup against every fingerprint, strongest first.
///
/// Only matches at or above medium strength (0.4) are returned.
pub fn detect_platforms(html: &str) -> Vec<PlatformMatch> {
    let html_lower = html.to_lowercase();
    let mut matches: Vec<PlatformMatch> = FINGERPRINTS
        .iter()
        .filter_map(|fp| {
            let (found, total) = marker_counts(fp, &html_lower);
            if total == 0 {
                return None;
            }
            let strength = found as f64 / total as f64;
            let confidence = if strength >= 0.7 {
                Confidence::High
            } else if strength >= 0.4 {
                Confidence::Medium
            } else {
                return None;
            };
            Some(PlatformMatch {
                platform: fp.platform,
                strength,
                confidence,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

fn marker_counts(fp: &Fingerprint, html_lower: &str) -> (usize, usize) {
    let mut found = 0;
    let mut total = 0;

    if let Some(meta) = fp.meta_tag {
        total += 1;
        if html_lower.contains(meta) {
            found += 1;
        }
    }
    if let Some(src) = fp.script_src {
        total += 1;
        if html_lower.contains(src) {
            found += 1;
        }
    }
    for marker in fp.html_markers {
        total += 1;
        if html_lower.contains(marker) {
            found += 1;
        }
    }

    (found, total)
}

/// Endpoint templates for a platform.
pub fn endpoint_templates(platform: Platform) -> &'static [&'static str] {
    FINGERPRINTS
        .iter()
        .find(|fp| fp.platform == platform)
        .map(|fp| fp.endpoint_templates)
        .unwrap_or(&[])
}

/// Mine endpoint-looking URL literals out of inline script bodies.
///
/// Anything quoted inside a `<script>` element that contains `/api/` or ends
/// in `.json` is a candidate; relative paths resolve against the base URL.
pub fn mine_script_endpoints(html: &str, base: &Url, cap: usize) -> Vec<String> {
    let script_re = regex::Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap();
    let literal_re = regex::Regex::new(r#"["']([^"'\s]{2,200})["']"#).unwrap();

    let mut mined = Vec::new();
    for script in script_re.captures_iter(html) {
        let body = match script.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };
        for cap_match in literal_re.captures_iter(body) {
            let literal = &cap_match[1];
            if !looks_like_endpoint(literal) {
                continue;
            }
            let resolved = if literal.starts_with("http://") || literal.starts_with("https://") {
                literal.to_string()
            } else if literal.starts_with('/') {
                match base.join(literal) {
                    Ok(u) => u.to_string(),
                    Err(_) => continue,
                }
            } else {
                continue;
            };
            if !mined.contains(&resolved) {
                mined.push(resolved);
            }
            if mined.len() >= cap {
                return mined;
            }
        }
    }
    mined
}

fn looks_like_endpoint(literal: &str) -> bool {
    let path = literal.split('?').next().unwrap_or(literal);
    literal.contains("/api/") || path.ends_with(".json")
}
