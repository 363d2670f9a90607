//! Turning raw records into [`Item`]s: JSON field mapping, price text
//! parsing, and bot-defense marker detection.

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use scout::browser::RawItem;

use crate::types::item::{Item, Price};

/// Body markers that identify active bot defense.
const CAPTCHA_MARKERS: &[&str] = &[
    "captcha",
    "cf-challenge",
    "__cf_chl",
    "are you a robot",
    "access denied",
];

/// Scan a fetched body for bot-defense markers.
pub fn detect_captcha(body: &str) -> bool {
    let lower = body.to_lowercase();
    CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Map one JSON record to an item.
///
/// Field layout varies per platform, so every known spelling is tried:
/// `title`/`name`, `price` as number, string, or object, Shopify-style
/// `variants`, `images` as strings or objects, `url`/`link`/`permalink` or a
/// Shopify `handle`.
pub fn record_to_item(record: &Value, base: &Url, scraped_at: DateTime<Utc>) -> Result<Item, String> {
    let obj = record.as_object().ok_or("record is not an object")?;

    let title = obj
        .get("title")
        .or_else(|| obj.get("name"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing title")?;

    let url = item_url(obj, base).ok_or("missing url")?;

    let mut item = Item::new(title, url, scraped_at);

    if let Some(id) = obj.get("id") {
        match id {
            Value::String(s) if !s.is_empty() => item = item.with_id(s.clone()),
            Value::Number(n) => item = item.with_id(n.to_string()),
            _ => {}
        }
    }

    if let Some(price) = item_price(obj) {
        item = item.with_price(price);
    }

    for image in item_images(obj, base) {
        item = item.with_image(image);
    }

    if let Some(description) = obj
        .get("description")
        .or_else(|| obj.get("body_html"))
        .and_then(|v| v.as_str())
    {
        let text = strip_tags(description);
        if !text.is_empty() {
            item = item.with_description(text);
        }
    }

    Ok(item)
}

/// Map one rendered-page record to an item.
pub fn raw_to_item(raw: &RawItem, base: &Url, scraped_at: DateTime<Utc>) -> Result<Item, String> {
    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing title")?;

    let url = match &raw.url {
        Some(href) => resolve(base, href).ok_or("unresolvable url")?,
        None => base.to_string(),
    };

    let mut item = Item::new(title, url, scraped_at);

    if let Some(id) = &raw.id {
        item = item.with_id(id.clone());
    }
    if let Some(text) = &raw.price_text {
        if let Some(price) = parse_price(text) {
            item = item.with_price(price);
        }
    }
    for image in &raw.image_urls {
        if let Some(resolved) = resolve(base, image) {
            item = item.with_image(resolved);
        }
    }
    if let Some(description) = &raw.description {
        let text = strip_tags(description);
        if !text.is_empty() {
            item = item.with_description(text);
        }
    }

    Ok(item)
}

fn item_url(obj: &serde_json::Map<String, Value>, base: &Url) -> Option<String> {
    for key in ["url", "link", "permalink"] {
        if let Some(href) = obj.get(key).and_then(|v| v.as_str()) {
            if let Some(resolved) = resolve(base, href) {
                return Some(resolved);
            }
        }
    }
    // Shopify exposes a handle instead of a URL.
    if let Some(handle) = obj.get("handle").and_then(|v| v.as_str()) {
        return resolve(base, &format!("/products/{handle}"));
    }
    None
}

fn item_price(obj: &serde_json::Map<String, Value>) -> Option<Price> {
    let currency = obj
        .get("currency")
        .or_else(|| obj.get("price_currency"))
        .and_then(|v| v.as_str())
        .unwrap_or("USD")
        .to_string();

    let direct = obj.get("price").or_else(|| {
        // Shopify puts prices on variants.
        obj.get("variants")
            .and_then(|v| v.as_array())
            .and_then(|variants| variants.first())
            .and_then(|variant| variant.get("price"))
    })?;

    match direct {
        Value::Number(n) => {
            let amount = n.as_f64()?;
            (amount > 0.0).then(|| Price::new(amount, currency))
        }
        Value::String(s) => parse_price(s).map(|p| {
            if obj.contains_key("currency") || obj.contains_key("price_currency") {
                Price::new(p.amount, currency).with_display_text(s.clone())
            } else {
                p
            }
        }),
        Value::Object(map) => {
            let amount = map.get("amount").and_then(|v| v.as_f64())?;
            let currency = map
                .get("currency")
                .and_then(|v| v.as_str())
                .unwrap_or(&currency)
                .to_string();
            (amount > 0.0).then(|| Price::new(amount, currency))
        }
        _ => None,
    }
}

fn item_images(obj: &serde_json::Map<String, Value>, base: &Url) -> Vec<String> {
    let candidates: Vec<&Value> = match obj.get("images").and_then(|v| v.as_array()) {
        Some(images) => images.iter().collect(),
        None => obj
            .get("image")
            .or_else(|| obj.get("image_url"))
            .map(|v| vec![v])
            .unwrap_or_default(),
    };

    candidates
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => resolve(base, s),
            Value::Object(map) => map
                .get("src")
                .or_else(|| map.get("url"))
                .and_then(|v| v.as_str())
                .and_then(|s| resolve(base, s)),
            _ => None,
        })
        .collect()
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(trimmed.to_string());
    }
    base.join(trimmed).ok().map(|u| u.to_string())
}

/// Extract a numeric price from display text.
///
/// Currency defaults from the symbol when one is present, USD otherwise.
/// Zero and negative amounts are treated as missing.
pub fn parse_price(text: &str) -> Option<Price> {
    let number_re = regex::Regex::new(r"[\d,]+\.?\d*").unwrap();
    let matched = number_re.find(text)?;
    let amount: f64 = matched.as_str().replace(',', "").parse().ok()?;
    if amount <= 0.0 {
        return None;
    }

    let currency = if text.contains('€') {
        "EUR"
    } else if text.contains('£') {
        "GBP"
    } else {
        "USD"
    };

    Some(Price::new(amount, currency).with_display_text(text.trim()))
}

/// Drop markup and collapse whitespace.
pub fn strip_tags(html: &str) -> String {
    let tag_re = regex::Regex::new(r"<[^>]+>").unwrap();
    let text = tag_re.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Slug a source host into the artifact name prefix.
pub fn source_slug(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "source".to_string());
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    let slug: String = host
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "source".to_string()
    } else {
        slug
    }
}
