//! HTML extractors for catalog pages
//!
//! This module turns raw catalog documents into the values the harvester
//! needs:
//! - The metadata mapping of an item page (tags, page count, upload time)
//! - The direct image URL on a page viewer
//! - The identifier of the newest item on the latest-uploads search page
//!
//! `scraper::Html` is not `Send`, so every document is parsed and dropped
//! inside one synchronous call.

use crate::storage::{ItemMetadata, PAGES_KEY, SCRAPED_AT_KEY, URL_KEY};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};

/// Extracts the metadata mapping from an item page
///
/// # Extraction Rules
///
/// Each `section#tags div.tag-container` holds one field. The field name is
/// the container text before the first `:`, lowercased; containers without
/// a name are skipped. Inside every `span.tags` of the container:
///
/// - `span.name` with matching `span.count` → list of `{name, count}`
/// - `span.name` only → scalar (an integer for `pages`)
/// - `<time datetime>` → `datetime_iso8601` and `time_relative`
///
/// The result always holds `url`, `datetime_scraped_at` (UTC, RFC 3339) and
/// `pages` (`null` until a page count is found).
///
/// # Example
///
/// ```
/// use kura_harvest::harvester::parse_tags;
///
/// let html = r#"<section id="tags">
///   <div class="tag-container">Pages: <span class="tags"><span class="name">3</span></span></div>
/// </section>"#;
/// let meta = parse_tags(html.as_bytes(), "https://catalog.example.net/g/42/");
/// assert_eq!(meta.pages(), Some(3));
/// ```
pub fn parse_tags(content: &[u8], url: &str) -> ItemMetadata {
    let mut metadata = ItemMetadata::new();
    metadata.insert(PAGES_KEY, Value::Null);
    metadata.insert(URL_KEY, url);
    metadata.insert(SCRAPED_AT_KEY, chrono::Utc::now().to_rfc3339());

    let html = String::from_utf8_lossy(content);
    let document = Html::parse_document(&html);

    let (Some(section_sel), Some(container_sel)) = (
        selector("section#tags"),
        selector("div.tag-container"),
    ) else {
        return metadata;
    };

    let Some(section) = document.select(&section_sel).next() else {
        return metadata;
    };

    for container in section.select(&container_sel) {
        let field_text: String = container.text().map(str::trim).collect();
        let Some(field_name) = field_text
            .split_once(':')
            .map(|(name, _)| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
        else {
            tracing::debug!("Failed to parse tag field name for field text: {}", field_text);
            continue;
        };

        extract_field(container, &field_name, &mut metadata);
    }

    metadata
}

fn extract_field(container: ElementRef<'_>, field_name: &str, metadata: &mut ItemMetadata) {
    let (Some(tags_sel), Some(name_sel), Some(count_sel), Some(time_sel)) = (
        selector("span.tags"),
        selector("span.name"),
        selector("span.count"),
        selector("time"),
    ) else {
        return;
    };

    for tag in container.select(&tags_sel) {
        let names: Vec<String> = tag.select(&name_sel).map(element_text).collect();
        let counts: Vec<String> = tag.select(&count_sel).map(element_text).collect();

        if !names.is_empty() && !counts.is_empty() {
            let entries: Vec<Value> = names
                .iter()
                .zip(&counts)
                .map(|(name, count)| json!({ "name": name, "count": count }))
                .collect();
            metadata.insert(field_name, entries);
        } else if let Some(name) = names.last() {
            if field_name == PAGES_KEY {
                match name.parse::<u64>() {
                    Ok(pages) => metadata.insert(field_name, pages),
                    Err(_) => tracing::debug!("Unparseable page count: {:?}", name),
                }
            } else {
                metadata.insert(field_name, name.as_str());
            }
        }

        if let Some(time) = tag.select(&time_sel).next() {
            let datetime = time.value().attr("datetime").map(str::to_string);
            metadata.insert("datetime_iso8601", datetime);
            metadata.insert("time_relative", element_text(time));
        }
    }
}

/// Extracts the direct image URL from a page viewer
///
/// Returns the `src` of `#image-container img`, if any.
pub fn parse_image_link(content: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(content);
    let document = Html::parse_document(&html);
    let img_selector = selector("#image-container img[src]")?;

    document
        .select(&img_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

/// Extracts the newest item identifier from the latest-uploads search page
///
/// Reads the first `.gallery a[href]`, whose href has the form `/g/<id>/`.
pub fn parse_highest_id(content: &[u8]) -> Option<u64> {
    let html = String::from_utf8_lossy(content);
    let document = Html::parse_document(&html);
    let link_selector = selector(".gallery a[href]")?;

    let href = document
        .select(&link_selector)
        .next()?
        .value()
        .attr("href")?;

    id_from_item_href(href)
}

fn id_from_item_href(href: &str) -> Option<u64> {
    let path = href.split(['?', '#']).next()?;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    segments
        .windows(2)
        .find(|pair| pair[0] == "g")
        .and_then(|pair| pair[1].parse().ok())
        .filter(|id| *id > 0)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}
