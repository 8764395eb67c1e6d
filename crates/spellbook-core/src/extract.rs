//! Turn a cached detail page into a display-ready [`DetailDocument`].

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::path::PathBuf;

static FOOTNOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").expect("valid footnote regex"));

static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| selector("div.mw-parser-output > p"));
static INFOBOX_SECTIONS: Lazy<Selector> =
    Lazy::new(|| selector("aside.portable-infobox > section"));
static LABELS: Lazy<Selector> = Lazy::new(|| selector("div.pi-item"));
static VALUES: Lazy<Selector> = Lazy::new(|| selector("div.pi-data-value"));
static IMAGES: Lazy<Selector> = Lazy::new(|| selector("img"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

/// Where an image attribute can be displayed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum ImageRef {
    /// Cached copy on disk.
    Local(PathBuf),
    /// Fetch failed; reference the remote image directly.
    Remote(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Image { identity: String, image: ImageRef },
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            AttributeValue::Image { .. } => None,
        }
    }
}

/// Parsed detail page. Rebuilt on every access, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetailDocument {
    pub lead_paragraph: String,
    attributes: Vec<(String, AttributeValue)>,
}

impl DetailDocument {
    /// Attributes in document order.
    pub fn attributes(&self) -> &[(String, AttributeValue)] {
        &self.attributes
    }

    pub fn attribute(&self, label: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    // Later duplicates replace the earlier value but keep its position.
    fn insert(&mut self, label: String, value: AttributeValue) {
        match self.attributes.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((label, value)),
        }
    }
}

/// Resolves an image reference found in a document to something displayable.
pub trait ImageResolver {
    fn resolve(&self, identity: &str, url: &str) -> ImageRef;
}

/// Resolver that never touches the network or disk.
pub struct RemoteImages;

impl ImageResolver for RemoteImages {
    fn resolve(&self, _identity: &str, url: &str) -> ImageRef {
        ImageRef::Remote(crate::fetch::strip_query(url))
    }
}

/// Remove `[n]` footnote markers.
pub fn strip_footnotes(text: &str) -> String {
    FOOTNOTE.replace_all(text, "").into_owned()
}

pub fn extract(raw: &[u8], images: &impl ImageResolver) -> DetailDocument {
    let html = Html::parse_document(&String::from_utf8_lossy(raw));

    let mut doc = DetailDocument {
        lead_paragraph: lead_paragraph(&html),
        ..Default::default()
    };

    for section in html.select(&INFOBOX_SECTIONS) {
        let labels: Vec<String> = section.select(&LABELS).map(label_text).collect();
        let values: Vec<ElementRef> = section.select(&VALUES).collect();

        if labels.len() != values.len() {
            log::warn!(
                "Malformed infobox section: {} labels but {} values; pairing the first {}",
                labels.len(),
                values.len(),
                labels.len().min(values.len())
            );
        }

        for (label, value) in labels.into_iter().zip(values) {
            doc.insert(label, attribute_value(value, images));
        }
    }

    doc
}

// The first paragraph of these pages is usually a short stub line, so the
// second one is preferred when present.
fn lead_paragraph(html: &Html) -> String {
    let paragraphs: Vec<ElementRef> = html.select(&PARAGRAPHS).collect();
    let chosen = match paragraphs.as_slice() {
        [] => {
            log::debug!("Detail page has no body paragraphs");
            return String::new();
        }
        [only] => only,
        [_, second, ..] => second,
    };
    let text: String = chosen.text().collect();
    strip_footnotes(&text).trim().to_string()
}

fn label_text(node: ElementRef) -> String {
    let text: String = node.text().collect();
    let text = strip_footnotes(text.trim());
    match text.split_once('\n') {
        Some((first, _)) => first.trim_end().to_string(),
        None => text,
    }
}

fn attribute_value(node: ElementRef, images: &impl ImageResolver) -> AttributeValue {
    if let Some(img) = node.select(&IMAGES).next() {
        let attrs = img.value();
        let src = match (attrs.attr("src"), attrs.attr("data-src")) {
            (Some(src), Some(lazy)) if src.starts_with("data:") => lazy,
            (Some(src), _) => src,
            (None, Some(lazy)) => lazy,
            (None, None) => "",
        };
        if !src.is_empty() {
            let url = crate::fetch::strip_query(src);
            let identity = attrs
                .attr("data-image-name")
                .map(str::to_string)
                .unwrap_or_else(|| image_name_from_url(&url));
            let image = images.resolve(&identity, &url);
            return AttributeValue::Image { identity, image };
        }
    }

    let text: String = node.text().collect();
    AttributeValue::Text(strip_footnotes(&text).trim().to_string())
}

// Wikia serves images as `.../File.gif/revision/latest`; skip that suffix.
fn image_name_from_url(url: &str) -> String {
    let path = url.split("/revision/").next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("image")
        .to_string()
}
