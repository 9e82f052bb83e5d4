use scraper::{Html, Node, Selector};
use serde_json::Value;
use url::Url;

use crate::Result;
use crate::extraction::text::collapse_whitespace;
use crate::utils::error::AppError;

/// Everything one fetch produced, parsed once and shared read-only by every
/// strategy. Built and consumed synchronously: `Html` is not `Send`, so a
/// context must never be held across an await point.
pub struct ExtractionContext {
    pub document: Html,
    pub raw_markup: String,
    pub blobs: Vec<Value>,
    pub url: Url,
    visible_text: String,
    blob_notes: Vec<String>,
}

impl ExtractionContext {
    pub fn from_markup(url: &str, markup: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| AppError::Parse {
            message: format!("invalid page url {url}: {e}"),
        })?;
        let document = Html::parse_document(markup);
        let (blobs, blob_notes) = collect_blobs(&document);
        let visible_text = visible_text(&document);
        Ok(Self {
            document,
            raw_markup: markup.to_string(),
            blobs,
            url,
            visible_text,
            blob_notes,
        })
    }

    /// Text a shopper would see: all text nodes outside script/style trees,
    /// whitespace collapsed.
    pub fn visible_text(&self) -> &str {
        &self.visible_text
    }

    /// Diagnostics from blob collection (e.g. malformed JSON scripts).
    pub fn notes(&self) -> &[String] {
        &self.blob_notes
    }

    /// Resolves a possibly relative href against the page URL.
    pub fn resolve_url(&self, href: &str) -> Option<String> {
        self.url.join(href.trim()).ok().map(|u| u.to_string())
    }
}

fn collect_blobs(document: &Html) -> (Vec<Value>, Vec<String>) {
    let mut blobs = Vec::new();
    let mut notes = Vec::new();
    let selector = Selector::parse(
        "script[type=\"application/ld+json\"], script[type=\"application/json\"], script#__NEXT_DATA__",
    )
    .unwrap();

    for (index, element) in document.select(&selector).enumerate() {
        let raw: String = element.text().collect();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => blobs.push(value),
            Err(e) => notes.push(format!("embedded data blob {index} unparseable: {e}")),
        }
    }
    (blobs, notes)
}

fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    append_text(document.tree.root(), &mut out);
    collapse_whitespace(&out)
}

fn append_text(node: ego_tree::NodeRef<Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push(' ');
                out.push_str(text);
            }
            Node::Element(element) => {
                if !matches!(element.name(), "script" | "style" | "noscript" | "template") {
                    append_text(child, out);
                }
            }
            _ => {}
        }
    }
}
