//! Stock extraction: structured data, then DOM signals, then text phrases.
//!
//! Every shell carries the deciding strategy, a confidence score, a
//! machine-checkable reason and the evidence that produced it. Evidence is
//! scrubbed of secret-like tokens here, at the engine boundary, so no
//! strategy can leak a header or cookie into logs or storage.

pub mod dom;
pub mod heuristic;
pub mod structured;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::extraction::context::ExtractionContext;
use crate::extraction::strategy::{ExtractionStrategy, StrategyRun, first_match};
use crate::models::StockStatus;

/// Quantities at or below this read as low stock rather than in stock.
pub(crate) const LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    SchemaAvailability,
    AvailabilityField,
    AddToCartPresent,
    PurchaseControlDisabled,
    ExplicitStockText,
    QuantityRemaining,
    PreorderText,
    UnrecognizedText,
}

impl StockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockReason::SchemaAvailability => "schema_availability",
            StockReason::AvailabilityField => "availability_field",
            StockReason::AddToCartPresent => "add_to_cart_present",
            StockReason::PurchaseControlDisabled => "purchase_control_disabled",
            StockReason::ExplicitStockText => "explicit_stock_text",
            StockReason::QuantityRemaining => "quantity_remaining",
            StockReason::PreorderText => "preorder_text",
            StockReason::UnrecognizedText => "unrecognized_text",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StockShell {
    pub status: StockStatus,
    pub quantity: Option<i64>,
    pub strategy: &'static str,
    pub confidence: u8,
    pub reason: StockReason,
    pub evidence: Vec<String>,
    pub raw_status: Option<String>,
}

pub struct StockEngine {
    strategies: Vec<Box<dyn ExtractionStrategy<Output = StockShell>>>,
}

impl StockEngine {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(structured::StructuredDataStock::new(config.max_blob_depth)),
                Box::new(dom::DomStock::new()),
                Box::new(heuristic::HeuristicStock::new()),
            ],
        }
    }

    pub fn extract(&self, ctx: &ExtractionContext) -> StrategyRun<StockShell> {
        let mut run = first_match(&self.strategies, ctx);
        if let Some(shell) = &mut run.result {
            scrub_evidence(&mut shell.evidence);
            shell.confidence = shell.confidence.min(100);
        }
        run
    }
}

pub(crate) struct StatusClassification {
    pub status: StockStatus,
    pub quantity: Option<i64>,
    pub reason: StockReason,
}

// Order matters below: low-stock phrases are checked before out-of-stock so
// "almost sold out" reads as low, and out-of-stock before in-stock so
// "currently unavailable" never matches on "available".
pub(crate) const LOW_PHRASES: &[&str] = &[
    "low stock", "low in stock", "only a few left", "few left", "almost gone", "limited stock",
    "limited availability", "last one", "last few", "selling fast", "almost sold out",
];

pub(crate) const OUT_PHRASES: &[&str] = &[
    "out of stock", "out-of-stock", "outofstock", "sold out", "sold-out", "soldout",
    "currently unavailable", "temporarily unavailable", "unavailable", "no longer available",
    "notify me when", "email when available", "back in stock soon",
];

pub(crate) const PREORDER_PHRASES: &[&str] = &[
    "pre-order", "preorder", "pre order", "back-order", "backorder", "back order",
    "backordered", "coming soon",
];

pub(crate) const IN_PHRASES: &[&str] = &[
    "in stock", "instock", "in-stock", "add to cart", "add to bag", "add to basket", "buy now",
    "ready to ship", "ships today", "ships within", "order now", "available",
];

fn quantity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bonly\s+(\d{1,4})\s+left\b|\b(\d{1,4})\s+(?:left in stock|left|remaining|in stock|available)\b")
            .unwrap()
    })
}

pub(crate) fn status_from_quantity(quantity: i64) -> StockStatus {
    if quantity <= 0 {
        StockStatus::OutOfStock
    } else if quantity <= LOW_STOCK_THRESHOLD {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// Maps availability text to a status: schema.org URIs first, then a
/// remaining-quantity pattern, then the phrase tables. `None` means the text
/// carries no stock signal at all.
pub(crate) fn classify_status_text(text: &str) -> Option<StatusClassification> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    if let Some(pos) = lowered.find("schema.org/") {
        let suffix = lowered[pos..]
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        let status = match suffix {
            "instock" | "instoreonly" | "onlineonly" => StockStatus::InStock,
            "outofstock" | "soldout" | "discontinued" => StockStatus::OutOfStock,
            "preorder" | "presale" | "backorder" => StockStatus::Preorder,
            "limitedavailability" => StockStatus::LowStock,
            _ => StockStatus::Unknown,
        };
        return Some(StatusClassification {
            status,
            quantity: None,
            reason: StockReason::SchemaAvailability,
        });
    }

    if let Some(caps) = quantity_re().captures(&lowered) {
        let quantity = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<i64>().ok());
        if let Some(quantity) = quantity {
            return Some(StatusClassification {
                status: status_from_quantity(quantity),
                quantity: Some(quantity),
                reason: StockReason::QuantityRemaining,
            });
        }
    }

    for (phrases, status, reason) in [
        (LOW_PHRASES, StockStatus::LowStock, StockReason::ExplicitStockText),
        (OUT_PHRASES, StockStatus::OutOfStock, StockReason::ExplicitStockText),
        (PREORDER_PHRASES, StockStatus::Preorder, StockReason::PreorderText),
        (IN_PHRASES, StockStatus::InStock, StockReason::ExplicitStockText),
    ] {
        if phrases.iter().any(|p| lowered.contains(p)) {
            return Some(StatusClassification {
                status,
                quantity: None,
                reason,
            });
        }
    }

    None
}

fn secret_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)bearer\s+[a-z0-9._~+/=-]{8,}|(?:api[_-]?key|access[_-]?token|auth[_-]?token|session[_-]?(?:id|token)|sessionid|csrf[_-]?token|x-api-key|authorization|password|secret|token)\s*[=:]\s*"?[a-z0-9._~+/=-]{6,}"?|(?:cookie|set-cookie)\s*[:=]\s*[^;"']{6,}"#,
        )
        .unwrap()
    })
}

/// Replaces secret-like spans in evidence snippets. Runs once per shell at
/// the engine boundary.
pub(crate) fn scrub_evidence(evidence: &mut Vec<String>) {
    for snippet in evidence.iter_mut() {
        if secret_re().is_match(snippet) {
            *snippet = secret_re().replace_all(snippet, "[redacted]").into_owned();
        }
    }
}
