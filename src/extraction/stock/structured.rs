//! Stock signals mined from embedded JSON blobs.

use serde_json::Value;

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::stock::{
    StockReason, StockShell, classify_status_text, status_from_quantity,
};
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::normalize_attribute_name;
use crate::extraction::walk::{scalar_string, walk_json};
use crate::models::StockStatus;

const AVAILABILITY_KEYS: &[&str] = &[
    "availability",
    "availability_text",
    "availabilitytext",
    "availability_status",
    "availabilitystatus",
    "stock_status",
    "stockstatus",
];

const FLAG_KEYS: &[&str] = &[
    "in_stock",
    "instock",
    "is_available",
    "isavailable",
    "available",
    "is_in_stock",
    "isinstock",
    "purchasable",
];

/// Bare `quantity` is deliberately absent: it usually holds the cart
/// quantity, not the shelf count.
const QUANTITY_KEYS: &[&str] = &[
    "inventory_quantity",
    "inventoryquantity",
    "stock_level",
    "stocklevel",
    "stock_quantity",
    "stockquantity",
    "quantity_available",
    "quantityavailable",
    "inventory",
];

pub struct StructuredDataStock {
    max_depth: usize,
}

impl StructuredDataStock {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl ExtractionStrategy for StructuredDataStock {
    type Output = StockShell;

    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<StockShell>> {
        let mut found: Option<StockShell> = None;
        for blob in &ctx.blobs {
            walk_json(blob, self.max_depth, &mut |node| {
                if found.is_some() {
                    return;
                }
                let Value::Object(map) = node else {
                    return;
                };
                found = shell_from_object(map);
            });
        }
        Ok(found)
    }
}

fn shell_from_object(map: &serde_json::Map<String, Value>) -> Option<StockShell> {
    for (key, value) in map {
        let name = normalize_attribute_name(key);
        if !AVAILABILITY_KEYS.contains(&name.as_str()) {
            continue;
        }
        let Some(text) = scalar_string(value) else {
            continue;
        };
        let evidence = vec![format!("{key}: {text}")];
        return Some(match classify_status_text(&text) {
            Some(c) => {
                let schema = c.reason == StockReason::SchemaAvailability;
                StockShell {
                    status: c.status,
                    quantity: c.quantity,
                    strategy: "structured_data",
                    confidence: if schema { 90 } else { 85 },
                    reason: if schema { c.reason } else { StockReason::AvailabilityField },
                    evidence,
                    raw_status: Some(text),
                }
            }
            None => StockShell {
                status: StockStatus::Unknown,
                quantity: None,
                strategy: "structured_data",
                confidence: 30,
                reason: StockReason::UnrecognizedText,
                evidence,
                raw_status: Some(text),
            },
        });
    }

    for (key, value) in map {
        let name = normalize_attribute_name(key);
        if !FLAG_KEYS.contains(&name.as_str()) {
            continue;
        }
        let Value::Bool(flag) = value else {
            continue;
        };
        return Some(StockShell {
            status: if *flag {
                StockStatus::InStock
            } else {
                StockStatus::OutOfStock
            },
            quantity: None,
            strategy: "structured_data",
            confidence: 85,
            reason: StockReason::AvailabilityField,
            evidence: vec![format!("{key}: {flag}")],
            raw_status: None,
        });
    }

    for (key, value) in map {
        let name = normalize_attribute_name(key);
        if !QUANTITY_KEYS.contains(&name.as_str()) {
            continue;
        }
        let quantity = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()));
        let Some(quantity) = quantity else {
            continue;
        };
        return Some(StockShell {
            status: status_from_quantity(quantity),
            quantity: Some(quantity),
            strategy: "structured_data",
            confidence: 80,
            reason: StockReason::QuantityRemaining,
            evidence: vec![format!("{key}: {quantity}")],
            raw_status: None,
        });
    }

    None
}
