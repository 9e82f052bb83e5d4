//! Variant shells mined from embedded JSON blobs (JSON-LD offers, Shopify
//! product JSON, Next.js page data).

use serde_json::Value;

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::price::parse_price_token;
use crate::extraction::stock::classify_status_text;
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::normalize_attribute_name;
use crate::extraction::variants::{ATTRIBUTE_NAMES, VariantAttribute, VariantFindings, VariantShell};
use crate::extraction::walk::{field, scalar_string, walk_json};
use crate::models::StockStatus;

/// Fields that mark an object as an addressable variant. Deliberately does
/// not include a bare `id`, which appears on far too many unrelated objects.
const IDENTIFIER_FIELDS: &[&str] = &[
    "sku",
    "variant_id",
    "variantid",
    "offer_id",
    "offerid",
    "item_id",
    "itemid",
    "mpn",
    "gtin",
    "gtin8",
    "gtin12",
    "gtin13",
    "gtin14",
];

/// Keys that never become variant attributes even when they appear inside a
/// nested `attributes`/`options` map.
const EXCLUDED_ATTRIBUTE_KEYS: &[&str] = &[
    "id", "sku", "price", "prices", "sale_price", "regular_price", "amount", "currency",
    "availability", "stock", "stock_status", "quantity", "inventory", "url", "link", "name",
    "title", "description", "image", "images", "position", "rating", "weight", "barcode",
];

const AVAILABILITY_FIELDS: &[&str] = &[
    "availability",
    "availability_text",
    "availabilitytext",
    "stock_status",
    "stockstatus",
];

const AVAILABILITY_FLAG_FIELDS: &[&str] =
    &["in_stock", "instock", "is_available", "isavailable", "available", "purchasable"];

const PRICE_FIELDS: &[&str] = &[
    "sale_price",
    "saleprice",
    "special_price",
    "specialprice",
    "current_price",
    "currentprice",
    "offer_price",
    "offerprice",
    "price",
];

const URL_FIELDS: &[&str] = &["url", "link", "offer_url", "offerurl"];

pub struct StructuredDataVariants {
    max_depth: usize,
}

impl StructuredDataVariants {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl ExtractionStrategy for StructuredDataVariants {
    type Output = VariantFindings;

    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<VariantFindings>> {
        let mut shells = Vec::new();
        for blob in &ctx.blobs {
            walk_json(blob, self.max_depth, &mut |node| {
                if let Value::Object(map) = node {
                    if let Some(shell) = shell_from_object(map, ctx) {
                        shells.push(shell);
                    }
                }
            });
        }
        if shells.is_empty() {
            return Ok(None);
        }
        Ok(Some(VariantFindings {
            shells,
            dimensions: Vec::new(),
        }))
    }
}

/// An object qualifies as a variant when it carries an identifier field, or
/// at least two recognized attribute fields.
fn shell_from_object(
    map: &serde_json::Map<String, Value>,
    ctx: &ExtractionContext,
) -> Option<VariantShell> {
    let external_id = field(map, IDENTIFIER_FIELDS).and_then(scalar_string);

    let mut attributes: Vec<VariantAttribute> = Vec::new();
    let mut push_attribute = |name: String, value: String| {
        if !attributes.iter().any(|a| a.name == name) {
            attributes.push(VariantAttribute::new(&name, &value));
        }
    };

    for (key, value) in map {
        let name = normalize_attribute_name(key);
        if ATTRIBUTE_NAMES.contains(&name.as_str()) {
            if let Some(v) = scalar_string(value) {
                push_attribute(name, v);
            }
        }
    }
    if let Some(Value::Object(nested)) = field(
        map,
        &["attributes", "options", "selected_options", "selectedoptions"],
    ) {
        for (key, value) in nested {
            let name = normalize_attribute_name(key);
            if name.is_empty() || EXCLUDED_ATTRIBUTE_KEYS.contains(&name.as_str()) {
                continue;
            }
            if let Some(v) = scalar_string(value) {
                push_attribute(name, v);
            }
        }
    }

    if external_id.is_none() && attributes.len() < 2 {
        return None;
    }

    let availability = field(map, AVAILABILITY_FIELDS)
        .and_then(scalar_string)
        .and_then(|text| classify_status_text(&text).map(|c| c.status))
        .or_else(|| match field(map, AVAILABILITY_FLAG_FIELDS) {
            Some(Value::Bool(true)) => Some(StockStatus::InStock),
            Some(Value::Bool(false)) => Some(StockStatus::OutOfStock),
            _ => None,
        });

    let price = field(map, PRICE_FIELDS)
        .and_then(scalar_string)
        .and_then(|text| parse_price_token(&text));

    let variant_url = field(map, URL_FIELDS)
        .and_then(scalar_string)
        .and_then(|href| ctx.resolve_url(&href));

    Some(VariantShell {
        external_id,
        attributes,
        availability,
        price,
        variant_url,
        source: "structured_data",
    })
}
