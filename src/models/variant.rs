use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::models::{StockStatus, generate_id};

/// Canonical attribute set: lowercase snake_case names mapped to trimmed
/// values. BTreeMap keeps the JSON encoding order independent, so two sets
/// with the same pairs always encode to the same string.
pub type AttributeSet = BTreeMap<String, String>;

pub fn encode_attributes(attributes: &AttributeSet) -> String {
    serde_json::to_string(attributes).unwrap_or_else(|_| "{}".to_string())
}

pub fn decode_attributes(raw: &str) -> AttributeSet {
    serde_json::from_str(raw).unwrap_or_default()
}

/// True when every (name, value) pair of `stored` appears in `extracted`,
/// i.e. the extracted set is a superset of the stored one.
pub fn is_attribute_superset(extracted: &AttributeSet, stored: &AttributeSet) -> bool {
    stored
        .iter()
        .all(|(name, value)| extracted.get(name).is_some_and(|v| v == value))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    pub sku: Option<String>,
    pub attributes_json: String,
    pub variant_url: Option<String>,

    // Denormalized price snapshot, always a projection of the latest
    // price history row
    pub currency: Option<String>,
    pub current_price: Option<Decimal>,
    pub previous_price: Option<Decimal>,
    pub discount_percent: Option<f64>,

    // Denormalized stock snapshot, projection of the latest stock history row
    pub current_stock_status: Option<StockStatus>,
    pub previous_stock_status: Option<StockStatus>,
    pub is_available: bool,

    // Metadata
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVariant {
    pub product_id: String,
    pub sku: Option<String>,
    pub attributes: AttributeSet,
    pub variant_url: Option<String>,
    pub currency: Option<String>,
}

impl Variant {
    pub fn new(new_variant: NewVariant) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            product_id: new_variant.product_id,
            sku: new_variant.sku,
            attributes_json: encode_attributes(&new_variant.attributes),
            variant_url: new_variant.variant_url,
            currency: new_variant.currency,
            current_price: None,
            previous_price: None,
            discount_percent: None,
            current_stock_status: None,
            previous_stock_status: None,
            is_available: false,
            last_checked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attributes(&self) -> AttributeSet {
        decode_attributes(&self.attributes_json)
    }

    /// Shifts the current price into `previous_price` and projects the new
    /// one. The discount percent is recomputed only on a decrease and
    /// cleared otherwise, so a price bounce never shows a stale discount.
    pub fn apply_price(&mut self, price: Decimal, currency: Option<String>) {
        let old = self.current_price;
        self.previous_price = old;
        self.current_price = Some(price);
        if let Some(c) = currency {
            self.currency = Some(c);
        }
        self.discount_percent = match old {
            Some(old) if price < old && !old.is_zero() => {
                ((old - price) * Decimal::from(100) / old).to_f64()
            }
            _ => None,
        };
        self.updated_at = Utc::now();
    }

    pub fn apply_stock(&mut self, status: StockStatus) {
        self.previous_stock_status = self.current_stock_status;
        self.current_stock_status = Some(status);
        self.is_available = status.is_available();
        self.updated_at = Utc::now();
    }

    pub fn mark_checked(&mut self, at: DateTime<Utc>) {
        self.last_checked_at = Some(at);
        self.updated_at = at;
    }
}
