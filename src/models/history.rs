use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{StockStatus, generate_id};

/// Append-only price observation. A row exists only when the observed price
/// differed from the latest row for the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantPriceHistory {
    pub id: String,
    pub variant_id: String,
    pub price: Decimal,
    pub currency: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl VariantPriceHistory {
    pub fn new(variant_id: String, price: Decimal, currency: Option<String>) -> Self {
        Self {
            id: generate_id(),
            variant_id,
            price,
            currency,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only stock observation, same change-only discipline as prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantStockHistory {
    pub id: String,
    pub variant_id: String,
    pub status: StockStatus,
    pub quantity: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

impl VariantStockHistory {
    pub fn new(variant_id: String, status: StockStatus, quantity: Option<i64>) -> Self {
        Self {
            id: generate_id(),
            variant_id,
            status,
            quantity,
            recorded_at: Utc::now(),
        }
    }
}
