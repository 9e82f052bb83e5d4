use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{CheckOutcome, StockStatus, generate_id};

/// Audit row appended for every check that reaches persistence, whether or
/// not anything changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockCheck {
    pub id: String,
    pub variant_id: String,
    pub outcome: CheckOutcome,
    pub status: Option<StockStatus>,
    pub price: Option<Decimal>,
    pub confidence: Option<i64>,
    pub strategy: Option<String>,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl StockCheck {
    pub fn new(variant_id: String, outcome: CheckOutcome) -> Self {
        Self {
            id: generate_id(),
            variant_id,
            outcome,
            status: None,
            price: None,
            confidence: None,
            strategy: None,
            reason: None,
            checked_at: Utc::now(),
        }
    }
}
