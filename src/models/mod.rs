use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod history;
pub mod notification;
pub mod product;
pub mod stock_check;
pub mod tracked_item;
pub mod variant;

// Re-exports for convenience
pub use history::*;
pub use notification::*;
pub use product::*;
pub use stock_check::*;
pub use tracked_item::*;
pub use variant::*;

// Common enums used across models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum StockStatus {
    #[sqlx(rename = "in_stock")]
    InStock,
    #[sqlx(rename = "out_of_stock")]
    OutOfStock,
    #[sqlx(rename = "low_stock")]
    LowStock,
    #[sqlx(rename = "preorder")]
    Preorder,
    #[sqlx(rename = "unknown")]
    Unknown,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::OutOfStock => "out_of_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::Preorder => "preorder",
            StockStatus::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_stock" => Some(StockStatus::InStock),
            "out_of_stock" => Some(StockStatus::OutOfStock),
            "low_stock" => Some(StockStatus::LowStock),
            "preorder" => Some(StockStatus::Preorder),
            "unknown" => Some(StockStatus::Unknown),
            _ => None,
        }
    }

    // Preorder items can be ordered but are not on the shelf
    pub fn is_available(&self) -> bool {
        matches!(self, StockStatus::InStock | StockStatus::LowStock)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum NotificationKind {
    #[sqlx(rename = "price_drop")]
    PriceDrop,
    #[sqlx(rename = "back_in_stock")]
    BackInStock,
    #[sqlx(rename = "stock_change")]
    StockChange,
    #[sqlx(rename = "threshold_met")]
    ThresholdMet,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PriceDrop => "price_drop",
            NotificationKind::BackInStock => "back_in_stock",
            NotificationKind::StockChange => "stock_change",
            NotificationKind::ThresholdMet => "threshold_met",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum CheckOutcome {
    #[sqlx(rename = "changed")]
    Changed,
    #[sqlx(rename = "unchanged")]
    Unchanged,
    #[sqlx(rename = "empty")]
    Empty,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Changed => "changed",
            CheckOutcome::Unchanged => "unchanged",
            CheckOutcome::Empty => "empty",
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
