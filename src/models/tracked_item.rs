use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{StockStatus, generate_id};

/// A user's subscription to change notifications for one variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedItem {
    pub id: String,
    pub user_id: String,
    pub variant_id: String,

    // Notification preferences
    pub target_price: Option<Decimal>,
    pub notify_on_price_drop: bool,
    pub price_drop_percent: f64,
    pub notify_on_back_in_stock: bool,
    pub notify_on_any_stock_change: bool,
    pub active: bool,

    // Notification/alert bookkeeping
    pub last_notified_at: Option<DateTime<Utc>>,
    pub last_alerted_at: Option<DateTime<Utc>>,

    // Denormalized last-check view, updated on every completed check
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_price: Option<Decimal>,
    pub last_stock_status: Option<StockStatus>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackedItem {
    pub user_id: String,
    pub variant_id: String,
    pub target_price: Option<Decimal>,
    pub notify_on_price_drop: Option<bool>,
    pub price_drop_percent: Option<f64>,
    pub notify_on_back_in_stock: Option<bool>,
    pub notify_on_any_stock_change: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTrackedItem {
    pub target_price: Option<Decimal>,
    pub notify_on_price_drop: Option<bool>,
    pub price_drop_percent: Option<f64>,
    pub notify_on_back_in_stock: Option<bool>,
    pub notify_on_any_stock_change: Option<bool>,
    pub active: Option<bool>,
}

impl TrackedItem {
    pub fn new(new_item: NewTrackedItem) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            user_id: new_item.user_id,
            variant_id: new_item.variant_id,
            target_price: new_item.target_price,
            notify_on_price_drop: new_item.notify_on_price_drop.unwrap_or(true),
            price_drop_percent: new_item.price_drop_percent.unwrap_or(0.0),
            notify_on_back_in_stock: new_item.notify_on_back_in_stock.unwrap_or(true),
            notify_on_any_stock_change: new_item.notify_on_any_stock_change.unwrap_or(false),
            active: true,
            last_notified_at: None,
            last_alerted_at: None,
            last_checked_at: None,
            last_price: None,
            last_stock_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update(&mut self, update: UpdateTrackedItem) {
        if let Some(target_price) = update.target_price {
            self.target_price = Some(target_price);
        }
        if let Some(notify_on_price_drop) = update.notify_on_price_drop {
            self.notify_on_price_drop = notify_on_price_drop;
        }
        if let Some(price_drop_percent) = update.price_drop_percent {
            self.price_drop_percent = price_drop_percent;
        }
        if let Some(notify_on_back_in_stock) = update.notify_on_back_in_stock {
            self.notify_on_back_in_stock = notify_on_back_in_stock;
        }
        if let Some(notify_on_any_stock_change) = update.notify_on_any_stock_change {
            self.notify_on_any_stock_change = notify_on_any_stock_change;
        }
        if let Some(active) = update.active {
            self.active = active;
        }

        self.updated_at = Utc::now();
    }

    /// Updates the denormalized last-check view. Runs on every completed
    /// check, whether or not a notification fired.
    pub fn record_check(
        &mut self,
        price: Option<Decimal>,
        status: Option<StockStatus>,
        at: DateTime<Utc>,
    ) {
        self.last_checked_at = Some(at);
        if price.is_some() {
            self.last_price = price;
        }
        if status.is_some() {
            self.last_stock_status = status;
        }
        self.updated_at = at;
    }

    /// Cooldown gate for outward alerts.
    pub fn alert_allowed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_alerted_at {
            Some(last) => now - last >= cooldown,
            None => true,
        }
    }
}
