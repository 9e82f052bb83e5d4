use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::json;

use crate::models::{Notification, NotificationKind, StockStatus, TrackedItem};

pub mod alert;

pub use alert::{AlertGate, AlertSink, NullAlertSink, StockAlert, WebhookAlertSink};

/// Price movement between the stored observation and a fresh one. A first
/// observation carries `old = None` and counts as a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceDelta {
    pub old: Option<Decimal>,
    pub new: Option<Decimal>,
    pub percent_change: Option<f64>,
}

impl PriceDelta {
    pub fn compute(old: Option<Decimal>, new: Option<Decimal>) -> Self {
        let percent_change = match (old, new) {
            (Some(old), Some(new)) if !old.is_zero() => {
                ((new - old) * Decimal::from(100) / old).to_f64()
            }
            _ => None,
        };
        Self {
            old,
            new,
            percent_change,
        }
    }

    pub fn changed(&self) -> bool {
        self.new.is_some() && self.new != self.old
    }

    pub fn dropped(&self) -> bool {
        matches!((self.old, self.new), (Some(old), Some(new)) if new < old)
    }

    /// Positive magnitude of a drop, None when the price did not fall.
    pub fn drop_percent(&self) -> Option<f64> {
        self.dropped()
            .then(|| self.percent_change.map(f64::abs))
            .flatten()
    }
}

/// Stock movement between the stored observation and a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StockDelta {
    pub old_status: Option<StockStatus>,
    pub new_status: Option<StockStatus>,
}

impl StockDelta {
    pub fn compute(old_status: Option<StockStatus>, new_status: Option<StockStatus>) -> Self {
        Self {
            old_status,
            new_status,
        }
    }

    pub fn changed(&self) -> bool {
        self.new_status.is_some() && self.new_status != self.old_status
    }

    /// A transition into `in_stock` from out-of-stock, unknown, or never
    /// observed. Low-stock and preorder items were already orderable, so
    /// moving from those does not count.
    pub fn went_in_stock(&self) -> bool {
        self.new_status == Some(StockStatus::InStock)
            && matches!(
                self.old_status,
                None | Some(StockStatus::OutOfStock) | Some(StockStatus::Unknown)
            )
    }

    pub fn went_out_of_stock(&self) -> bool {
        self.old_status == Some(StockStatus::InStock)
            && self.new_status == Some(StockStatus::OutOfStock)
    }
}

/// Presentation context threaded through so titles and bodies can name the
/// product instead of a variant id.
#[derive(Debug, Clone)]
pub struct NotificationContext<'a> {
    pub product_name: &'a str,
    pub url: &'a str,
    pub currency: Option<&'a str>,
    pub confidence: Option<i64>,
}

pub fn format_price(amount: Decimal, currency: Option<&str>) -> String {
    match currency {
        Some("USD") => format!("${amount}"),
        Some(code) => format!("{code} {amount}"),
        None => amount.to_string(),
    }
}

fn status_label(status: Option<StockStatus>) -> &'static str {
    match status {
        Some(StockStatus::InStock) => "in stock",
        Some(StockStatus::OutOfStock) => "out of stock",
        Some(StockStatus::LowStock) => "low stock",
        Some(StockStatus::Preorder) => "preorder",
        Some(StockStatus::Unknown) | None => "unknown",
    }
}

/// Applies the per-item rules to one check's deltas. Each rule is evaluated
/// independently; zero or more notifications come back for the caller to
/// persist in the same transaction as the history rows.
pub fn decide(
    item: &TrackedItem,
    price: &PriceDelta,
    stock: &StockDelta,
    ctx: &NotificationContext<'_>,
) -> Vec<Notification> {
    let mut fired = Vec::new();

    if item.notify_on_price_drop && price.dropped() {
        let drop = price.drop_percent().unwrap_or(0.0);
        if drop >= item.price_drop_percent {
            let (old, new) = (price.old.unwrap_or_default(), price.new.unwrap_or_default());
            fired.push(build(
                item,
                NotificationKind::PriceDrop,
                format!("Price drop: {}", ctx.product_name),
                format!(
                    "{} fell from {} to {} ({drop:.1}% off)",
                    ctx.product_name,
                    format_price(old, ctx.currency),
                    format_price(new, ctx.currency),
                ),
                json!({
                    "old_price": old,
                    "new_price": new,
                    "percent_change": price.percent_change,
                    "url": ctx.url,
                }),
            ));
        }
    }

    let back_in_stock = item.notify_on_back_in_stock && stock.went_in_stock();
    if back_in_stock {
        fired.push(build(
            item,
            NotificationKind::BackInStock,
            format!("Back in stock: {}", ctx.product_name),
            format!("{} is available again", ctx.product_name),
            json!({
                "old_status": stock.old_status,
                "new_status": stock.new_status,
                "confidence": ctx.confidence,
                "url": ctx.url,
            }),
        ));
    }

    // back_in_stock already covers this cycle's transition, so a generic
    // stock_change would be a duplicate
    if item.notify_on_any_stock_change && stock.changed() && !back_in_stock {
        fired.push(build(
            item,
            NotificationKind::StockChange,
            format!("Stock change: {}", ctx.product_name),
            format!(
                "{} went from {} to {}",
                ctx.product_name,
                status_label(stock.old_status),
                status_label(stock.new_status),
            ),
            json!({
                "old_status": stock.old_status,
                "new_status": stock.new_status,
                "url": ctx.url,
            }),
        ));
    }

    if let (Some(target), Some(new)) = (item.target_price, price.new) {
        if price.changed() && new <= target {
            fired.push(build(
                item,
                NotificationKind::ThresholdMet,
                format!("Target price met: {}", ctx.product_name),
                format!(
                    "{} is now {}, at or below your target of {}",
                    ctx.product_name,
                    format_price(new, ctx.currency),
                    format_price(target, ctx.currency),
                ),
                json!({
                    "target_price": target,
                    "new_price": new,
                    "url": ctx.url,
                }),
            ));
        }
    }

    fired
}

fn build(
    item: &TrackedItem,
    kind: NotificationKind,
    title: String,
    body: String,
    metadata: serde_json::Value,
) -> Notification {
    Notification::new(
        item.id.clone(),
        item.user_id.clone(),
        item.variant_id.clone(),
        kind,
        title,
        body,
        Some(metadata),
    )
}
