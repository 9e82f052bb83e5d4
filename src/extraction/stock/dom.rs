//! Stock signals read from the DOM: schema.org availability markup,
//! availability badges, and the state of purchase controls.

use scraper::{ElementRef, Selector};

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::stock::{StockReason, StockShell, classify_status_text};
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::element_text;
use crate::models::StockStatus;

pub struct DomStock {
    itemprop_sel: Selector,
    badge_sel: Selector,
    cart_sel: Selector,
    notify_sel: Selector,
}

impl DomStock {
    pub fn new() -> Self {
        Self {
            itemprop_sel: Selector::parse(r#"[itemprop="availability"]"#).unwrap(),
            badge_sel: Selector::parse(
                ".stock, .availability, .stock-status, .stock-level, .product-availability, \
                 .availability-message, .in-stock, .instock, .out-of-stock, .outofstock, \
                 .sold-out, .soldout",
            )
            .unwrap(),
            cart_sel: Selector::parse(
                r#"button[name="add"], #AddToCart, .add-to-cart, .addtocart, [data-add-to-cart], form[action*="/cart/add"] [type="submit"]"#,
            )
            .unwrap(),
            notify_sel: Selector::parse(".notify-me, [data-notify-me], .back-in-stock-form")
                .unwrap(),
        }
    }
}

impl Default for DomStock {
    fn default() -> Self {
        Self::new()
    }
}

fn snippet(element: &ElementRef) -> String {
    element.html().chars().take(160).collect()
}

impl ExtractionStrategy for DomStock {
    type Output = StockShell;

    fn name(&self) -> &'static str {
        "dom_stock"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<StockShell>> {
        // schema.org microdata carries the availability in href/content
        for element in ctx.document.select(&self.itemprop_sel) {
            let raw = element
                .value()
                .attr("href")
                .or_else(|| element.value().attr("content"))
                .map(str::to_string)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| element_text(&element));
            if let Some(c) = classify_status_text(&raw) {
                return Ok(Some(StockShell {
                    status: c.status,
                    quantity: c.quantity,
                    strategy: "dom_stock",
                    confidence: 85,
                    reason: c.reason,
                    evidence: vec![snippet(&element)],
                    raw_status: Some(raw),
                }));
            }
        }

        for badge in ctx.document.select(&self.badge_sel) {
            let text = element_text(&badge);
            if let Some(c) = classify_status_text(&text) {
                return Ok(Some(StockShell {
                    status: c.status,
                    quantity: c.quantity,
                    strategy: "dom_stock",
                    confidence: 75,
                    reason: c.reason,
                    evidence: vec![snippet(&badge)],
                    raw_status: Some(text),
                }));
            }
            // The class itself can be the signal when the badge text is bare
            let class = badge.value().attr("class").unwrap_or("").to_lowercase();
            if class.contains("out-of-stock") || class.contains("outofstock") || class.contains("sold-out") || class.contains("soldout")
            {
                return Ok(Some(StockShell {
                    status: StockStatus::OutOfStock,
                    quantity: None,
                    strategy: "dom_stock",
                    confidence: 65,
                    reason: StockReason::ExplicitStockText,
                    evidence: vec![snippet(&badge)],
                    raw_status: (!text.is_empty()).then_some(text),
                }));
            }
        }

        if let Some(control) = ctx.document.select(&self.cart_sel).next() {
            let text = element_text(&control);
            let disabled = control.value().attr("disabled").is_some()
                || classify_status_text(&text)
                    .is_some_and(|c| c.status == StockStatus::OutOfStock);
            return Ok(Some(if disabled {
                StockShell {
                    status: StockStatus::OutOfStock,
                    quantity: None,
                    strategy: "dom_stock",
                    confidence: 70,
                    reason: StockReason::PurchaseControlDisabled,
                    evidence: vec![snippet(&control)],
                    raw_status: (!text.is_empty()).then_some(text),
                }
            } else {
                StockShell {
                    status: StockStatus::InStock,
                    quantity: None,
                    strategy: "dom_stock",
                    confidence: 70,
                    reason: StockReason::AddToCartPresent,
                    evidence: vec![snippet(&control)],
                    raw_status: None,
                }
            }));
        }

        if let Some(notify) = ctx.document.select(&self.notify_sel).next() {
            return Ok(Some(StockShell {
                status: StockStatus::OutOfStock,
                quantity: None,
                strategy: "dom_stock",
                confidence: 65,
                reason: StockReason::PurchaseControlDisabled,
                evidence: vec![snippet(&notify)],
                raw_status: None,
            }));
        }

        Ok(None)
    }
}
