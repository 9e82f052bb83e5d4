//! Whole-page text scan for stock phrases, the lowest-trust tier.

use std::sync::OnceLock;

use regex::Regex;

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::stock::{
    IN_PHRASES, LOW_PHRASES, OUT_PHRASES, PREORDER_PHRASES, StockReason, StockShell,
    status_from_quantity,
};
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::collapse_whitespace;
use crate::models::StockStatus;

fn quantity_left_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bonly\s+(\d{1,4})\s+left\b|\b(\d{1,4})\s+left in stock\b").unwrap())
}

pub struct HeuristicStock;

impl HeuristicStock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicStock {
    fn default() -> Self {
        Self::new()
    }
}

/// Slice of the page text around a match, trimmed to char boundaries.
fn window(text: &str, pos: usize, match_len: usize) -> String {
    let mut start = pos.saturating_sub(40);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (pos + match_len + 40).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    collapse_whitespace(&text[start..end])
}

impl ExtractionStrategy for HeuristicStock {
    type Output = StockShell;

    fn name(&self) -> &'static str {
        "text_heuristic"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<StockShell>> {
        let lowered = ctx.visible_text().to_lowercase();
        if lowered.is_empty() {
            return Ok(None);
        }

        if let Some(caps) = quantity_left_re().captures(&lowered) {
            let full = caps.get(0).unwrap();
            let quantity = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse::<i64>().ok());
            if let Some(quantity) = quantity {
                return Ok(Some(StockShell {
                    status: status_from_quantity(quantity),
                    quantity: Some(quantity),
                    strategy: "text_heuristic",
                    confidence: 60,
                    reason: StockReason::QuantityRemaining,
                    evidence: vec![window(&lowered, full.start(), full.len())],
                    raw_status: Some(full.as_str().to_string()),
                }));
            }
        }

        // Same precedence as badge classification: low before out so
        // "almost sold out" reads as low, out before in so negations win.
        for (phrases, status, reason) in [
            (LOW_PHRASES, StockStatus::LowStock, StockReason::ExplicitStockText),
            (OUT_PHRASES, StockStatus::OutOfStock, StockReason::ExplicitStockText),
            (PREORDER_PHRASES, StockStatus::Preorder, StockReason::PreorderText),
            (IN_PHRASES, StockStatus::InStock, StockReason::ExplicitStockText),
        ] {
            let hit = phrases
                .iter()
                .filter_map(|p| lowered.find(p).map(|pos| (pos, *p)))
                .min_by_key(|(pos, _)| *pos);
            if let Some((pos, phrase)) = hit {
                return Ok(Some(StockShell {
                    status,
                    quantity: None,
                    strategy: "text_heuristic",
                    confidence: 55,
                    reason,
                    evidence: vec![window(&lowered, pos, phrase.len())],
                    raw_status: Some(phrase.to_string()),
                }));
            }
        }

        Ok(None)
    }
}
