//! Free-text price scanning, the lowest-trust tier. Only currency-marked
//! tokens are ever considered; a bare number is never a price.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::price::{PriceShell, currency_from_text, parse_price_token};
use crate::extraction::strategy::ExtractionStrategy;

fn marked_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:USD\$|US\$|AU?\$|CA?\$|NZ\$|[£€¥₹$])\s*(?:\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?|\d+(?:[.,]\d{1,2})?)|(?:\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?|\d+(?:[.,]\d{1,2})?)\s*(?:USD|EUR|GBP|JPY|AUD|CAD|NZD|INR|€|£)",
        )
        .unwrap()
    })
}

fn price_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(price|sale|now|only|total|cost|deal|buy|pay)\b").unwrap())
}

pub struct HeuristicPrice {
    min_plausible: Decimal,
    max_plausible: Decimal,
}

impl HeuristicPrice {
    pub fn new(min_plausible: f64, max_plausible: f64) -> Self {
        Self {
            min_plausible: Decimal::from_f64(min_plausible).unwrap_or_default(),
            max_plausible: Decimal::from_f64(max_plausible).unwrap_or(Decimal::MAX),
        }
    }
}

impl ExtractionStrategy for HeuristicPrice {
    type Output = PriceShell;

    fn name(&self) -> &'static str {
        "text_heuristic"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<PriceShell>> {
        let text = ctx.visible_text();
        let mut best: Option<(u8, PriceShell)> = None;

        for m in marked_price_re().find_iter(text) {
            let Some(amount) = parse_price_token(m.as_str()) else {
                continue;
            };
            if amount < self.min_plausible || amount > self.max_plausible {
                continue;
            }
            let mut start = m.start().saturating_sub(48);
            while !text.is_char_boundary(start) {
                start -= 1;
            }
            let score = if price_keyword_re().is_match(&text[start..m.start()]) {
                3
            } else {
                1
            };
            if best.as_ref().is_some_and(|(s, _)| *s >= score) {
                continue;
            }
            best = Some((
                score,
                PriceShell {
                    amount,
                    currency: currency_from_text(m.as_str()),
                    raw_text: m.as_str().to_string(),
                    source: "text_heuristic",
                },
            ));
        }

        Ok(best.map(|(_, shell)| shell))
    }
}
