//! Price extraction: structured data, then DOM, then text heuristics.
//! First strategy to produce a shell wins.

pub mod dom;
pub mod heuristic;
pub mod structured;

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::ExtractionConfig;
use crate::extraction::context::ExtractionContext;
use crate::extraction::strategy::{ExtractionStrategy, StrategyRun, first_match};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceShell {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub raw_text: String,
    pub source: &'static str,
}

pub struct PriceEngine {
    strategies: Vec<Box<dyn ExtractionStrategy<Output = PriceShell>>>,
}

impl PriceEngine {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(structured::StructuredDataPrice::new(config.max_blob_depth)),
                Box::new(dom::DomPrice::new()),
                Box::new(heuristic::HeuristicPrice::new(
                    config.min_plausible_price,
                    config.max_plausible_price,
                )),
            ],
        }
    }

    pub fn extract(&self, ctx: &ExtractionContext) -> StrategyRun<PriceShell> {
        first_match(&self.strategies, ctx)
    }
}

/// Checked longest-first so `US$` wins over `$`.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("USD$", "USD"),
    ("US$", "USD"),
    ("AU$", "AUD"),
    ("CA$", "CAD"),
    ("NZ$", "NZD"),
    ("A$", "AUD"),
    ("C$", "CAD"),
    ("$", "USD"),
    ("£", "GBP"),
    ("€", "EUR"),
    ("¥", "JPY"),
    ("₹", "INR"),
];

fn price_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+(?:[.,]\d{1,2})?")
            .unwrap()
    })
}

fn iso_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(USD|EUR|GBP|JPY|AUD|CAD|NZD|INR|CHF|SEK|NOK|DKK|CNY|KRW)\b").unwrap()
    })
}

/// Parses the first numeric price token out of arbitrary text, handling
/// both `1,299.00` and `1.299,00` grouping.
pub(crate) fn parse_price_token(raw: &str) -> Option<Decimal> {
    let token = price_token_re().find(raw)?.as_str();
    let normalized = match (token.rfind(','), token.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => {
            token.replace('.', "").replace(',', ".")
        }
        (Some(_), Some(_)) => token.replace(',', ""),
        (Some(comma), None) => {
            let decimals = token.len() - comma - 1;
            if token.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                token.replace(',', ".")
            } else {
                token.replace(',', "")
            }
        }
        _ => token.to_string(),
    };
    let amount = Decimal::from_str(&normalized).ok()?;
    (amount > Decimal::ZERO).then_some(amount)
}

/// Resolves a currency marker in text to an ISO code: symbols first,
/// then standalone uppercase codes.
pub(crate) fn currency_from_text(text: &str) -> Option<String> {
    for (symbol, iso) in CURRENCY_SYMBOLS {
        if text.contains(symbol) {
            return Some((*iso).to_string());
        }
    }
    iso_code_re()
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// Cleans a currency value found in a dedicated field (`"usd"` -> `"USD"`).
pub(crate) fn normalize_currency_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_uppercase())
}
