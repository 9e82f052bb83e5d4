//! Price candidates mined from embedded JSON blobs.

use serde_json::Value;

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::price::{
    PriceShell, currency_from_text, normalize_currency_code, parse_price_token,
};
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::normalize_attribute_name;
use crate::extraction::walk::{field, scalar_string, walk_json};

/// Lower rank wins. Sale/current prices beat the plain `price`, which beats
/// regular/list prices that usually hold the pre-discount figure.
const FIELD_RANKS: &[(&str, u8)] = &[
    ("sale_price", 0),
    ("saleprice", 0),
    ("special_price", 0),
    ("specialprice", 0),
    ("discount_price", 0),
    ("discountprice", 0),
    ("discounted_price", 0),
    ("current_price", 0),
    ("currentprice", 0),
    ("price_now", 0),
    ("pricenow", 0),
    ("final_price", 0),
    ("finalprice", 0),
    ("offer_price", 0),
    ("offerprice", 0),
    ("price", 1),
    ("unit_price", 1),
    ("unitprice", 1),
    ("low_price", 1),
    ("lowprice", 1),
    ("amount", 2),
    ("regular_price", 3),
    ("regularprice", 3),
    ("list_price", 3),
    ("listprice", 3),
    ("original_price", 3),
    ("originalprice", 3),
    ("was_price", 3),
    ("wasprice", 3),
    ("compare_at_price", 3),
    ("compareatprice", 3),
    ("msrp", 3),
    ("high_price", 3),
    ("highprice", 3),
];

const CURRENCY_FIELDS: &[&str] = &[
    "price_currency",
    "pricecurrency",
    "currency",
    "currency_code",
    "currencycode",
];

fn rank_of(name: &str) -> Option<u8> {
    FIELD_RANKS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, rank)| *rank)
}

pub struct StructuredDataPrice {
    max_depth: usize,
}

impl StructuredDataPrice {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl ExtractionStrategy for StructuredDataPrice {
    type Output = PriceShell;

    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<PriceShell>> {
        let mut best: Option<(u8, PriceShell)> = None;

        for blob in &ctx.blobs {
            walk_json(blob, self.max_depth, &mut |node| {
                let Value::Object(map) = node else {
                    return;
                };
                let sibling_currency = field(map, CURRENCY_FIELDS)
                    .and_then(scalar_string)
                    .and_then(|c| normalize_currency_code(&c));
                for (key, value) in map {
                    let name = normalize_attribute_name(key);
                    let Some(rank) = rank_of(&name) else {
                        continue;
                    };
                    let Some(raw) = scalar_string(value) else {
                        continue;
                    };
                    let Some(amount) = parse_price_token(&raw) else {
                        continue;
                    };
                    if best.as_ref().is_some_and(|(r, _)| *r <= rank) {
                        continue;
                    }
                    let currency = sibling_currency
                        .clone()
                        .or_else(|| currency_from_text(&raw));
                    best = Some((
                        rank,
                        PriceShell {
                            amount,
                            currency,
                            raw_text: raw,
                            source: "structured_data",
                        },
                    ));
                }
            });
        }

        Ok(best.map(|(_, shell)| shell))
    }
}
