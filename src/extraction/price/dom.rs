//! Price candidates read from meta tags and price-classed DOM elements.

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::price::{PriceShell, currency_from_text, normalize_currency_code, parse_price_token};
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::element_text;

pub struct DomPrice {
    meta_amount_sel: Selector,
    meta_currency_sel: Selector,
    itemprop_sel: Selector,
    sale_sel: Selector,
    general_sel: Selector,
    excluded_re: Regex,
}

impl DomPrice {
    pub fn new() -> Self {
        Self {
            meta_amount_sel: Selector::parse(
                r#"meta[property="og:price:amount"], meta[property="product:price:amount"]"#,
            )
            .unwrap(),
            meta_currency_sel: Selector::parse(
                r#"meta[property="og:price:currency"], meta[property="product:price:currency"], [itemprop="priceCurrency"]"#,
            )
            .unwrap(),
            itemprop_sel: Selector::parse(r#"[itemprop="price"]"#).unwrap(),
            sale_sel: Selector::parse(
                ".sale-price, .price--sale, .price-sale, .special-price, .price-special, \
                 .current-price, .price-current, .price-now, .now-price, .offer-price, \
                 [data-sale-price]",
            )
            .unwrap(),
            general_sel: Selector::parse(
                ".price, .product-price, .product__price, .price-item, .price__current, \
                 [data-price], #price",
            )
            .unwrap(),
            excluded_re: Regex::new(r"was|old|regular|compare|strike|crossed|list-price|rrp|msrp")
                .unwrap(),
        }
    }

    /// Struck-through and "was"-style elements hold the pre-discount price.
    fn excluded(&self, element: &ElementRef) -> bool {
        for el in element.ancestors().filter_map(ElementRef::wrap).chain([*element]) {
            if matches!(el.value().name(), "del" | "s" | "strike") {
                return true;
            }
        }
        let marker = format!(
            "{} {}",
            element.value().attr("class").unwrap_or(""),
            element.value().attr("id").unwrap_or("")
        )
        .to_lowercase();
        self.excluded_re.is_match(&marker)
    }

    fn meta_currency(&self, ctx: &ExtractionContext) -> Option<String> {
        ctx.document
            .select(&self.meta_currency_sel)
            .find_map(|el| el.value().attr("content"))
            .and_then(normalize_currency_code)
    }
}

impl Default for DomPrice {
    fn default() -> Self {
        Self::new()
    }
}

/// The price may live in an attribute (`content`, `data-price`) or in the
/// element text.
fn price_text(element: &ElementRef) -> Option<String> {
    for attr in ["content", "data-price", "data-sale-price"] {
        if let Some(value) = element.value().attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    let text = element_text(element);
    (!text.is_empty()).then_some(text)
}

impl ExtractionStrategy for DomPrice {
    type Output = PriceShell;

    fn name(&self) -> &'static str {
        "dom_price"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<PriceShell>> {
        let fallback_currency = self.meta_currency(ctx);

        for meta in ctx.document.select(&self.meta_amount_sel) {
            let Some(content) = meta.value().attr("content") else {
                continue;
            };
            if let Some(amount) = parse_price_token(content) {
                return Ok(Some(PriceShell {
                    amount,
                    currency: fallback_currency.or_else(|| currency_from_text(content)),
                    raw_text: content.to_string(),
                    source: "dom_price",
                }));
            }
        }

        for selector in [&self.itemprop_sel, &self.sale_sel, &self.general_sel] {
            for element in ctx.document.select(selector) {
                if self.excluded(&element) {
                    continue;
                }
                let Some(raw) = price_text(&element) else {
                    continue;
                };
                let Some(amount) = parse_price_token(&raw) else {
                    continue;
                };
                let currency = currency_from_text(&raw)
                    .or_else(|| fallback_currency.clone());
                return Ok(Some(PriceShell {
                    amount,
                    currency,
                    raw_text: raw,
                    source: "dom_price",
                }));
            }
        }

        Ok(None)
    }
}
