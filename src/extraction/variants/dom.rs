//! Variant dimensions read from selection controls: `<select>` dropdowns,
//! radio groups, and swatch elements carrying variant data-attributes.

use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::{element_text, normalize_attribute_name};
use crate::extraction::variants::{ATTRIBUTE_NAMES, VariantFindings, push_dimension};

/// Controls whose normalized name contains one of these never describe a
/// variant (quantity steppers, address forms, sort dropdowns, card fields).
const EXCLUDED_CONTROL_NAMES: &[&str] = &[
    "quantity", "qty", "country", "region", "state", "province", "currency", "language",
    "locale", "sort", "shipping", "payment", "month", "year", "card", "search", "filter",
    "per_page", "newsletter",
];

/// Attributes consulted, in order, to name the dimension a control selects.
const NAME_ATTRIBUTES: &[&str] = &[
    "data-option-name",
    "data-option",
    "data-attribute",
    "name",
    "id",
    "aria-label",
];

pub struct DomVariants {
    select_sel: Selector,
    option_sel: Selector,
    radio_sel: Selector,
    label_sel: Selector,
    swatch_sel: Selector,
    placeholder_re: Regex,
}

impl DomVariants {
    pub fn new() -> Self {
        Self {
            select_sel: Selector::parse("select").unwrap(),
            option_sel: Selector::parse("option").unwrap(),
            radio_sel: Selector::parse(r#"input[type="radio"]"#).unwrap(),
            label_sel: Selector::parse("label[for]").unwrap(),
            swatch_sel: Selector::parse("[data-option-name]").unwrap(),
            placeholder_re: Regex::new(r"(?i)^(choose|select|pick|please\s|--+|\.\.\.)").unwrap(),
        }
    }

    fn dimension_name(&self, element: &ElementRef) -> Option<String> {
        let raw = NAME_ATTRIBUTES
            .iter()
            .find_map(|attr| element.value().attr(attr))?;
        classify_control_name(raw)
    }
}

impl Default for DomVariants {
    fn default() -> Self {
        Self::new()
    }
}

/// `options[Size]` and `SingleOptionSelector-color` both carry a known
/// attribute keyword; anything else passes through normalized unless it is
/// on the exclusion list.
fn classify_control_name(raw: &str) -> Option<String> {
    let normalized = normalize_attribute_name(raw);
    if normalized.is_empty() {
        return None;
    }
    for keyword in ATTRIBUTE_NAMES {
        if normalized.contains(keyword) {
            return Some((*keyword).to_string());
        }
    }
    if EXCLUDED_CONTROL_NAMES
        .iter()
        .any(|excluded| normalized.contains(excluded))
    {
        return None;
    }
    Some(normalized)
}

impl ExtractionStrategy for DomVariants {
    type Output = VariantFindings;

    fn name(&self) -> &'static str {
        "dom_controls"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<VariantFindings>> {
        let mut dimensions = Vec::new();

        for select in ctx.document.select(&self.select_sel) {
            let Some(name) = self.dimension_name(&select) else {
                continue;
            };
            let mut values = Vec::new();
            for option in select.select(&self.option_sel) {
                if option.value().attr("disabled").is_some() {
                    continue;
                }
                let text = element_text(&option);
                if text.is_empty() || self.placeholder_re.is_match(&text) {
                    continue;
                }
                values.push(text);
            }
            push_dimension(&mut dimensions, name, values);
        }

        let labels: HashMap<&str, String> = ctx
            .document
            .select(&self.label_sel)
            .filter_map(|label| {
                let target = label.value().attr("for")?;
                let text = element_text(&label);
                (!text.is_empty()).then_some((target, text))
            })
            .collect();

        for radio in ctx.document.select(&self.radio_sel) {
            if radio.value().attr("disabled").is_some() {
                continue;
            }
            let Some(name) = radio.value().attr("name").and_then(classify_control_name) else {
                continue;
            };
            let value = radio
                .value()
                .attr("id")
                .and_then(|id| labels.get(id).cloned())
                .or_else(|| {
                    radio
                        .value()
                        .attr("value")
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(String::from)
                });
            if let Some(value) = value {
                push_dimension(&mut dimensions, name, vec![value]);
            }
        }

        for swatch in ctx.document.select(&self.swatch_sel) {
            let Some(name) = swatch
                .value()
                .attr("data-option-name")
                .and_then(classify_control_name)
            else {
                continue;
            };
            let value = swatch
                .value()
                .attr("data-option-value")
                .or_else(|| swatch.value().attr("data-value"))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .unwrap_or_else(|| element_text(&swatch));
            if !value.is_empty() {
                push_dimension(&mut dimensions, name, vec![value]);
            }
        }

        if dimensions.is_empty() {
            return Ok(None);
        }
        Ok(Some(VariantFindings {
            shells: Vec::new(),
            dimensions,
        }))
    }
}
