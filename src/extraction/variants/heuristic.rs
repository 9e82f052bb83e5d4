//! Last-resort variant signals pulled from page text: `attribute: value`
//! pairs, definition lists, spec tables, and option lists with variant-like
//! class names.

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::Result;
use crate::extraction::context::ExtractionContext;
use crate::extraction::strategy::ExtractionStrategy;
use crate::extraction::text::{element_text, normalize_attribute_name};
use crate::extraction::variants::{ATTRIBUTE_NAMES, VariantFindings, push_dimension};

pub struct HeuristicVariants {
    pair_sel: Selector,
    dl_sel: Selector,
    row_sel: Selector,
    cell_sel: Selector,
    list_sel: Selector,
    pair_re: Regex,
}

impl HeuristicVariants {
    pub fn new() -> Self {
        Self {
            pair_sel: Selector::parse("li, td, dd, p, span").unwrap(),
            dl_sel: Selector::parse("dl").unwrap(),
            row_sel: Selector::parse("tr").unwrap(),
            cell_sel: Selector::parse("th, td").unwrap(),
            list_sel: Selector::parse("ul, ol").unwrap(),
            pair_re: Regex::new(r"^([A-Za-z][A-Za-z /-]{0,30}?)\s*:\s*(\S.{0,60})$").unwrap(),
        }
    }
}

impl Default for HeuristicVariants {
    fn default() -> Self {
        Self::new()
    }
}

fn allow_listed(raw: &str) -> Option<String> {
    let name = normalize_attribute_name(raw);
    ATTRIBUTE_NAMES.contains(&name.as_str()).then_some(name)
}

/// A plausible option value: short, non-empty, not a sentence.
fn option_value(element: &ElementRef) -> Option<String> {
    let text = element_text(element);
    (!text.is_empty() && text.len() <= 20 && !text.contains(':')).then_some(text)
}

impl ExtractionStrategy for HeuristicVariants {
    type Output = VariantFindings;

    fn name(&self) -> &'static str {
        "text_heuristic"
    }

    fn extract(&self, ctx: &ExtractionContext) -> Result<Option<VariantFindings>> {
        let mut dimensions = Vec::new();

        // `Material: Leather` style pairs in short elements
        for element in ctx.document.select(&self.pair_sel) {
            let text = element_text(&element);
            if text.is_empty() || text.len() > 80 {
                continue;
            }
            if let Some(caps) = self.pair_re.captures(&text) {
                if let Some(name) = allow_listed(&caps[1]) {
                    push_dimension(&mut dimensions, name, vec![caps[2].trim().to_string()]);
                }
            }
        }

        // <dt>Size</dt><dd>M</dd>
        for dl in ctx.document.select(&self.dl_sel) {
            let mut pending: Option<String> = None;
            for child in dl.children().filter_map(ElementRef::wrap) {
                match child.value().name() {
                    "dt" => pending = allow_listed(&element_text(&child)),
                    "dd" => {
                        if let (Some(name), Some(value)) = (pending.take(), option_value(&child)) {
                            push_dimension(&mut dimensions, name, vec![value]);
                        }
                    }
                    _ => {}
                }
            }
        }

        // Two-cell spec table rows
        for row in ctx.document.select(&self.row_sel) {
            let cells: Vec<ElementRef> = row.select(&self.cell_sel).collect();
            if cells.len() != 2 {
                continue;
            }
            let label = element_text(&cells[0]);
            if let Some(name) = allow_listed(label.trim_end_matches(':')) {
                if let Some(value) = option_value(&cells[1]) {
                    push_dimension(&mut dimensions, name, vec![value]);
                }
            }
        }

        // <ul class="size-options"><li>S</li><li>M</li>...</ul>
        for list in ctx.document.select(&self.list_sel) {
            let Some(class) = list.value().attr("class") else {
                continue;
            };
            let class = class.to_lowercase();
            let Some(keyword) = ATTRIBUTE_NAMES.iter().find(|k| class.contains(*k)) else {
                continue;
            };
            let values: Vec<String> = list
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "li")
                .filter_map(|el| option_value(&el))
                .collect();
            if values.len() >= 2 {
                push_dimension(&mut dimensions, (*keyword).to_string(), values);
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
