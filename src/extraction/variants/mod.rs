//! Variant extraction: three strategies over one page, merged and
//! deduplicated.
//!
//! Unlike price and stock, every variant strategy always runs; each one sees
//! a different facet of the page (embedded data, selection controls, free
//! text) and the merged output is deduplicated first-seen-wins. Strategy
//! order is therefore a contract: structured data runs first so its richer
//! shells survive collisions.

pub mod dom;
pub mod heuristic;
pub mod structured;

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::extraction::context::ExtractionContext;
use crate::extraction::strategy::{ExtractionStrategy, StrategyRun, run_guarded};
use crate::extraction::text::{clean_attribute_value, normalize_attribute_name};
use crate::models::{AttributeSet, StockStatus};

/// Attribute names a page is allowed to contribute as variant dimensions.
/// Anything else is assumed to be noise (prices, ids, marketing copy).
pub(crate) const ATTRIBUTE_NAMES: &[&str] = &[
    "size", "color", "colour", "material", "fit", "style", "width", "length", "capacity",
    "flavor", "flavour", "scent", "finish", "pattern", "model",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantAttribute {
    pub name: String,
    pub value: String,
}

impl VariantAttribute {
    /// Normalizes on construction: names become lowercase snake_case,
    /// values are trimmed with inner whitespace collapsed.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: normalize_attribute_name(name),
            value: clean_attribute_value(value),
        }
    }
}

/// Transient extracted variant, not yet reconciled with stored state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantShell {
    pub external_id: Option<String>,
    pub attributes: Vec<VariantAttribute>,
    pub availability: Option<StockStatus>,
    pub price: Option<Decimal>,
    pub variant_url: Option<String>,
    pub source: &'static str,
}

impl VariantShell {
    /// Canonical attribute set used for identity and dedup. Values are
    /// lowercased here so `M` from a dropdown and `m` from embedded data
    /// land on the same variant.
    pub fn attribute_set(&self) -> AttributeSet {
        self.attributes
            .iter()
            .map(|a| (a.name.clone(), a.value.to_lowercase()))
            .collect()
    }

    fn attribute_key(&self) -> String {
        serde_json::to_string(&self.attribute_set()).unwrap_or_default()
    }
}

/// One selectable dimension (e.g. `size` with `[s, m, l]`) collected from a
/// page control or text cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDimension {
    pub name: String,
    pub values: Vec<String>,
}

/// What a single strategy harvested: ready shells, plus dimensions the
/// engine still has to expand into combinations.
#[derive(Debug, Default)]
pub struct VariantFindings {
    pub shells: Vec<VariantShell>,
    pub dimensions: Vec<VariantDimension>,
}

/// Adds values to the dimension named `name`, creating it on first sight.
/// Values are deduplicated case-insensitively, keeping first spelling.
pub(crate) fn push_dimension(dims: &mut Vec<VariantDimension>, name: String, values: Vec<String>) {
    if name.is_empty() || values.is_empty() {
        return;
    }
    let dim = match dims.iter_mut().find(|d| d.name == name) {
        Some(existing) => existing,
        None => {
            dims.push(VariantDimension {
                name,
                values: Vec::new(),
            });
            dims.last_mut().unwrap()
        }
    };
    for value in values {
        if !dim
            .values
            .iter()
            .any(|v| v.eq_ignore_ascii_case(&value))
        {
            dim.values.push(value);
        }
    }
}

pub(crate) struct Expansion {
    pub combos: Vec<Vec<VariantAttribute>>,
    pub truncated: bool,
    pub full_count: usize,
}

/// Cartesian product across dimensions, generated odometer-style so the cap
/// stops the work the instant it is reached instead of after full expansion.
pub(crate) fn expand_dimensions(dimensions: &[VariantDimension], cap: usize) -> Expansion {
    let dimensions: Vec<&VariantDimension> =
        dimensions.iter().filter(|d| !d.values.is_empty()).collect();
    if dimensions.is_empty() || cap == 0 {
        return Expansion {
            combos: Vec::new(),
            truncated: false,
            full_count: 0,
        };
    }

    let full_count = dimensions
        .iter()
        .fold(1usize, |acc, d| acc.saturating_mul(d.values.len()));

    let mut combos = Vec::with_capacity(full_count.min(cap));
    let mut indices = vec![0usize; dimensions.len()];
    loop {
        combos.push(
            dimensions
                .iter()
                .zip(&indices)
                .map(|(dim, &i)| VariantAttribute::new(&dim.name, &dim.values[i]))
                .collect(),
        );
        if combos.len() >= cap {
            break;
        }
        // Advance the rightmost index, carrying leftwards
        let mut pos = dimensions.len();
        loop {
            if pos == 0 {
                return Expansion {
                    combos,
                    truncated: false,
                    full_count,
                };
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < dimensions[pos].values.len() {
                break;
            }
            indices[pos] = 0;
        }
    }

    let truncated = combos.len() < full_count;
    Expansion {
        combos,
        truncated,
        full_count,
    }
}

pub struct VariantEngine {
    strategies: Vec<Box<dyn ExtractionStrategy<Output = VariantFindings>>>,
    max_variants: usize,
}

impl VariantEngine {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            strategies: vec![
                Box::new(structured::StructuredDataVariants::new(
                    config.max_blob_depth,
                )),
                Box::new(dom::DomVariants::new()),
                Box::new(heuristic::HeuristicVariants::new()),
            ],
            max_variants: config.max_variants,
        }
    }

    pub fn extract(&self, ctx: &ExtractionContext) -> StrategyRun<Vec<VariantShell>> {
        let mut notes = Vec::new();
        let mut shells = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name();
            let Some(findings) = run_guarded(strategy.as_ref(), ctx, &mut notes) else {
                continue;
            };
            shells.extend(findings.shells);
            if findings.dimensions.is_empty() {
                continue;
            }
            let expansion = expand_dimensions(&findings.dimensions, self.max_variants);
            if expansion.truncated {
                notes.push(format!(
                    "{name}: combination expansion capped at {} of {} possible variants",
                    expansion.combos.len(),
                    expansion.full_count
                ));
            }
            shells.extend(expansion.combos.into_iter().map(|attributes| VariantShell {
                external_id: None,
                attributes,
                availability: None,
                price: None,
                variant_url: None,
                source: name,
            }));
        }

        let mut merged = dedup_shells(shells);
        if merged.len() > self.max_variants {
            notes.push(format!(
                "variant output capped at {} of {} extracted",
                self.max_variants,
                merged.len()
            ));
            merged.truncate(self.max_variants);
        }

        StrategyRun {
            result: if merged.is_empty() {
                None
            } else {
                Some(merged)
            },
            notes,
        }
    }
}

/// First-seen wins. Two shells collide when they share an external id, or
/// when the later one has no id and repeats an already-seen attribute set.
fn dedup_shells(shells: Vec<VariantShell>) -> Vec<VariantShell> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_attrs: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(shells.len());

    for shell in shells {
        if let Some(id) = &shell.external_id {
            if !seen_ids.insert(id.clone()) {
                continue;
            }
            seen_attrs.insert(shell.attribute_key());
            out.push(shell);
            continue;
        }
        if !seen_attrs.insert(shell.attribute_key()) {
            continue;
        }
        out.push(shell);
    }
    out
}
