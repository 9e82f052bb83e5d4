//! Assembles the outputs of all three engines plus page metadata into one
//! ProductShell per fetch.

use chrono::{DateTime, Utc};
use scraper::Selector;
use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::config::ExtractionConfig;
use crate::extraction::context::ExtractionContext;
use crate::extraction::price::{PriceEngine, PriceShell};
use crate::extraction::stock::{StockEngine, StockShell};
use crate::extraction::text::{collapse_whitespace, element_text};
use crate::extraction::variants::{VariantEngine, VariantShell};
use crate::extraction::walk::{field, scalar_string, walk_json};

const MAX_IMAGES: usize = 8;

/// Everything one fetch of one page produced. Transient: the ingestion
/// service reconciles it against stored state.
#[derive(Debug, Clone, Serialize)]
pub struct ProductShell {
    pub url: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub images: Vec<String>,
    pub variants: Vec<VariantShell>,
    pub pricing: Option<PriceShell>,
    pub stock: Option<StockShell>,
    pub notes: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

pub struct ProductExtractor {
    variants: VariantEngine,
    prices: PriceEngine,
    stock: StockEngine,
    blob_depth: usize,
    title_sel: Selector,
    h1_sel: Selector,
    og_title_sel: Selector,
    description_sel: Selector,
    og_description_sel: Selector,
    canonical_sel: Selector,
    og_url_sel: Selector,
    site_name_sel: Selector,
    og_image_sel: Selector,
    gallery_sel: Selector,
}

impl ProductExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            variants: VariantEngine::new(config),
            prices: PriceEngine::new(config),
            stock: StockEngine::new(config),
            blob_depth: config.max_blob_depth,
            title_sel: Selector::parse("title").unwrap(),
            h1_sel: Selector::parse("h1").unwrap(),
            og_title_sel: Selector::parse(r#"meta[property="og:title"]"#).unwrap(),
            description_sel: Selector::parse(r#"meta[name="description"]"#).unwrap(),
            og_description_sel: Selector::parse(r#"meta[property="og:description"]"#).unwrap(),
            canonical_sel: Selector::parse(r#"link[rel="canonical"]"#).unwrap(),
            og_url_sel: Selector::parse(r#"meta[property="og:url"]"#).unwrap(),
            site_name_sel: Selector::parse(r#"meta[property="og:site_name"]"#).unwrap(),
            og_image_sel: Selector::parse(r#"meta[property="og:image"]"#).unwrap(),
            gallery_sel: Selector::parse(
                r#"img[itemprop="image"], .product img, .product-image img, .product-gallery img, .gallery img"#,
            )
            .unwrap(),
        }
    }

    pub fn extract(&self, url: &str, markup: &str) -> Result<ProductShell> {
        let ctx = ExtractionContext::from_markup(url, markup)?;

        let variants_run = self.variants.extract(&ctx);
        let price_run = self.prices.extract(&ctx);
        let stock_run = self.stock.extract(&ctx);

        let mut notes = ctx.notes().to_vec();
        notes.extend(variants_run.notes);
        notes.extend(price_run.notes);
        notes.extend(stock_run.notes);

        let variants = variants_run.result.unwrap_or_default();
        let shell = ProductShell {
            url: ctx.url.to_string(),
            canonical_url: self.canonical_url(&ctx),
            title: self.title(&ctx),
            description: self.description(&ctx),
            vendor: self.vendor(&ctx),
            images: self.images(&ctx),
            variants,
            pricing: price_run.result,
            stock: stock_run.result,
            notes,
            fetched_at: Utc::now(),
        };

        tracing::debug!(
            "Extracted {} variants from {} (price: {}, stock: {})",
            shell.variants.len(),
            shell.url,
            shell.pricing.is_some(),
            shell.stock.is_some()
        );
        Ok(shell)
    }

    fn meta_content(&self, ctx: &ExtractionContext, selector: &Selector) -> Option<String> {
        ctx.document
            .select(selector)
            .find_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|v| !v.is_empty())
    }

    fn title(&self, ctx: &ExtractionContext) -> Option<String> {
        self.meta_content(ctx, &self.og_title_sel)
            .or_else(|| {
                ctx.document
                    .select(&self.title_sel)
                    .next()
                    .map(|el| element_text(&el))
                    .filter(|t| !t.is_empty())
            })
            .or_else(|| {
                ctx.document
                    .select(&self.h1_sel)
                    .next()
                    .map(|el| element_text(&el))
                    .filter(|t| !t.is_empty())
            })
    }

    fn description(&self, ctx: &ExtractionContext) -> Option<String> {
        self.meta_content(ctx, &self.description_sel)
            .or_else(|| self.meta_content(ctx, &self.og_description_sel))
    }

    fn canonical_url(&self, ctx: &ExtractionContext) -> Option<String> {
        ctx.document
            .select(&self.canonical_sel)
            .find_map(|el| el.value().attr("href"))
            .and_then(|href| ctx.resolve_url(href))
            .or_else(|| {
                self.meta_content(ctx, &self.og_url_sel)
                    .and_then(|href| ctx.resolve_url(&href))
            })
    }

    fn vendor(&self, ctx: &ExtractionContext) -> Option<String> {
        if let Some(name) = self.meta_content(ctx, &self.site_name_sel) {
            return Some(name);
        }
        let mut found: Option<String> = None;
        for blob in &ctx.blobs {
            walk_json(blob, self.blob_depth, &mut |node| {
                if found.is_some() {
                    return;
                }
                let Value::Object(map) = node else {
                    return;
                };
                let Some(brand) = field(map, &["brand", "vendor", "manufacturer"]) else {
                    return;
                };
                found = match brand {
                    Value::Object(inner) => field(inner, &["name"]).and_then(scalar_string),
                    other => scalar_string(other),
                };
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    fn images(&self, ctx: &ExtractionContext) -> Vec<String> {
        let mut images = Vec::new();
        let mut push = |src: Option<&str>| {
            let Some(resolved) = src.and_then(|s| ctx.resolve_url(s)) else {
                return;
            };
            if images.len() < MAX_IMAGES && !images.contains(&resolved) {
                images.push(resolved);
            }
        };

        for meta in ctx.document.select(&self.og_image_sel) {
            push(meta.value().attr("content"));
        }
        for img in ctx.document.select(&self.gallery_sel) {
            push(
                img.value()
                    .attr("src")
                    .or_else(|| img.value().attr("data-src")),
            );
        }
        images
    }
}
