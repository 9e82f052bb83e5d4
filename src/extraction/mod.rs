//! Multi-strategy extraction of commerce facts from product pages.
//!
//! Each fact (variants, price, stock) has its own engine running a fixed
//! strategy chain: structured data blobs, then DOM markup, then free-text
//! heuristics. All extraction is synchronous; parsed documents never cross
//! an await point.

pub mod context;
pub mod price;
pub mod product;
pub mod stock;
pub mod strategy;
pub mod text;
pub mod variants;
pub mod walk;

pub use context::ExtractionContext;
pub use price::{PriceEngine, PriceShell};
pub use product::{ProductExtractor, ProductShell};
pub use stock::{StockEngine, StockReason, StockShell};
pub use strategy::{ExtractionStrategy, StrategyRun};
pub use variants::{VariantAttribute, VariantEngine, VariantShell};
