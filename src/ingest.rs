use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use crate::Result;
use crate::extraction::{ProductShell, VariantShell};
use crate::models::{
    AttributeSet, NewProduct, NewVariant, Product, ProductMetadata, StockStatus, UpdateProduct,
    Variant, VariantPriceHistory, VariantStockHistory,
};
use crate::notifications::{self, NotificationContext, PriceDelta, StockDelta};
use crate::storage::{Database, history, products, tracking, variants};

/// One variant's worth of observed facts from a single fetch, after
/// variant-level values have been merged with page-level fallbacks.
#[derive(Debug, Clone)]
pub struct VariantObservation {
    pub attributes: AttributeSet,
    pub sku: Option<String>,
    pub variant_url: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub status: Option<StockStatus>,
    pub quantity: Option<i64>,
    pub confidence: Option<i64>,
    pub strategy: Option<String>,
    pub reason: Option<String>,
}

/// Flattens a ProductShell into per-variant observations. Variant-level
/// price and availability win over the page-level engines; a page with no
/// extracted variants still yields one attribute-less observation so its
/// facts land somewhere.
pub fn observations_from_shell(shell: &ProductShell) -> Vec<VariantObservation> {
    let pricing = shell.pricing.as_ref();
    let stock = shell.stock.as_ref();
    let page_level = VariantObservation {
        attributes: AttributeSet::new(),
        sku: None,
        variant_url: None,
        price: pricing.map(|p| p.amount),
        currency: pricing.and_then(|p| p.currency.clone()),
        status: stock.map(|s| s.status),
        quantity: stock.and_then(|s| s.quantity),
        confidence: stock.map(|s| i64::from(s.confidence)),
        strategy: stock.map(|s| s.strategy.to_string()),
        reason: stock.map(|s| s.reason.as_str().to_string()),
    };

    if shell.variants.is_empty() {
        return vec![page_level];
    }

    shell
        .variants
        .iter()
        .map(|v| merge_variant_shell(v, &page_level))
        .collect()
}

fn merge_variant_shell(shell: &VariantShell, page_level: &VariantObservation) -> VariantObservation {
    let mut obs = page_level.clone();
    obs.attributes = shell.attribute_set();
    obs.sku = shell.external_id.clone();
    obs.variant_url = shell.variant_url.clone();
    if let Some(price) = shell.price {
        obs.price = Some(price);
    }
    if let Some(status) = shell.availability {
        obs.status = Some(status);
        obs.quantity = None;
        // Embedded variant data names its own availability; trust it like a
        // structured availability field
        obs.confidence = Some(85);
        obs.strategy = Some(shell.source.to_string());
        obs.reason = Some("availability_field".to_string());
    }
    obs
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub product: Product,
    pub variants: Vec<Variant>,
    pub notifications_created: usize,
}

/// Turns extraction output into durable state: one transaction covering the
/// product upsert, variant resolution, history appends, snapshot projection,
/// and notification rows. Partial failure rolls the whole pass back.
pub struct IngestService {
    db: Database,
}

impl IngestService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn ingest(&self, shell: &ProductShell, url: &str) -> Result<IngestOutcome> {
        let now = Utc::now();
        let observations = observations_from_shell(shell);

        let mut tx = self.db.pool().begin().await?;

        let product = upsert_product(&mut tx, shell, url).await?;

        // Stored rows not yet claimed by an observation this pass; claiming
        // removes a row so two observations never land on the same variant
        let mut unclaimed = variants::list_by_product(&mut *tx, &product.id).await?;
        let mut resolved = Vec::with_capacity(observations.len());
        let mut notifications_created = 0;

        for obs in &observations {
            let (mut variant, is_new) = claim_or_create(&mut unclaimed, &product.id, obs);
            if is_new {
                variants::insert(&mut *tx, &variant).await?;
            }

            let (price_delta, stock_delta) =
                apply_observation(&mut tx, &mut variant, obs, now).await?;
            variants::update(&mut *tx, &variant).await?;

            if price_delta.changed() || stock_delta.changed() {
                notifications_created += notify_tracked_items(
                    &mut tx,
                    &product,
                    &variant,
                    obs,
                    &price_delta,
                    &stock_delta,
                    now,
                )
                .await?;
            }

            resolved.push(variant);
        }

        tx.commit().await?;

        tracing::info!(
            "Ingested {} with {} variant(s), {} notification(s)",
            url,
            resolved.len(),
            notifications_created
        );

        Ok(IngestOutcome {
            product,
            variants: resolved,
            notifications_created,
        })
    }
}

async fn upsert_product(
    conn: &mut SqliteConnection,
    shell: &ProductShell,
    url: &str,
) -> Result<Product> {
    let mut existing = products::find_by_url(conn, url).await?;
    if existing.is_none() {
        if let Some(canonical) = shell.canonical_url.as_deref() {
            existing = products::find_by_url(conn, canonical).await?;
        }
    }

    let metadata = (shell.description.is_some() || !shell.images.is_empty()).then(|| {
        ProductMetadata {
            description: shell.description.clone(),
            images: shell.images.clone(),
        }
    });

    match existing {
        Some(mut product) => {
            product.update(UpdateProduct {
                canonical_url: shell.canonical_url.clone(),
                name: shell.title.clone(),
                vendor: shell.vendor.clone(),
                main_image_url: shell.images.first().cloned(),
                metadata,
            });
            products::update(conn, &product).await?;
            Ok(product)
        }
        None => {
            let product = Product::new(NewProduct {
                url: url.to_string(),
                canonical_url: shell.canonical_url.clone(),
                name: shell.title.clone(),
                vendor: shell.vendor.clone(),
                main_image_url: shell.images.first().cloned(),
                metadata,
            });
            products::insert(conn, &product).await?;
            Ok(product)
        }
    }
}

fn claim_or_create(
    unclaimed: &mut Vec<Variant>,
    product_id: &str,
    obs: &VariantObservation,
) -> (Variant, bool) {
    match variants::match_variant_index(unclaimed, &obs.attributes, obs.sku.as_deref()) {
        Some(idx) => {
            let mut variant = unclaimed.swap_remove(idx);
            if variant.sku.is_none() && obs.sku.is_some() {
                variant.sku = obs.sku.clone();
            }
            if variant.variant_url.is_none() && obs.variant_url.is_some() {
                variant.variant_url = obs.variant_url.clone();
            }
            (variant, false)
        }
        None => {
            let variant = Variant::new(NewVariant {
                product_id: product_id.to_string(),
                sku: obs.sku.clone(),
                attributes: obs.attributes.clone(),
                variant_url: obs.variant_url.clone(),
                currency: obs.currency.clone(),
            });
            (variant, true)
        }
    }
}

/// Appends history rows for values that differ from the latest stored row
/// and projects them onto the variant snapshot. Unchanged values touch
/// nothing, which is what makes re-ingesting an identical page idempotent.
pub(crate) async fn apply_observation(
    conn: &mut SqliteConnection,
    variant: &mut Variant,
    obs: &VariantObservation,
    now: DateTime<Utc>,
) -> Result<(PriceDelta, StockDelta)> {
    let price_delta = match obs.price {
        Some(new_price) => {
            let latest = history::latest_price(conn, &variant.id).await?;
            let old = latest.as_ref().map(|row| row.price);
            if old != Some(new_price) {
                history::append_price(
                    conn,
                    &VariantPriceHistory::new(variant.id.clone(), new_price, obs.currency.clone()),
                )
                .await?;
                variant.apply_price(new_price, obs.currency.clone());
            }
            PriceDelta::compute(old, Some(new_price))
        }
        None => PriceDelta::default(),
    };

    let stock_delta = match obs.status {
        Some(new_status) => {
            let latest = history::latest_stock(conn, &variant.id).await?;
            let old = latest.as_ref().map(|row| row.status);
            let row_differs = latest
                .as_ref()
                .is_none_or(|row| row.status != new_status || row.quantity != obs.quantity);
            if row_differs {
                history::append_stock(
                    conn,
                    &VariantStockHistory::new(variant.id.clone(), new_status, obs.quantity),
                )
                .await?;
            }
            if old != Some(new_status) {
                variant.apply_stock(new_status);
            }
            StockDelta::compute(old, Some(new_status))
        }
        None => StockDelta::default(),
    };

    variant.mark_checked(now);

    Ok((price_delta, stock_delta))
}

async fn notify_tracked_items(
    conn: &mut SqliteConnection,
    product: &Product,
    variant: &Variant,
    obs: &VariantObservation,
    price_delta: &PriceDelta,
    stock_delta: &StockDelta,
    now: DateTime<Utc>,
) -> Result<usize> {
    let items = tracking::list_active_for_variant(conn, &variant.id).await?;
    if items.is_empty() {
        return Ok(0);
    }

    let ctx = NotificationContext {
        product_name: product.name.as_deref().unwrap_or(&product.url),
        url: variant.variant_url.as_deref().unwrap_or(&product.url),
        currency: variant.currency.as_deref(),
        confidence: obs.confidence,
    };

    let mut created = 0;
    for mut item in items {
        let fired = notifications::decide(&item, price_delta, stock_delta, &ctx);
        for notification in &fired {
            tracking::insert_notification(conn, notification).await?;
        }
        if !fired.is_empty() {
            item.last_notified_at = Some(now);
        }
        item.record_check(obs.price, obs.status, now);
        tracking::update(conn, &item).await?;
        created += fired.len();
    }

    Ok(created)
}
