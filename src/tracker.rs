use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use metrics::counter;

use crate::config::AppConfig;
use crate::extraction::ProductExtractor;
use crate::fetcher::PageFetcher;
use crate::ingest::{self, VariantObservation};
use crate::models::{
    AttributeSet, CheckOutcome, NotificationKind, Product, StockCheck, TrackedItem, Variant,
    is_attribute_superset,
};
use crate::notifications::{
    self, AlertGate, AlertSink, NotificationContext, PriceDelta, StockDelta, StockAlert,
};
use crate::ratelimit::CheckNowLimiter;
use crate::storage::{Database, history, products, tracking, variants};
use crate::{AppError, Result};

#[derive(Debug)]
pub struct VariantCheckResult {
    pub variant_id: String,
    pub outcome: CheckOutcome,
    pub price_delta: PriceDelta,
    pub stock_delta: StockDelta,
    pub notifications_created: usize,
    pub tracked_items_updated: usize,
    pub alerts_sent: usize,
}

#[derive(Debug)]
pub struct BatchCheckResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<(String, Result<VariantCheckResult>)>,
}

#[derive(Debug)]
pub enum CheckNowOutcome {
    Checked(Box<VariantCheckResult>),
    RateLimited,
}

/// Drives the per-variant check cycle: Load, Fetch+Extract, Diff, Persist,
/// Notify. One variant is one unit of work; a failure before Persist leaves
/// stored state untouched.
pub struct TrackingService {
    db: Database,
    fetcher: Arc<dyn PageFetcher>,
    alert_sink: Arc<dyn AlertSink>,
    extractor: ProductExtractor,
    limiter: CheckNowLimiter,
    alert_gate: AlertGate,
    concurrency: usize,
    recent_alert_window: Duration,
}

impl TrackingService {
    pub fn new(
        db: Database,
        fetcher: Arc<dyn PageFetcher>,
        alert_sink: Arc<dyn AlertSink>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            fetcher,
            alert_sink,
            extractor: ProductExtractor::new(&config.extraction),
            limiter: CheckNowLimiter::new(&config.tracking),
            alert_gate: AlertGate::new(&config.alerts),
            concurrency: config.tracking.concurrency,
            recent_alert_window: Duration::minutes(config.alerts.recent_window_minutes),
        }
    }

    pub async fn track_variant(&self, variant_id: &str) -> Result<VariantCheckResult> {
        counter!("shelfwatch_checks_total").increment(1);

        // Load, then release the connection before going to the network
        let (variant, product, items) = {
            let mut conn = self.db.acquire().await?;
            let variant = variants::find_by_id(&mut conn, variant_id)
                .await?
                .ok_or_else(|| AppError::NotFound {
                    resource: format!("variant {variant_id}"),
                })?;
            let product = products::find_by_id(&mut conn, &variant.product_id)
                .await?
                .ok_or_else(|| AppError::NotFound {
                    resource: format!("product {}", variant.product_id),
                })?;
            let items = tracking::list_active_for_variant(&mut conn, variant_id).await?;
            (variant, product, items)
        };

        let fetch = self.fetcher.fetch(&product.url).await?;
        if !fetch.success {
            counter!("shelfwatch_check_failures_total").increment(1);
            let message = fetch
                .error
                .unwrap_or_else(|| "fetch returned no markup".to_string());
            tracing::warn!("Fetch failed for {}: {}", product.url, message);
            return Err(AppError::Fetch {
                url: product.url.clone(),
                message,
            });
        }
        let markup = fetch.markup.unwrap_or_default();

        let shell = self.extractor.extract(&fetch.final_url, &markup)?;
        let observations = ingest::observations_from_shell(&shell);
        let observation = resolve_observation(&observations, &variant.attributes(), variant_id);

        let result = match observation {
            Some(obs) if obs.price.is_some() || obs.status.is_some() => {
                self.persist_check(variant, &product, items, obs).await?
            }
            _ => {
                tracing::warn!(
                    "Extraction for variant {} on {} produced no price or stock, keeping last-known state",
                    variant_id,
                    product.url
                );
                self.persist_empty_check(variant, items).await?
            }
        };

        if result.outcome == CheckOutcome::Changed {
            counter!("shelfwatch_changes_total").increment(1);
        }
        counter!("shelfwatch_notifications_total")
            .increment(result.notifications_created as u64);
        counter!("shelfwatch_alerts_total").increment(result.alerts_sent as u64);

        Ok(result)
    }

    /// Persist + Notify for a check that observed something. Everything up
    /// to the commit happens in one transaction; alert delivery follows the
    /// commit so a webhook hiccup can never roll back state.
    async fn persist_check(
        &self,
        mut variant: Variant,
        product: &Product,
        items: Vec<TrackedItem>,
        obs: &VariantObservation,
    ) -> Result<VariantCheckResult> {
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        if variant.sku.is_none() && obs.sku.is_some() {
            variant.sku = obs.sku.clone();
        }
        if variant.variant_url.is_none() && obs.variant_url.is_some() {
            variant.variant_url = obs.variant_url.clone();
        }

        let (price_delta, stock_delta) =
            ingest::apply_observation(&mut tx, &mut variant, obs, now).await?;
        variants::update(&mut *tx, &variant).await?;

        let outcome = if price_delta.changed() || stock_delta.changed() {
            CheckOutcome::Changed
        } else {
            CheckOutcome::Unchanged
        };

        let mut check = StockCheck::new(variant.id.clone(), outcome);
        check.status = obs.status;
        check.price = obs.price;
        check.confidence = obs.confidence;
        check.strategy = obs.strategy.clone();
        check.reason = obs.reason.clone();
        check.checked_at = now;
        history::insert_check(&mut *tx, &check).await?;

        let ctx = NotificationContext {
            product_name: product.name.as_deref().unwrap_or(&product.url),
            url: variant.variant_url.as_deref().unwrap_or(&product.url),
            currency: variant.currency.as_deref(),
            confidence: obs.confidence,
        };

        let tracked_items_updated = items.len();
        let mut notifications_created = 0;
        let mut pending_alerts = Vec::new();

        for mut item in items {
            let fired = notifications::decide(&item, &price_delta, &stock_delta, &ctx);

            let wants_alert = fired
                .iter()
                .any(|n| n.kind == NotificationKind::BackInStock);
            if wants_alert {
                // Count existing rows before this cycle's are inserted
                let recent = tracking::count_recent_notifications(
                    &mut *tx,
                    &item.id,
                    NotificationKind::BackInStock,
                    now - self.recent_alert_window,
                )
                .await?;
                if self
                    .alert_gate
                    .should_alert(&item, obs.confidence, recent, now)
                {
                    item.last_alerted_at = Some(now);
                    pending_alerts.push(StockAlert {
                        product_name: ctx.product_name.to_string(),
                        url: ctx.url.to_string(),
                        confidence: obs.confidence.unwrap_or(0),
                    });
                }
            }

            for notification in &fired {
                tracking::insert_notification(&mut *tx, notification).await?;
            }
            if !fired.is_empty() {
                item.last_notified_at = Some(now);
            }
            item.record_check(obs.price, obs.status, now);
            tracking::update(&mut *tx, &item).await?;
            notifications_created += fired.len();
        }

        tx.commit().await?;

        let mut alerts_sent = 0;
        for alert in &pending_alerts {
            if self.alert_sink.send(alert).await {
                alerts_sent += 1;
            } else {
                tracing::warn!("Alert delivery failed for {}", alert.url);
            }
        }

        tracing::debug!(
            "Checked variant {}: {}, {} notification(s), {} alert(s)",
            variant.id,
            outcome.as_str(),
            notifications_created,
            alerts_sent
        );

        Ok(VariantCheckResult {
            variant_id: variant.id,
            outcome,
            price_delta,
            stock_delta,
            notifications_created,
            tracked_items_updated,
            alerts_sent,
        })
    }

    /// An extraction that saw nothing still audits the attempt and advances
    /// the last-checked timestamps; stored values stay as they were.
    async fn persist_empty_check(
        &self,
        mut variant: Variant,
        items: Vec<TrackedItem>,
    ) -> Result<VariantCheckResult> {
        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;

        variant.mark_checked(now);
        variants::update(&mut *tx, &variant).await?;

        let mut check = StockCheck::new(variant.id.clone(), CheckOutcome::Empty);
        check.checked_at = now;
        history::insert_check(&mut *tx, &check).await?;

        let tracked_items_updated = items.len();
        for mut item in items {
            item.record_check(None, None, now);
            tracking::update(&mut *tx, &item).await?;
        }

        tx.commit().await?;

        Ok(VariantCheckResult {
            variant_id: variant.id,
            outcome: CheckOutcome::Empty,
            price_delta: PriceDelta::default(),
            stock_delta: StockDelta::default(),
            notifications_created: 0,
            tracked_items_updated,
            alerts_sent: 0,
        })
    }

    /// Checks variants in fixed-size concurrent batches. Every check in a
    /// batch is awaited before the next batch starts, and a failed check
    /// never cancels its batch-mates.
    pub async fn track_variants(&self, variant_ids: &[String], concurrency: usize) -> BatchCheckResult {
        let concurrency = concurrency.max(1);
        let mut results = Vec::with_capacity(variant_ids.len());

        for chunk in variant_ids.chunks(concurrency) {
            let checks: Vec<_> = chunk.iter().map(|id| self.track_variant(id)).collect();
            let settled = join_all(checks).await;
            for (id, result) in chunk.iter().zip(settled) {
                if let Err(e) = &result {
                    tracing::warn!("Check failed for variant {}: {}", id, e);
                }
                results.push((id.clone(), result));
            }
        }

        let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
        BatchCheckResult {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// One pass over every variant anyone actively tracks.
    pub async fn sweep(&self) -> Result<BatchCheckResult> {
        let ids = {
            let mut conn = self.db.acquire().await?;
            variants::list_tracked_ids(&mut conn).await?
        };
        tracing::info!("Sweeping {} tracked variant(s)", ids.len());
        Ok(self.track_variants(&ids, self.concurrency).await)
    }

    /// Manual user-facing path, rate limited per (user, variant) pair.
    pub async fn check_now(&self, user_id: &str, variant_id: &str) -> Result<CheckNowOutcome> {
        if !self.limiter.try_acquire(user_id, variant_id).await {
            tracing::debug!(
                "check_now rate limited for user {} variant {}",
                user_id,
                variant_id
            );
            return Ok(CheckNowOutcome::RateLimited);
        }

        let result = self.track_variant(variant_id).await?;
        Ok(CheckNowOutcome::Checked(Box::new(result)))
    }
}

/// Re-identifies the logical variant among fresh observations: exact
/// attribute match, then an observation extending the stored set, then the
/// first observation as a last resort.
fn resolve_observation<'a>(
    observations: &'a [VariantObservation],
    stored: &AttributeSet,
    variant_id: &str,
) -> Option<&'a VariantObservation> {
    if let Some(exact) = observations.iter().find(|o| &o.attributes == stored) {
        return Some(exact);
    }
    if let Some(superset) = observations
        .iter()
        .find(|o| is_attribute_superset(&o.attributes, stored))
    {
        return Some(superset);
    }
    tracing::debug!(
        "No attribute match for variant {} among {} observation(s), using the first",
        variant_id,
        observations.len()
    );
    observations.first()
}
