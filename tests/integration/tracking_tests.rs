//! Tracking cycle: load, fetch, extract, persist, notify. Fetches are
//! stubbed; everything downstream is the real pipeline.

use super::*;

use shelfwatch::AppError;
use shelfwatch::ingest::IngestService;
use shelfwatch::models::{CheckOutcome, StockStatus};
use shelfwatch::storage::{history, variants};
use shelfwatch::tracker::CheckNowOutcome;

/// Ingests the page once so a product and variant exist to track.
async fn seed_variant(db: &Database, url: &str, markup: &str) -> String {
    let outcome = IngestService::new(db.clone())
        .ingest(&shell_for(url, markup), url)
        .await
        .expect("seed ingest");
    outcome.variants[0].id.clone()
}

#[tokio::test]
async fn test_check_detects_price_change() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "100.00", "InStock")).await;
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let sink = Arc::new(RecordingAlertSink::new());
    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "80.00", "InStock")),
        sink.clone(),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.outcome, CheckOutcome::Changed);
    assert_eq!(result.price_delta.old, Some(dec("100.00")));
    assert_eq!(result.price_delta.new, Some(dec("80.00")));
    assert_eq!(result.notifications_created, 1);
    assert_eq!(result.tracked_items_updated, 1);
    assert_eq!(result.alerts_sent, 0);
    assert!(sink.sent().is_empty());

    let mut conn = db.acquire().await?;
    let variant = variants::find_by_id(&mut conn, &variant_id).await?.unwrap();
    assert_eq!(variant.current_price, Some(dec("80.00")));
    assert_eq!(variant.previous_price, Some(dec("100.00")));
    assert_eq!(history::price_history_count(&mut conn, &variant_id).await?, 2);
    assert_eq!(history::check_count(&mut conn, &variant_id).await?, 1);

    let reloaded = tracking::find_by_id(&mut conn, &item.id).await?.unwrap();
    assert_eq!(reloaded.last_price, Some(dec("80.00")));
    assert!(reloaded.last_notified_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_unchanged_page_records_check_and_nothing_else() -> anyhow::Result<()> {
    let db = test_db().await;
    let page = product_page("Widget", "100.00", "InStock");
    let variant_id = seed_variant(&db, PRODUCT_URL, &page).await;
    insert_item(&db, new_item("alice", &variant_id)).await;

    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &page),
        Arc::new(RecordingAlertSink::new()),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.outcome, CheckOutcome::Unchanged);
    assert_eq!(result.notifications_created, 0);

    let mut conn = db.acquire().await?;
    assert_eq!(history::price_history_count(&mut conn, &variant_id).await?, 1);
    assert_eq!(history::stock_history_count(&mut conn, &variant_id).await?, 1);
    assert_eq!(history::check_count(&mut conn, &variant_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_persist() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "49.99", "InStock")).await;

    let before = {
        let mut conn = db.acquire().await?;
        variants::find_by_id(&mut conn, &variant_id).await?.unwrap()
    };

    let service = tracking_service(
        &db,
        StubFetcher::new().fail(PRODUCT_URL, "HTTP 503"),
        Arc::new(RecordingAlertSink::new()),
    );

    let result = service.track_variant(&variant_id).await;
    assert!(matches!(result, Err(AppError::Fetch { .. })));

    // Nothing was written: no audit row, timestamps untouched
    let mut conn = db.acquire().await?;
    assert_eq!(history::check_count(&mut conn, &variant_id).await?, 0);
    let after = variants::find_by_id(&mut conn, &variant_id).await?.unwrap();
    assert_eq!(after.last_checked_at, before.last_checked_at);
    assert_eq!(after.current_price, before.current_price);
    Ok(())
}

#[tokio::test]
async fn test_empty_extraction_keeps_last_known_state() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "49.99", "InStock")).await;
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let before = {
        let mut conn = db.acquire().await?;
        variants::find_by_id(&mut conn, &variant_id).await?.unwrap()
    };

    // The page came back but carries no price or stock signal at all
    let blank = "<html><head><title>Widget</title></head><body><p>Maintenance.</p></body></html>";
    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, blank),
        Arc::new(RecordingAlertSink::new()),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.outcome, CheckOutcome::Empty);
    assert_eq!(result.notifications_created, 0);

    let mut conn = db.acquire().await?;
    let after = variants::find_by_id(&mut conn, &variant_id).await?.unwrap();
    assert_eq!(after.current_price, Some(dec("49.99")));
    assert_eq!(after.current_stock_status, Some(StockStatus::InStock));
    assert!(after.last_checked_at > before.last_checked_at);

    // The empty pass is still audited, but history gained nothing
    assert_eq!(history::check_count(&mut conn, &variant_id).await?, 1);
    assert_eq!(history::price_history_count(&mut conn, &variant_id).await?, 1);
    assert_eq!(history::stock_history_count(&mut conn, &variant_id).await?, 1);

    let reloaded = tracking::find_by_id(&mut conn, &item.id).await?.unwrap();
    assert!(reloaded.last_checked_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_back_in_stock_sends_one_alert() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "49.99", "OutOfStock")).await;
    insert_item(&db, new_item("alice", &variant_id)).await;

    let sink = Arc::new(RecordingAlertSink::new());
    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock")),
        sink.clone(),
    );

    let restocked = service.track_variant(&variant_id).await?;
    assert_eq!(restocked.outcome, CheckOutcome::Changed);
    assert_eq!(restocked.notifications_created, 1);
    assert_eq!(restocked.alerts_sent, 1);

    let alerts = sink.sent();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].product_name, "Widget");
    assert_eq!(alerts[0].url, PRODUCT_URL);
    assert_eq!(alerts[0].confidence, 90);

    // The same page again: no change, no new notification, no re-send
    let repeat = service.track_variant(&variant_id).await?;
    assert_eq!(repeat.outcome, CheckOutcome::Unchanged);
    assert_eq!(repeat.notifications_created, 0);
    assert_eq!(repeat.alerts_sent, 0);
    assert_eq!(sink.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_realert_suppressed_within_cooldown() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "49.99", "OutOfStock")).await;
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let sink = Arc::new(RecordingAlertSink::new());
    let service = tracking_service(
        &db,
        StubFetcher::new()
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock"))
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "OutOfStock"))
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock")),
        sink.clone(),
    );

    // Restock: alert goes out
    let first = service.track_variant(&variant_id).await?;
    assert_eq!(first.alerts_sent, 1);

    // Sells out again: stock change, but the item opted out of those
    let out = service.track_variant(&variant_id).await?;
    assert_eq!(out.outcome, CheckOutcome::Changed);
    assert_eq!(out.notifications_created, 0);

    // Restocks within the cooldown: the row is written, the alert is not
    let second = service.track_variant(&variant_id).await?;
    assert_eq!(second.notifications_created, 1);
    assert_eq!(second.alerts_sent, 0);
    assert_eq!(sink.sent().len(), 1);

    let mut conn = db.acquire().await?;
    let rows = tracking::list_notifications(&mut conn, &item.id).await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_low_confidence_restock_writes_row_but_not_alert() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "49.99", "OutOfStock")).await;
    insert_item(&db, new_item("alice", &variant_id)).await;

    // Free-text availability only, the lowest-trust extraction tier
    let vague =
        "<html><head><title>Widget</title></head><body><h1>Widget</h1><p>Good news, this item is in stock and shipping now.</p></body></html>";
    let sink = Arc::new(RecordingAlertSink::new());
    let service = tracking_service(&db, StubFetcher::new().serve(PRODUCT_URL, vague), sink.clone());

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.outcome, CheckOutcome::Changed);
    assert_eq!(result.notifications_created, 1);
    assert_eq!(result.alerts_sent, 0);
    assert!(sink.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_alert_delivery_does_not_roll_back() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, PRODUCT_URL, &product_page("Widget", "49.99", "OutOfStock")).await;
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let sink = Arc::new(RecordingAlertSink::failing());
    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock")),
        sink.clone(),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.notifications_created, 1);
    assert_eq!(result.alerts_sent, 0);
    assert_eq!(sink.sent().len(), 1);

    // State committed before delivery was attempted
    let mut conn = db.acquire().await?;
    let rows = tracking::list_notifications(&mut conn, &item.id).await?;
    assert_eq!(rows.len(), 1);
    let reloaded = tracking::find_by_id(&mut conn, &item.id).await?.unwrap();
    assert!(reloaded.last_alerted_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_check_now_is_rate_limited_per_user_and_variant() -> anyhow::Result<()> {
    let db = test_db().await;
    let page = product_page("Widget", "49.99", "InStock");
    let variant_id = seed_variant(&db, PRODUCT_URL, &page).await;

    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &page),
        Arc::new(RecordingAlertSink::new()),
    );

    let first = service.check_now("alice", &variant_id).await?;
    assert!(matches!(first, CheckNowOutcome::Checked(_)));

    let second = service.check_now("alice", &variant_id).await?;
    assert!(matches!(second, CheckNowOutcome::RateLimited));

    // A different user is not throttled by alice's check
    let other = service.check_now("bob", &variant_id).await?;
    assert!(matches!(other, CheckNowOutcome::Checked(_)));
    Ok(())
}

#[tokio::test]
async fn test_batch_continues_past_failures() -> anyhow::Result<()> {
    let db = test_db().await;
    let url_ok = "https://shop.example/products/widget";
    let url_down = "https://shop.example/products/gadget";
    let ok_id = seed_variant(&db, url_ok, &product_page("Widget", "49.99", "InStock")).await;
    let down_id = seed_variant(&db, url_down, &product_page("Gadget", "19.99", "InStock")).await;

    let service = tracking_service(
        &db,
        StubFetcher::new()
            .serve(url_ok, &product_page("Widget", "49.99", "InStock"))
            .fail(url_down, "HTTP 500"),
        Arc::new(RecordingAlertSink::new()),
    );

    let batch = service
        .track_variants(&[ok_id.clone(), down_id.clone()], 2)
        .await;
    assert_eq!(batch.total, 2);
    assert_eq!(batch.succeeded, 1);
    assert_eq!(batch.failed, 1);

    let down = batch.results.iter().find(|(id, _)| id == &down_id).unwrap();
    assert!(down.1.is_err());

    let mut conn = db.acquire().await?;
    assert_eq!(history::check_count(&mut conn, &ok_id).await?, 1);
    assert_eq!(history::check_count(&mut conn, &down_id).await?, 0);
    Ok(())
}
