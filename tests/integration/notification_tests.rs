//! Notification rules exercised through real checks: drop thresholds,
//! target prices, and the stock transition matrix.

use super::*;

use shelfwatch::ingest::IngestService;
use shelfwatch::models::{CheckOutcome, NotificationKind};
use shelfwatch::storage::variants;

async fn seed_variant(db: &Database, markup: &str) -> String {
    let outcome = IngestService::new(db.clone())
        .ingest(&shell_for(PRODUCT_URL, markup), PRODUCT_URL)
        .await
        .expect("seed ingest");
    outcome.variants[0].id.clone()
}

async fn kinds_for(db: &Database, item_id: &str) -> Vec<NotificationKind> {
    let mut conn = db.acquire().await.expect("acquire");
    tracking::list_notifications(&mut conn, item_id)
        .await
        .expect("list notifications")
        .into_iter()
        .map(|n| n.kind)
        .collect()
}

#[tokio::test]
async fn test_drop_percent_threshold_gates_per_item() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, &product_page("Widget", "100.00", "InStock")).await;

    let mut eager = new_item("alice", &variant_id);
    eager.price_drop_percent = Some(10.0);
    let eager = insert_item(&db, eager).await;

    let mut patient = new_item("bob", &variant_id);
    patient.price_drop_percent = Some(25.0);
    let patient = insert_item(&db, patient).await;

    let service = tracking_service(
        &db,
        StubFetcher::new()
            .serve(PRODUCT_URL, &product_page("Widget", "100.00", "InStock"))
            .serve(PRODUCT_URL, &product_page("Widget", "80.00", "InStock")),
        Arc::new(RecordingAlertSink::new()),
    );

    // Same price again: a 0% move fires for nobody
    let unchanged = service.track_variant(&variant_id).await?;
    assert_eq!(unchanged.notifications_created, 0);

    // 100 -> 80 is a 20% drop: above alice's 10%, below bob's 25%
    let dropped = service.track_variant(&variant_id).await?;
    assert_eq!(dropped.notifications_created, 1);

    assert_eq!(kinds_for(&db, &eager.id).await, vec![NotificationKind::PriceDrop]);
    assert!(kinds_for(&db, &patient.id).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_target_price_fires_without_drop_opt_in() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, &product_page("Widget", "100.00", "InStock")).await;

    let mut wanted = new_item("alice", &variant_id);
    wanted.notify_on_price_drop = Some(false);
    wanted.target_price = Some(dec("90.00"));
    let wanted = insert_item(&db, wanted).await;

    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "85.00", "InStock")),
        Arc::new(RecordingAlertSink::new()),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.notifications_created, 1);
    assert_eq!(kinds_for(&db, &wanted.id).await, vec![NotificationKind::ThresholdMet]);
    Ok(())
}

#[tokio::test]
async fn test_target_price_fires_on_first_observation() -> anyhow::Result<()> {
    let db = test_db().await;
    // The page never exposed a price before
    let no_price = r#"<html><head><title>Widget</title>
    <meta property="og:title" content="Widget">
    <script type="application/ld+json">
    {"@type":"Product","name":"Widget","offers":{"availability":"https://schema.org/InStock"}}
    </script></head><body><h1>Widget</h1></body></html>"#;
    let variant_id = seed_variant(&db, no_price).await;

    let mut wanted = new_item("alice", &variant_id);
    wanted.notify_on_price_drop = Some(false);
    wanted.target_price = Some(dec("50.00"));
    let wanted = insert_item(&db, wanted).await;

    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "45.00", "InStock")),
        Arc::new(RecordingAlertSink::new()),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.notifications_created, 1);
    assert_eq!(kinds_for(&db, &wanted.id).await, vec![NotificationKind::ThresholdMet]);
    Ok(())
}

#[tokio::test]
async fn test_target_price_does_not_refire_while_unchanged() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, &product_page("Widget", "100.00", "InStock")).await;

    let mut wanted = new_item("alice", &variant_id);
    wanted.target_price = Some(dec("90.00"));
    let wanted = insert_item(&db, wanted).await;

    let page = product_page("Widget", "85.00", "InStock");
    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &page),
        Arc::new(RecordingAlertSink::new()),
    );

    let first = service.track_variant(&variant_id).await?;
    // 15% drop with a 0% threshold plus the target: both rules fire once
    assert_eq!(first.notifications_created, 2);

    let second = service.track_variant(&variant_id).await?;
    assert_eq!(second.notifications_created, 0);

    let kinds = kinds_for(&db, &wanted.id).await;
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&NotificationKind::PriceDrop));
    assert!(kinds.contains(&NotificationKind::ThresholdMet));
    Ok(())
}

#[tokio::test]
async fn test_stock_transition_matrix() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, &product_page("Widget", "49.99", "InStock")).await;

    let mut chatty = new_item("alice", &variant_id);
    chatty.notify_on_any_stock_change = Some(true);
    let chatty = insert_item(&db, chatty).await;

    let service = tracking_service(
        &db,
        StubFetcher::new()
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "LimitedAvailability"))
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock"))
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "OutOfStock"))
            .serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock")),
        Arc::new(RecordingAlertSink::new()),
    );

    // in_stock -> low_stock -> in_stock -> out_of_stock -> in_stock
    for _ in 0..4 {
        service.track_variant(&variant_id).await?;
    }

    // Low-to-in was already orderable, so it stays a plain stock change;
    // only the out-to-in transition is a back-in-stock, and it suppresses
    // the generic stock change row for the same check.
    assert_eq!(
        kinds_for(&db, &chatty.id).await,
        vec![
            NotificationKind::StockChange,
            NotificationKind::StockChange,
            NotificationKind::StockChange,
            NotificationKind::BackInStock,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_first_stock_observation_can_be_a_restock() -> anyhow::Result<()> {
    let db = test_db().await;
    // Price-only page: the variant has no stock history at all
    let price_only = r#"<html><head><title>Widget</title>
    <meta property="og:title" content="Widget">
    <script type="application/json">{"price":"49.99","price_currency":"USD"}</script>
    </head><body><h1>Widget</h1><p>A minimalist desk widget.</p></body></html>"#;
    let variant_id = seed_variant(&db, price_only).await;
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let sink = Arc::new(RecordingAlertSink::new());
    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "49.99", "InStock")),
        sink.clone(),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.notifications_created, 1);
    assert_eq!(result.alerts_sent, 1);
    assert_eq!(kinds_for(&db, &item.id).await, vec![NotificationKind::BackInStock]);
    Ok(())
}

#[tokio::test]
async fn test_price_increase_fires_nothing() -> anyhow::Result<()> {
    let db = test_db().await;
    let variant_id = seed_variant(&db, &product_page("Widget", "100.00", "InStock")).await;
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let service = tracking_service(
        &db,
        StubFetcher::new().serve(PRODUCT_URL, &product_page("Widget", "120.00", "InStock")),
        Arc::new(RecordingAlertSink::new()),
    );

    let result = service.track_variant(&variant_id).await?;
    assert_eq!(result.outcome, CheckOutcome::Changed);
    assert_eq!(result.notifications_created, 0);
    assert!(kinds_for(&db, &item.id).await.is_empty());

    // The increase still lands in history and the snapshot
    let mut conn = db.acquire().await?;
    let variant = variants::find_by_id(&mut conn, &variant_id).await?.unwrap();
    assert_eq!(variant.current_price, Some(dec("120.00")));
    assert_eq!(variant.discount_percent, None);
    Ok(())
}
