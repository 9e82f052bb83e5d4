//! Ingestion pipeline: product upsert, variant identity across passes, and
//! history-on-change idempotence.

use super::*;

use shelfwatch::ingest::IngestService;
use shelfwatch::models::{NotificationKind, StockStatus};
use shelfwatch::storage::{history, variants};

#[tokio::test]
async fn test_first_ingest_creates_product_variant_and_history() -> anyhow::Result<()> {
    let db = test_db().await;
    let page = product_page("Widget", "49.99", "InStock");
    let shell = shell_for(PRODUCT_URL, &page);

    let outcome = IngestService::new(db.clone()).ingest(&shell, PRODUCT_URL).await?;

    assert_eq!(outcome.product.name.as_deref(), Some("Widget"));
    assert_eq!(outcome.product.url, PRODUCT_URL);
    assert_eq!(outcome.variants.len(), 1);
    assert_eq!(outcome.notifications_created, 0);

    let variant = &outcome.variants[0];
    assert!(variant.attributes().is_empty());
    assert_eq!(variant.current_price, Some(dec("49.99")));
    assert_eq!(variant.previous_price, None);
    assert_eq!(variant.currency.as_deref(), Some("USD"));
    assert_eq!(variant.current_stock_status, Some(StockStatus::InStock));
    assert!(variant.is_available);
    assert!(variant.last_checked_at.is_some());

    let mut conn = db.acquire().await?;
    assert_eq!(history::price_history_count(&mut conn, &variant.id).await?, 1);
    assert_eq!(history::stock_history_count(&mut conn, &variant.id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_reingesting_identical_page_is_idempotent() -> anyhow::Result<()> {
    let db = test_db().await;
    let page = product_page("Widget", "49.99", "InStock");
    let service = IngestService::new(db.clone());

    let first = service
        .ingest(&shell_for(PRODUCT_URL, &page), PRODUCT_URL)
        .await?;
    let variant_id = first.variants[0].id.clone();

    // A watcher signed up between the two passes must stay silent too
    let item = insert_item(&db, new_item("alice", &variant_id)).await;

    let second = service
        .ingest(&shell_for(PRODUCT_URL, &page), PRODUCT_URL)
        .await?;

    assert_eq!(second.product.id, first.product.id);
    assert_eq!(second.variants.len(), 1);
    assert_eq!(second.variants[0].id, variant_id);
    assert_eq!(second.notifications_created, 0);

    let mut conn = db.acquire().await?;
    assert_eq!(history::price_history_count(&mut conn, &variant_id).await?, 1);
    assert_eq!(history::stock_history_count(&mut conn, &variant_id).await?, 1);
    assert!(tracking::list_notifications(&mut conn, &item.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_price_change_appends_history_and_shifts_snapshot() -> anyhow::Result<()> {
    let db = test_db().await;
    let service = IngestService::new(db.clone());

    let first = service
        .ingest(
            &shell_for(PRODUCT_URL, &product_page("Widget", "100.00", "InStock")),
            PRODUCT_URL,
        )
        .await?;
    let variant_id = first.variants[0].id.clone();

    let second = service
        .ingest(
            &shell_for(PRODUCT_URL, &product_page("Widget", "80.00", "InStock")),
            PRODUCT_URL,
        )
        .await?;

    let variant = &second.variants[0];
    assert_eq!(variant.id, variant_id);
    assert_eq!(variant.current_price, Some(dec("80.00")));
    assert_eq!(variant.previous_price, Some(dec("100.00")));
    assert!(variant.discount_percent.is_some_and(|p| (p - 20.0).abs() < 0.01));

    let mut conn = db.acquire().await?;
    assert_eq!(history::price_history_count(&mut conn, &variant_id).await?, 2);
    let latest = history::latest_price(&mut conn, &variant_id).await?.unwrap();
    assert_eq!(latest.price, dec("80.00"));
    // The stock row did not change, so no second stock entry
    assert_eq!(history::stock_history_count(&mut conn, &variant_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_price_drop_notifies_watchers_during_ingest() -> anyhow::Result<()> {
    let db = test_db().await;
    let service = IngestService::new(db.clone());

    let first = service
        .ingest(
            &shell_for(PRODUCT_URL, &product_page("Widget", "100.00", "InStock")),
            PRODUCT_URL,
        )
        .await?;
    let item = insert_item(&db, new_item("alice", &first.variants[0].id)).await;

    let second = service
        .ingest(
            &shell_for(PRODUCT_URL, &product_page("Widget", "80.00", "InStock")),
            PRODUCT_URL,
        )
        .await?;

    assert_eq!(second.notifications_created, 1);

    let mut conn = db.acquire().await?;
    let rows = tracking::list_notifications(&mut conn, &item.id).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, NotificationKind::PriceDrop);
    assert!(rows[0].body.contains("80"));

    let reloaded = tracking::find_by_id(&mut conn, &item.id).await?.unwrap();
    assert!(reloaded.last_notified_at.is_some());
    assert_eq!(reloaded.last_price, Some(dec("80.00")));
    Ok(())
}

#[tokio::test]
async fn test_richer_attribute_set_rematches_stored_variant() -> anyhow::Result<()> {
    let db = test_db().await;
    let service = IngestService::new(db.clone());

    // First pass knows only the size of each variant
    let sparse = r#"<html><head><title>Widget</title>
    <script type="application/json">
    {"variants":[{"sku":"W-M","size":"M"},{"sku":"W-L","size":"L"}]}
    </script></head><body></body></html>"#;
    let first = service
        .ingest(&shell_for(PRODUCT_URL, sparse), PRODUCT_URL)
        .await?;
    assert_eq!(first.variants.len(), 2);
    let mut first_ids: Vec<String> = first.variants.iter().map(|v| v.id.clone()).collect();
    first_ids.sort();

    // Second pass adds a color to every variant; identity must hold
    let rich = r#"<html><head><title>Widget</title>
    <script type="application/json">
    {"variants":[
        {"sku":"W-M","size":"M","color":"Black","price":"20.00","in_stock":true},
        {"sku":"W-L","size":"L","color":"Black","price":"22.00","in_stock":true}
    ]}
    </script></head><body></body></html>"#;
    let second = service
        .ingest(&shell_for(PRODUCT_URL, rich), PRODUCT_URL)
        .await?;

    assert_eq!(second.variants.len(), 2);
    let mut second_ids: Vec<String> = second.variants.iter().map(|v| v.id.clone()).collect();
    second_ids.sort();
    assert_eq!(second_ids, first_ids);

    // Stored attribute sets keep their original shape
    let mut conn = db.acquire().await?;
    let stored = variants::list_by_product(&mut conn, &second.product.id).await?;
    assert_eq!(stored.len(), 2);
    for variant in &stored {
        assert_eq!(variant.attributes().len(), 1);
        assert!(variant.attributes().contains_key("size"));
    }
    Ok(())
}

#[tokio::test]
async fn test_default_variant_adopted_by_first_richer_extraction() -> anyhow::Result<()> {
    let db = test_db().await;
    let service = IngestService::new(db.clone());

    // A page that yields no variants gets one attribute-less default row
    let first = service
        .ingest(
            &shell_for(PRODUCT_URL, &product_page("Widget", "49.99", "InStock")),
            PRODUCT_URL,
        )
        .await?;
    let default_id = first.variants[0].id.clone();

    let rich = r#"<html><head><title>Widget</title>
    <script type="application/json">
    {"variants":[
        {"sku":"W-M","size":"M","price":"20.00","in_stock":true},
        {"sku":"W-L","size":"L","price":"22.00","in_stock":true}
    ]}
    </script></head><body></body></html>"#;
    let second = service
        .ingest(&shell_for(PRODUCT_URL, rich), PRODUCT_URL)
        .await?;

    // The first observation adopted the default row instead of duplicating it
    assert_eq!(second.variants.len(), 2);
    assert_eq!(second.variants[0].id, default_id);
    assert_ne!(second.variants[1].id, default_id);

    let mut conn = db.acquire().await?;
    let adopted = variants::find_by_id(&mut conn, &default_id).await?.unwrap();
    assert_eq!(adopted.sku.as_deref(), Some("W-M"));
    assert!(adopted.attributes().is_empty());
    assert_eq!(history::price_history_count(&mut conn, &default_id).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_product_upsert_matches_on_canonical_url() -> anyhow::Result<()> {
    let db = test_db().await;
    let service = IngestService::new(db.clone());
    let canonical = "https://shop.example/products/widget";
    let tagged_a = "https://shop.example/products/widget?utm_source=mail";
    let tagged_b = "https://shop.example/products/widget?ref=feed";

    let first = service
        .ingest(
            &shell_for(tagged_a, &page_with_canonical("Widget", "49.99", "InStock", canonical)),
            tagged_a,
        )
        .await?;
    let second = service
        .ingest(
            &shell_for(tagged_b, &page_with_canonical("Widget", "49.99", "InStock", canonical)),
            tagged_b,
        )
        .await?;

    assert_eq!(second.product.id, first.product.id);
    assert_eq!(second.variants.len(), 1);
    assert_eq!(second.variants[0].id, first.variants[0].id);
    Ok(())
}
