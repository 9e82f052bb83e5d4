use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::Result;
use crate::models::{Notification, NotificationKind, TrackedItem};

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Option<Decimal>> {
    let raw: Option<String> = row.try_get(column)?;
    Ok(raw.as_deref().and_then(|s| Decimal::from_str(s).ok()))
}

fn map_row(row: &SqliteRow) -> Result<TrackedItem> {
    Ok(TrackedItem {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        variant_id: row.try_get("variant_id")?,
        target_price: decimal_column(row, "target_price")?,
        notify_on_price_drop: row.try_get("notify_on_price_drop")?,
        price_drop_percent: row.try_get("price_drop_percent")?,
        notify_on_back_in_stock: row.try_get("notify_on_back_in_stock")?,
        notify_on_any_stock_change: row.try_get("notify_on_any_stock_change")?,
        active: row.try_get("active")?,
        last_notified_at: row.try_get("last_notified_at")?,
        last_alerted_at: row.try_get("last_alerted_at")?,
        last_checked_at: row.try_get("last_checked_at")?,
        last_price: decimal_column(row, "last_price")?,
        last_stock_status: row.try_get("last_stock_status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, item: &TrackedItem) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracked_items
            (id, user_id, variant_id, target_price, notify_on_price_drop,
             price_drop_percent, notify_on_back_in_stock,
             notify_on_any_stock_change, active, last_notified_at,
             last_alerted_at, last_checked_at, last_price, last_stock_status,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.id)
    .bind(&item.user_id)
    .bind(&item.variant_id)
    .bind(item.target_price.map(|p| p.to_string()))
    .bind(item.notify_on_price_drop)
    .bind(item.price_drop_percent)
    .bind(item.notify_on_back_in_stock)
    .bind(item.notify_on_any_stock_change)
    .bind(item.active)
    .bind(item.last_notified_at)
    .bind(item.last_alerted_at)
    .bind(item.last_checked_at)
    .bind(item.last_price.map(|p| p.to_string()))
    .bind(item.last_stock_status)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, item: &TrackedItem) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tracked_items SET
            target_price = ?,
            notify_on_price_drop = ?,
            price_drop_percent = ?,
            notify_on_back_in_stock = ?,
            notify_on_any_stock_change = ?,
            active = ?,
            last_notified_at = ?,
            last_alerted_at = ?,
            last_checked_at = ?,
            last_price = ?,
            last_stock_status = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(item.target_price.map(|p| p.to_string()))
    .bind(item.notify_on_price_drop)
    .bind(item.price_drop_percent)
    .bind(item.notify_on_back_in_stock)
    .bind(item.notify_on_any_stock_change)
    .bind(item.active)
    .bind(item.last_notified_at)
    .bind(item.last_alerted_at)
    .bind(item.last_checked_at)
    .bind(item.last_price.map(|p| p.to_string()))
    .bind(item.last_stock_status)
    .bind(item.updated_at)
    .bind(&item.id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<TrackedItem>> {
    let row = sqlx::query("SELECT * FROM tracked_items WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(map_row).transpose()
}

pub async fn find_by_user_and_variant(
    conn: &mut SqliteConnection,
    user_id: &str,
    variant_id: &str,
) -> Result<Option<TrackedItem>> {
    let row = sqlx::query("SELECT * FROM tracked_items WHERE user_id = ? AND variant_id = ?")
        .bind(user_id)
        .bind(variant_id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(map_row).transpose()
}

pub async fn list_active_for_variant(
    conn: &mut SqliteConnection,
    variant_id: &str,
) -> Result<Vec<TrackedItem>> {
    let rows = sqlx::query(
        "SELECT * FROM tracked_items WHERE variant_id = ? AND active = 1 ORDER BY created_at",
    )
    .bind(variant_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(map_row).collect()
}

pub async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &Notification,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications
            (id, tracked_item_id, user_id, variant_id, kind, title, body,
             metadata_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&notification.id)
    .bind(&notification.tracked_item_id)
    .bind(&notification.user_id)
    .bind(&notification.variant_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(&notification.metadata_json)
    .bind(notification.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn list_notifications(
    conn: &mut SqliteConnection,
    tracked_item_id: &str,
) -> Result<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE tracked_item_id = ? ORDER BY created_at, rowid",
    )
    .bind(tracked_item_id)
    .fetch_all(conn)
    .await?;

    Ok(notifications)
}

/// Counts rows of one kind written since a cutoff, the secondary guard the
/// alert gate consults beside `last_alerted_at`.
pub async fn count_recent_notifications(
    conn: &mut SqliteConnection,
    tracked_item_id: &str,
    kind: NotificationKind,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE tracked_item_id = ? AND kind = ? AND created_at >= ?
        "#,
    )
    .bind(tracked_item_id)
    .bind(kind)
    .bind(since)
    .fetch_one(conn)
    .await?;

    Ok(count)
}
