use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::Result;
use crate::models::{StockCheck, VariantPriceHistory, VariantStockHistory};

pub async fn append_price(conn: &mut SqliteConnection, row: &VariantPriceHistory) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO variant_price_history (id, variant_id, price, currency, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.variant_id)
    .bind(row.price.to_string())
    .bind(&row.currency)
    .bind(row.recorded_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn append_stock(conn: &mut SqliteConnection, row: &VariantStockHistory) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO variant_stock_history (id, variant_id, status, quantity, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.variant_id)
    .bind(row.status)
    .bind(row.quantity)
    .bind(row.recorded_at)
    .execute(conn)
    .await?;

    Ok(())
}

fn map_price_row(row: &SqliteRow) -> Result<VariantPriceHistory> {
    let raw_price: String = row.try_get("price")?;
    Ok(VariantPriceHistory {
        id: row.try_get("id")?,
        variant_id: row.try_get("variant_id")?,
        price: Decimal::from_str(&raw_price).map_err(|e| crate::AppError::Parse {
            message: format!("bad stored price '{raw_price}': {e}"),
        })?,
        currency: row.try_get("currency")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

pub async fn latest_price(
    conn: &mut SqliteConnection,
    variant_id: &str,
) -> Result<Option<VariantPriceHistory>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM variant_price_history
        WHERE variant_id = ?
        ORDER BY recorded_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(variant_id)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(map_price_row).transpose()
}

pub async fn latest_stock(
    conn: &mut SqliteConnection,
    variant_id: &str,
) -> Result<Option<VariantStockHistory>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM variant_stock_history
        WHERE variant_id = ?
        ORDER BY recorded_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(variant_id)
    .fetch_optional(conn)
    .await?;

    row.map(|r| {
        Ok(VariantStockHistory {
            id: r.try_get("id")?,
            variant_id: r.try_get("variant_id")?,
            status: r.try_get("status")?,
            quantity: r.try_get("quantity")?,
            recorded_at: r.try_get("recorded_at")?,
        })
    })
    .transpose()
}

pub async fn price_history_count(conn: &mut SqliteConnection, variant_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM variant_price_history WHERE variant_id = ?",
    )
    .bind(variant_id)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

pub async fn stock_history_count(conn: &mut SqliteConnection, variant_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM variant_stock_history WHERE variant_id = ?",
    )
    .bind(variant_id)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

pub async fn insert_check(conn: &mut SqliteConnection, check: &StockCheck) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_checks
            (id, variant_id, outcome, status, price, confidence, strategy, reason, checked_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&check.id)
    .bind(&check.variant_id)
    .bind(check.outcome)
    .bind(check.status)
    .bind(check.price.map(|p| p.to_string()))
    .bind(check.confidence)
    .bind(&check.strategy)
    .bind(&check.reason)
    .bind(check.checked_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn check_count(conn: &mut SqliteConnection, variant_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM stock_checks WHERE variant_id = ?")
        .bind(variant_id)
        .fetch_one(conn)
        .await?;

    Ok(count)
}
