use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::Result;
use crate::models::{AttributeSet, Variant, is_attribute_superset};

// Decimal columns are stored as TEXT to keep exact money values; the
// sqlite driver has no native Decimal mapping.
fn decimal_column(row: &SqliteRow, column: &str) -> Result<Option<Decimal>> {
    let raw: Option<String> = row.try_get(column)?;
    Ok(raw.as_deref().and_then(|s| Decimal::from_str(s).ok()))
}

fn map_row(row: &SqliteRow) -> Result<Variant> {
    Ok(Variant {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        sku: row.try_get("sku")?,
        attributes_json: row.try_get("attributes_json")?,
        variant_url: row.try_get("variant_url")?,
        currency: row.try_get("currency")?,
        current_price: decimal_column(row, "current_price")?,
        previous_price: decimal_column(row, "previous_price")?,
        discount_percent: row.try_get("discount_percent")?,
        current_stock_status: row.try_get("current_stock_status")?,
        previous_stock_status: row.try_get("previous_stock_status")?,
        is_available: row.try_get("is_available")?,
        last_checked_at: row.try_get("last_checked_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, variant: &Variant) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO variants
            (id, product_id, sku, attributes_json, variant_url, currency,
             current_price, previous_price, discount_percent,
             current_stock_status, previous_stock_status, is_available,
             last_checked_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&variant.id)
    .bind(&variant.product_id)
    .bind(&variant.sku)
    .bind(&variant.attributes_json)
    .bind(&variant.variant_url)
    .bind(&variant.currency)
    .bind(variant.current_price.map(|p| p.to_string()))
    .bind(variant.previous_price.map(|p| p.to_string()))
    .bind(variant.discount_percent)
    .bind(variant.current_stock_status)
    .bind(variant.previous_stock_status)
    .bind(variant.is_available)
    .bind(variant.last_checked_at)
    .bind(variant.created_at)
    .bind(variant.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Writes the full mutable state of a variant row: the denormalized
/// price/stock snapshot plus SKU and URL backfills.
pub async fn update(conn: &mut SqliteConnection, variant: &Variant) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE variants SET
            sku = ?,
            variant_url = ?,
            currency = ?,
            current_price = ?,
            previous_price = ?,
            discount_percent = ?,
            current_stock_status = ?,
            previous_stock_status = ?,
            is_available = ?,
            last_checked_at = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&variant.sku)
    .bind(&variant.variant_url)
    .bind(&variant.currency)
    .bind(variant.current_price.map(|p| p.to_string()))
    .bind(variant.previous_price.map(|p| p.to_string()))
    .bind(variant.discount_percent)
    .bind(variant.current_stock_status)
    .bind(variant.previous_stock_status)
    .bind(variant.is_available)
    .bind(variant.last_checked_at)
    .bind(variant.updated_at)
    .bind(&variant.id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Variant>> {
    let row = sqlx::query("SELECT * FROM variants WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(map_row).transpose()
}

pub async fn list_by_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> Result<Vec<Variant>> {
    let rows = sqlx::query("SELECT * FROM variants WHERE product_id = ? ORDER BY created_at")
        .bind(product_id)
        .fetch_all(conn)
        .await?;

    rows.iter().map(map_row).collect()
}

/// Distinct variant ids with at least one active tracked item, the working
/// set for a scheduled sweep.
pub async fn list_tracked_ids(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar(
        "SELECT DISTINCT variant_id FROM tracked_items WHERE active = 1 ORDER BY variant_id",
    )
    .fetch_all(conn)
    .await?;

    Ok(ids)
}

/// Re-identifies an extracted variant among a product's stored rows:
/// exact attribute-set equality first, then rows whose stored set the
/// extracted one extends, then SKU equality. First hit wins.
pub async fn find_matching(
    conn: &mut SqliteConnection,
    product_id: &str,
    attributes: &AttributeSet,
    sku: Option<&str>,
) -> Result<Option<Variant>> {
    let candidates = list_by_product(conn, product_id).await?;
    Ok(match_variant(&candidates, attributes, sku).cloned())
}

pub fn match_variant<'a>(
    candidates: &'a [Variant],
    attributes: &AttributeSet,
    sku: Option<&str>,
) -> Option<&'a Variant> {
    match_variant_index(candidates, attributes, sku).map(|idx| &candidates[idx])
}

pub fn match_variant_index(
    candidates: &[Variant],
    attributes: &AttributeSet,
    sku: Option<&str>,
) -> Option<usize> {
    if let Some(exact) = candidates
        .iter()
        .position(|v| &v.attributes() == attributes)
    {
        return Some(exact);
    }
    // An attribute-less stored row (the default variant of a page that once
    // yielded no variants) is a subset of anything, so the first richer
    // extraction adopts it here.
    if let Some(superset) = candidates
        .iter()
        .position(|v| is_attribute_superset(attributes, &v.attributes()))
    {
        return Some(superset);
    }

    if let Some(sku) = sku {
        return candidates
            .iter()
            .position(|v| v.sku.as_deref() == Some(sku));
    }

    None
}
