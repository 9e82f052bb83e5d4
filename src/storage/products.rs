use sqlx::SqliteConnection;

use crate::Result;
use crate::models::Product;

pub async fn insert(conn: &mut SqliteConnection, product: &Product) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products
            (id, url, canonical_url, name, vendor, main_image_url,
             metadata_json, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&product.id)
    .bind(&product.url)
    .bind(&product.canonical_url)
    .bind(&product.name)
    .bind(&product.vendor)
    .bind(&product.main_image_url)
    .bind(&product.metadata_json)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, product: &Product) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE products SET
            canonical_url = ?,
            name = ?,
            vendor = ?,
            main_image_url = ?,
            metadata_json = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&product.canonical_url)
    .bind(&product.name)
    .bind(&product.vendor)
    .bind(&product.main_image_url)
    .bind(&product.metadata_json)
    .bind(product.updated_at)
    .bind(&product.id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(product)
}

/// Looks a product up by its fetch URL or by the canonical URL a previous
/// extraction recorded, so the same page reached through either address
/// resolves to one row.
pub async fn find_by_url(conn: &mut SqliteConnection, url: &str) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE url = ? OR canonical_url = ? LIMIT 1",
    )
    .bind(url)
    .bind(url)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}
