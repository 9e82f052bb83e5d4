//! Whole-page extraction: the three engines plus page metadata assembled
//! into one shell, including the caps and scrubbing applied at the seams.

use super::*;

use shelfwatch::config::ExtractionConfig;
use shelfwatch::models::StockStatus;

#[tokio::test]
async fn test_structured_page_extracts_everything() -> anyhow::Result<()> {
    let markup = r#"<html>
    <head>
        <meta property="og:title" content="Classic Tee">
        <meta property="og:site_name" content="Example Shop">
        <link rel="canonical" href="https://shop.example/products/classic-tee">
        <script type="application/ld+json">
        {"@type":"Product","name":"Classic Tee",
         "offers":[
            {"sku":"TEE-S","size":"S","price":"19.99","priceCurrency":"USD","availability":"https://schema.org/InStock"},
            {"sku":"TEE-M","size":"M","price":"19.99","priceCurrency":"USD","availability":"https://schema.org/OutOfStock"}
         ]}
        </script>
    </head>
    <body><h1>Classic Tee</h1></body>
    </html>"#;

    let shell = shell_for("https://shop.example/products/classic-tee?utm=x", markup);

    assert_eq!(shell.title.as_deref(), Some("Classic Tee"));
    assert_eq!(shell.vendor.as_deref(), Some("Example Shop"));
    assert_eq!(
        shell.canonical_url.as_deref(),
        Some("https://shop.example/products/classic-tee")
    );

    assert_eq!(shell.variants.len(), 2);
    assert_eq!(shell.variants[0].external_id.as_deref(), Some("TEE-S"));
    assert_eq!(
        shell.variants[0].attribute_set().get("size").map(String::as_str),
        Some("s")
    );
    assert_eq!(shell.variants[1].availability, Some(StockStatus::OutOfStock));

    let pricing = shell.pricing.expect("price");
    assert_eq!(pricing.amount, dec("19.99"));
    assert_eq!(pricing.currency.as_deref(), Some("USD"));

    let stock = shell.stock.expect("stock");
    assert_eq!(stock.status, StockStatus::InStock);
    assert_eq!(stock.confidence, 90);
    Ok(())
}

#[tokio::test]
async fn test_variant_output_is_capped() -> anyhow::Result<()> {
    let sizes = ["XS", "S", "M", "L", "XL", "XXL"];
    let entries: Vec<String> = sizes
        .iter()
        .map(|s| format!(r#"{{"sku":"TEE-{s}","size":"{s}"}}"#))
        .collect();
    let markup = format!(
        r#"<html><head><title>Tee</title>
        <script type="application/json">{{"variants":[{}]}}</script>
        </head><body></body></html>"#,
        entries.join(",")
    );

    let config = ExtractionConfig {
        max_variants: 4,
        ..ExtractionConfig::default()
    };
    let shell = ProductExtractor::new(&config).extract("https://shop.example/p/tee", &markup)?;

    assert_eq!(shell.variants.len(), 4);
    assert!(shell.notes.iter().any(|n| n.contains("capped")));
    Ok(())
}

#[tokio::test]
async fn test_same_variant_in_two_blobs_is_deduplicated() -> anyhow::Result<()> {
    let markup = r#"<html><head><title>Tee</title>
    <script type="application/ld+json">
    {"@type":"Product","offers":[{"sku":"TEE-M","size":"M"}]}
    </script>
    <script type="application/json">
    {"variants":[{"sku":"TEE-M","size":"M","color":"Black"}]}
    </script>
    </head><body></body></html>"#;

    let shell = shell_for("https://shop.example/p/tee", markup);
    assert_eq!(shell.variants.len(), 1);
    assert_eq!(shell.variants[0].external_id.as_deref(), Some("TEE-M"));
    Ok(())
}

#[tokio::test]
async fn test_bare_year_is_not_a_price() -> anyhow::Result<()> {
    let markup = r#"<html><head><title>Widget</title></head>
    <body>
        <h1>Widget</h1>
        <button class="add-to-cart">Add to cart</button>
        <footer>© 2024 Example Shop. The 2024 collection is here.</footer>
    </body></html>"#;

    let shell = shell_for("https://shop.example/p/widget", markup);
    assert!(shell.pricing.is_none());

    // The purchase control still reads as in stock
    let stock = shell.stock.expect("stock");
    assert_eq!(stock.status, StockStatus::InStock);
    assert_eq!(stock.confidence, 70);
    Ok(())
}

#[tokio::test]
async fn test_select_controls_expand_into_combinations() -> anyhow::Result<()> {
    let markup = r#"<html><head><title>Tee</title></head>
    <body>
        <select name="size">
            <option value="">Choose a size</option>
            <option>S</option><option>M</option>
        </select>
        <select name="color">
            <option>Black</option><option>White</option>
        </select>
    </body></html>"#;

    let shell = shell_for("https://shop.example/p/tee", markup);
    assert_eq!(shell.variants.len(), 4);

    let sets: Vec<String> = shell
        .variants
        .iter()
        .map(|v| {
            let set = v.attribute_set();
            format!("{}/{}", set["size"], set["color"])
        })
        .collect();
    assert!(sets.contains(&"s/black".to_string()));
    assert!(sets.contains(&"m/white".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_stock_evidence_is_scrubbed() -> anyhow::Result<()> {
    let markup = r#"<html><head><title>Widget</title>
    <script type="application/json">
    {"availability":"In stock. session_token: 9f8e7d6c5b4a22"}
    </script></head><body></body></html>"#;

    let shell = shell_for("https://shop.example/p/widget", markup);
    let stock = shell.stock.expect("stock");
    assert_eq!(stock.status, StockStatus::InStock);
    assert!(stock.evidence[0].contains("[redacted]"));
    assert!(!stock.evidence[0].contains("9f8e7d6c5b4a22"));
    Ok(())
}

#[tokio::test]
async fn test_sparse_page_extracts_nothing_but_still_assembles() -> anyhow::Result<()> {
    let markup =
        "<html><head><title>Mystery Item</title></head><body><p>No data here.</p></body></html>";
    let shell = shell_for("https://shop.example/p/mystery", markup);

    assert_eq!(shell.title.as_deref(), Some("Mystery Item"));
    assert!(shell.variants.is_empty());
    assert!(shell.pricing.is_none());
    assert!(shell.stock.is_none());
    Ok(())
}
