// Integration tests for ShelfWatch
// These tests drive the real pipeline against an in-memory database

pub mod extraction_tests;
pub mod ingest_tests;
pub mod notification_tests;
pub mod tracking_tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shelfwatch::AppConfig;
use shelfwatch::extraction::{ProductExtractor, ProductShell};
use shelfwatch::fetcher::{FetchMode, FetchResult, PageFetcher};
use shelfwatch::models::{NewTrackedItem, TrackedItem};
use shelfwatch::notifications::{AlertSink, StockAlert};
use shelfwatch::storage::{Database, tracking};
use shelfwatch::tracker::TrackingService;

pub const PRODUCT_URL: &str = "https://shop.example/products/widget";

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

/// Fresh in-memory database with the schema applied.
pub async fn test_db() -> Database {
    let db = Database::connect_in_memory()
        .await
        .expect("in-memory database");
    db.migrate().await.expect("migrations");
    db
}

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

/// Extraction as the tracking service performs it, with default limits.
pub fn shell_for(url: &str, markup: &str) -> ProductShell {
    ProductExtractor::new(&test_config().extraction)
        .extract(url, markup)
        .expect("extraction")
}

/// Product page carrying one JSON-LD offer with a price and a schema.org
/// availability.
pub fn product_page(title: &str, price: &str, availability: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta property="og:title" content="{title}">
    <title>{title} | Example Shop</title>
    <script type="application/ld+json">
    {{"@type":"Product","name":"{title}","offers":{{"price":"{price}","priceCurrency":"USD","availability":"https://schema.org/{availability}"}}}}
    </script>
</head>
<body>
    <h1>{title}</h1>
</body>
</html>"#
    )
}

/// Same page with an explicit canonical link.
pub fn page_with_canonical(title: &str, price: &str, availability: &str, canonical: &str) -> String {
    product_page(title, price, availability).replace(
        "</head>",
        &format!("    <link rel=\"canonical\" href=\"{canonical}\">\n</head>"),
    )
}

pub fn new_item(user: &str, variant_id: &str) -> NewTrackedItem {
    NewTrackedItem {
        user_id: user.to_string(),
        variant_id: variant_id.to_string(),
        target_price: None,
        notify_on_price_drop: None,
        price_drop_percent: None,
        notify_on_back_in_stock: None,
        notify_on_any_stock_change: None,
    }
}

pub async fn insert_item(db: &Database, new_item: NewTrackedItem) -> TrackedItem {
    let item = TrackedItem::new(new_item);
    let mut conn = db.acquire().await.expect("acquire");
    tracking::insert(&mut conn, &item)
        .await
        .expect("insert tracked item");
    item
}

/// Serves canned markup per URL. Responses queued for the same URL are
/// returned in order with the last one repeating; unknown URLs fail the way
/// a dead host would.
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Vec<FetchResult>>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
        }
    }

    pub fn serve(self, url: &str, markup: &str) -> Self {
        self.push(
            url,
            FetchResult {
                success: true,
                markup: Some(markup.to_string()),
                error: None,
                response_time_ms: 1,
                final_url: url.to_string(),
                mode: FetchMode::Raw,
            },
        );
        self
    }

    pub fn fail(self, url: &str, error: &str) -> Self {
        self.push(
            url,
            FetchResult {
                success: false,
                markup: None,
                error: Some(error.to_string()),
                response_time_ms: 1,
                final_url: url.to_string(),
                mode: FetchMode::Raw,
            },
        );
        self
    }

    fn push(&self, url: &str, result: FetchResult) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(result);
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> shelfwatch::Result<FetchResult> {
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
            Some(queue) => Ok(queue[0].clone()),
            None => Ok(FetchResult {
                success: false,
                markup: None,
                error: Some(format!("no stubbed response for {url}")),
                response_time_ms: 1,
                final_url: url.to_string(),
                mode: FetchMode::Raw,
            }),
        }
    }
}

/// Records every alert instead of delivering it; `succeed` controls the
/// reported delivery outcome.
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<StockAlert>>,
    succeed: bool,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            succeed: true,
        }
    }

    pub fn failing() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            succeed: false,
        }
    }

    pub fn sent(&self) -> Vec<StockAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn send(&self, alert: &StockAlert) -> bool {
        self.alerts.lock().unwrap().push(alert.clone());
        self.succeed
    }
}

pub fn tracking_service(
    db: &Database,
    fetcher: StubFetcher,
    sink: Arc<RecordingAlertSink>,
) -> TrackingService {
    TrackingService::new(db.clone(), Arc::new(fetcher), sink, &test_config())
}
