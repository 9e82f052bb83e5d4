use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use shelfwatch::config::AppConfig;
use shelfwatch::extraction::ProductExtractor;
use shelfwatch::fetcher::{HttpFetcher, PageFetcher};
use shelfwatch::ingest::IngestService;
use shelfwatch::models::{NewTrackedItem, TrackedItem};
use shelfwatch::notifications::{alert::sink_from_config, format_price};
use shelfwatch::storage::{Database, tracking, variants};
use shelfwatch::tracker::{CheckNowOutcome, TrackingService};

#[derive(Parser)]
#[command(name = "shelfwatch", about = "Track prices and stock on product pages")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a product page, store what it says, and start tracking it
    Add {
        url: String,
        #[arg(long, default_value = "local")]
        user: String,
        /// Notify when the price reaches this value
        #[arg(long)]
        target_price: Option<Decimal>,
    },
    /// Re-check one variant right now
    Check {
        variant_id: String,
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// Check every variant anyone actively tracks
    Sweep {
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing; the guard keeps the file writer flushing until exit
    let _log_guard = init_tracing()?;

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    if config.metrics.enabled {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics.port))
            .install()
            .context("Failed to start metrics exporter")?;
        info!("Metrics exporter listening on port {}", config.metrics.port);
    }

    let db = Database::connect(&config.database)
        .await
        .context("Failed to open database")?;
    db.migrate().await.context("Failed to run migrations")?;

    match cli.command {
        Command::Add {
            url,
            user,
            target_price,
        } => add(&db, &config, &url, &user, target_price).await,
        Command::Check { variant_id, user } => check(db, &config, &variant_id, &user).await,
        Command::Sweep { concurrency } => sweep(db, &config, concurrency).await,
    }
}

async fn add(
    db: &Database,
    config: &AppConfig,
    url: &str,
    user: &str,
    target_price: Option<Decimal>,
) -> Result<()> {
    info!("Adding {}", url);

    let fetcher = HttpFetcher::new(config.fetcher.clone())?;
    let fetch = fetcher.fetch(url).await?;
    if !fetch.success {
        bail!(
            "Could not fetch {}: {}",
            url,
            fetch.error.unwrap_or_else(|| "no markup returned".to_string())
        );
    }
    let markup = fetch.markup.unwrap_or_default();

    let extractor = ProductExtractor::new(&config.extraction);
    let shell = extractor.extract(&fetch.final_url, &markup)?;
    for note in &shell.notes {
        tracing::debug!("Extraction note: {}", note);
    }

    let outcome = IngestService::new(db.clone()).ingest(&shell, url).await?;
    let product_name = outcome.product.name.as_deref().unwrap_or(url);
    println!(
        "Added {} with {} variant(s)",
        product_name,
        outcome.variants.len()
    );

    let Some(variant) = outcome.variants.first() else {
        bail!("No variant was stored for {url}");
    };

    let mut conn = db.acquire().await?;
    let existing = tracking::find_by_user_and_variant(&mut conn, user, &variant.id).await?;
    match existing {
        Some(item) => println!("Already tracking as item {}", item.id),
        None => {
            let item = TrackedItem::new(NewTrackedItem {
                user_id: user.to_string(),
                variant_id: variant.id.clone(),
                target_price,
                notify_on_price_drop: None,
                price_drop_percent: None,
                notify_on_back_in_stock: None,
                notify_on_any_stock_change: None,
            });
            tracking::insert(&mut conn, &item).await?;
            println!("Tracking variant {} as item {}", variant.id, item.id);
        }
    }

    if let Some(price) = variant.current_price {
        println!(
            "Current price: {}",
            format_price(price, variant.currency.as_deref())
        );
    }
    if let Some(status) = variant.current_stock_status {
        println!("Stock: {}", status.as_str());
    }

    Ok(())
}

async fn check(db: Database, config: &AppConfig, variant_id: &str, user: &str) -> Result<()> {
    let service = build_service(db, config)?;

    match service.check_now(user, variant_id).await? {
        CheckNowOutcome::RateLimited => {
            println!("Checked too recently, try again in a minute");
        }
        CheckNowOutcome::Checked(result) => {
            println!("Outcome: {}", result.outcome.as_str());
            if let (Some(old), Some(new)) = (result.price_delta.old, result.price_delta.new) {
                if old != new {
                    println!("Price: {} -> {}", old, new);
                }
            }
            if result.stock_delta.changed() {
                println!(
                    "Stock: {:?} -> {:?}",
                    result.stock_delta.old_status, result.stock_delta.new_status
                );
            }
            println!(
                "{} notification(s), {} alert(s)",
                result.notifications_created, result.alerts_sent
            );
        }
    }

    Ok(())
}

async fn sweep(db: Database, config: &AppConfig, concurrency: Option<usize>) -> Result<()> {
    let ids = {
        let mut conn = db.acquire().await?;
        variants::list_tracked_ids(&mut conn).await?
    };
    if ids.is_empty() {
        println!("Nothing is being tracked yet");
        return Ok(());
    }

    let service = build_service(db, config)?;
    let batch = service
        .track_variants(&ids, concurrency.unwrap_or(config.tracking.concurrency))
        .await;

    println!(
        "Swept {} variant(s): {} succeeded, {} failed",
        batch.total, batch.succeeded, batch.failed
    );
    for (id, result) in &batch.results {
        if let Err(e) = result {
            println!("  {id}: {e}");
        }
    }

    Ok(())
}

fn build_service(db: Database, config: &AppConfig) -> Result<TrackingService> {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(config.fetcher.clone())?);
    let alert_sink = Arc::from(sink_from_config(&config.alerts));
    Ok(TrackingService::new(db, fetcher, alert_sink, config))
}

/// Logs to a daily-rolling file when SHELFWATCH_LOG_DIR is set, otherwise to
/// stdout.
fn init_tracing() -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("shelfwatch=debug".parse()?);

    match std::env::var("SHELFWATCH_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let (writer, guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::daily(dir, "shelfwatch.log"),
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}
