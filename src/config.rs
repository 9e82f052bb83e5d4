use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetcher: FetcherConfig,
    pub extraction: ExtractionConfig,
    pub tracking: TrackingConfig,
    pub alerts: AlertConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub request_timeout: u64,
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub max_variants: usize,
    pub max_blob_depth: usize,
    pub min_plausible_price: f64,
    pub max_plausible_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub concurrency: usize,
    pub check_now_min_interval: u64,
    pub check_now_entry_ttl: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub min_confidence: u8,
    pub cooldown_minutes: i64,
    pub recent_window_minutes: i64,
    pub webhook_url: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/shelfwatch.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: 30,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            user_agent: format!("ShelfWatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_variants: 100,
            max_blob_depth: 10,
            min_plausible_price: 0.10,
            max_plausible_price: 10_000.0,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            check_now_min_interval: 60,
            check_now_entry_ttl: 900,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_confidence: 70,
            cooldown_minutes: 60,
            recent_window_minutes: 60,
            webhook_url: None,
            username: "ShelfWatch".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "SHELFWATCH_"
            .add_source(Environment::with_prefix("SHELFWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message("Database min_connections cannot exceed max_connections".into()));
        }

        if self.fetcher.request_timeout == 0 {
            return Err(ConfigError::Message("Fetcher request_timeout must be greater than 0".into()));
        }

        if self.extraction.max_variants == 0 {
            return Err(ConfigError::Message("Extraction max_variants must be greater than 0".into()));
        }

        if self.extraction.min_plausible_price >= self.extraction.max_plausible_price {
            return Err(ConfigError::Message("Extraction min_plausible_price must be below max_plausible_price".into()));
        }

        if self.tracking.concurrency == 0 {
            return Err(ConfigError::Message("Tracking concurrency must be greater than 0".into()));
        }

        if self.alerts.min_confidence > 100 {
            return Err(ConfigError::Message("Alert min_confidence must be between 0 and 100".into()));
        }

        if let Some(url) = &self.alerts.webhook_url {
            if Url::parse(url).is_err() {
                return Err(ConfigError::Message("Invalid alert webhook URL format".into()));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
