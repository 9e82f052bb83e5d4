pub mod config;
pub mod extraction;
pub mod fetcher;
pub mod ingest;
pub mod models;
pub mod notifications;
pub mod ratelimit;
pub mod storage;
pub mod tracker;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
