use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Product {
    pub id: String,
    pub url: String,
    pub canonical_url: Option<String>,

    // Descriptive fields, refreshed on every successful extraction
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub main_image_url: Option<String>,
    pub metadata_json: Option<String>,

    // Metadata
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extensible extras kept as a JSON blob on the product row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductMetadata {
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub url: String,
    pub canonical_url: Option<String>,
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub main_image_url: Option<String>,
    pub metadata: Option<ProductMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub canonical_url: Option<String>,
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub main_image_url: Option<String>,
    pub metadata: Option<ProductMetadata>,
}

impl Product {
    pub fn new(new_product: NewProduct) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            url: new_product.url,
            canonical_url: new_product.canonical_url,
            name: new_product.name,
            vendor: new_product.vendor,
            main_image_url: new_product.main_image_url,
            metadata_json: new_product
                .metadata
                .as_ref()
                .and_then(|m| serde_json::to_string(m).ok()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the fields a fresh extraction produced, leaving anything the
    /// extraction did not see untouched.
    pub fn update(&mut self, update: UpdateProduct) {
        if let Some(canonical_url) = update.canonical_url {
            self.canonical_url = Some(canonical_url);
        }
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(vendor) = update.vendor {
            self.vendor = Some(vendor);
        }
        if let Some(main_image_url) = update.main_image_url {
            self.main_image_url = Some(main_image_url);
        }
        if let Some(metadata) = update.metadata {
            self.metadata_json = serde_json::to_string(&metadata).ok();
        }

        self.updated_at = Utc::now();
    }

    pub fn metadata(&self) -> Option<ProductMetadata> {
        self.metadata_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}
