use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{NotificationKind, generate_id};

/// Durable notification record. Write once, read many; there is no update
/// path on purpose.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Notification {
    pub id: String,
    pub tracked_item_id: String,
    pub user_id: String,
    pub variant_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub metadata_json: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        tracked_item_id: String,
        user_id: String,
        variant_id: String,
        kind: NotificationKind,
        title: String,
        body: String,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: generate_id(),
            tracked_item_id,
            user_id,
            variant_id,
            kind,
            title,
            body,
            metadata_json: metadata.as_ref().and_then(|m| serde_json::to_string(m).ok()),
            created_at: Utc::now(),
        }
    }

    pub fn metadata(&self) -> Option<serde_json::Value> {
        self.metadata_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}
