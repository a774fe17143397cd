use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Normalization applied to every tag name before lookup or insert, so that
/// "Travel", " travel" and "travel" all resolve to the same tag row.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: normalize_tag_name(name),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TagWithCount {
    pub name: String,
    pub entry_count: i64,
}
