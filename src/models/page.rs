use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: String,
    pub entry_id: String,
    pub page_number: i64,
    pub image_path: String,
    pub text_content: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Page {
    pub fn new(
        entry_id: String,
        page_number: i64,
        image_path: String,
        text_content: Option<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            entry_id,
            page_number,
            image_path,
            text_content,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
