use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: String,
    pub title: Option<String>,
    pub date: String,
    pub mood: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Entry {
    pub fn new(title: Option<String>, date: Option<String>, mood: Option<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            date: date.unwrap_or_else(|| now.clone()),
            mood,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// An entry loaded with everything export and detail views need: pages in
/// page-number order plus the associated tag names.
#[derive(Debug, Clone, Serialize)]
pub struct EntryDetail {
    #[serde(flatten)]
    pub entry: Entry,
    pub pages: Vec<super::Page>,
    pub tags: Vec<String>,
}
