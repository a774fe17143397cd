use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::models::{normalize_tag_name, Entry, EntryDetail, Page, TagWithCount};
use crate::ocr::{self, TextExtractor};
use crate::repo::{NewEntry, Repository, SearchFilter, Stats, UpdateEntry};

/// Orchestrates the ingestion pipeline (preprocess, extract, persist) and
/// fronts the repository with input validation. No step is retried; a failure
/// anywhere leaves no partial state behind.
#[derive(Clone)]
pub struct EntryManager {
    repo: Repository,
    extractor: Arc<dyn TextExtractor>,
}

impl EntryManager {
    pub fn new(repo: Repository, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { repo, extractor }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    // ---- entries ----

    pub async fn create_entry(&self, mut new: NewEntry) -> Result<EntryDetail> {
        if let Some(date) = new.date.take() {
            new.date = Some(parse_entry_date(&date)?);
        }
        self.repo.create_entry(new).await
    }

    pub async fn update_entry(&self, entry_id: &str, mut update: UpdateEntry) -> Result<Entry> {
        if let Some(date) = update.date.take() {
            update.date = Some(parse_entry_date(&date)?);
        }
        self.repo.update_entry(entry_id, update).await
    }

    pub async fn get_entry_detail(&self, entry_id: &str) -> Result<EntryDetail> {
        self.repo.get_entry_detail(entry_id).await
    }

    pub async fn list_entries(&self) -> Result<Vec<Entry>> {
        self.repo.list_entries().await
    }

    pub async fn delete_entry(&self, entry_id: &str) -> Result<()> {
        self.repo.delete_entry(entry_id).await
    }

    // ---- ingestion ----

    /// Ingests one photographed page: preprocess, OCR, persist, in that
    /// order. If preprocessing or extraction fails no page row is created.
    /// Without an explicit number the page gets the next free number for the
    /// entry (1 for a fresh entry).
    pub async fn ingest_page(
        &self,
        entry_id: &str,
        image_path: &str,
        page_number: Option<i64>,
    ) -> Result<Page> {
        if let Some(n) = page_number {
            if n < 1 {
                return Err(Error::Validation(format!(
                    "page number must be positive, got {n}"
                )));
            }
        }

        // Reject unknown entries before doing any image work
        self.repo.get_entry(entry_id).await?;

        let path = image_path.to_string();
        let processed = tokio::task::spawn_blocking(move || ocr::load_and_preprocess(&path))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("preprocess task failed: {e}"))))??;

        let extraction = self.extractor.extract(&processed).await?;
        tracing::info!(
            entry_id,
            image_path,
            confidence = extraction.confidence,
            chars = extraction.text.len(),
            "OCR extraction complete"
        );

        self.repo
            .add_page(entry_id, page_number, image_path, Some(extraction.text))
            .await
    }

    /// Sequential batch ingestion; pages get consecutive auto-assigned
    /// numbers in the order given.
    pub async fn ingest_pages(&self, entry_id: &str, image_paths: &[String]) -> Result<Vec<Page>> {
        let mut pages = Vec::with_capacity(image_paths.len());
        for path in image_paths {
            pages.push(self.ingest_page(entry_id, path, None).await?);
        }
        Ok(pages)
    }

    pub async fn update_page_text(&self, page_id: &str, text: &str) -> Result<Page> {
        self.repo.update_page_text(page_id, text).await
    }

    pub async fn delete_page(&self, page_id: &str) -> Result<()> {
        self.repo.delete_page(page_id).await
    }

    // ---- tags ----

    pub async fn attach_tag(&self, entry_id: &str, name: &str) -> Result<()> {
        self.repo.attach_tag(entry_id, name).await
    }

    pub async fn detach_tag(&self, entry_id: &str, name: &str) -> Result<()> {
        self.repo.get_entry(entry_id).await?;
        // Detaching a tag that was never created is a no-op
        if let Some(tag) = self.repo.find_tag(name).await? {
            self.repo.detach_tag(entry_id, &tag.id).await?;
        }
        Ok(())
    }

    pub async fn list_tags(&self) -> Result<Vec<TagWithCount>> {
        self.repo.list_tags().await
    }

    // ---- search & stats ----

    pub async fn search(&self, mut filter: SearchFilter) -> Result<Vec<Entry>> {
        if let Some(from) = &filter.date_from {
            validate_filter_date(from)?;
        }
        if let Some(to) = &filter.date_to {
            validate_filter_date(to)?;
        }
        filter.tags = filter
            .tags
            .iter()
            .map(|t| normalize_tag_name(t))
            .filter(|t| !t.is_empty())
            .collect();
        self.repo.search(&filter).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.repo.stats().await
    }
}

/// Entry dates are accepted as RFC 3339 timestamps or plain `YYYY-MM-DD`
/// calendar dates; both are stored as RFC 3339.
fn parse_entry_date(input: &str) -> Result<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc).to_rfc3339());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().to_rfc3339());
    }
    Err(Error::Validation(format!(
        "invalid date '{input}', expected YYYY-MM-DD or RFC 3339"
    )))
}

fn validate_filter_date(input: &str) -> Result<()> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| Error::Validation(format!("invalid filter date '{input}', expected YYYY-MM-DD")))
}
