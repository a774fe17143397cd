use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{Error, Result};
use crate::models::{normalize_tag_name, Entry, EntryDetail, Page, Tag, TagWithCount};

#[derive(Debug, Default)]
pub struct NewEntry {
    pub title: Option<String>,
    pub date: Option<String>,
    pub mood: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update; `None` keeps the current value. `tags: Some(_)` replaces
/// the full tag set of the entry.
#[derive(Debug, Default)]
pub struct UpdateEntry {
    pub title: Option<String>,
    pub date: Option<String>,
    pub mood: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    Any,
    All,
}

#[derive(Debug, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring match over entry titles and page text.
    pub query: Option<String>,
    pub tags: Vec<String>,
    pub tag_match: Option<TagMatch>,
    /// Inclusive date bounds, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct Stats {
    pub entry_count: i64,
    pub page_count: i64,
    pub tag_count: i64,
    pub first_entry_date: Option<String>,
    pub last_entry_date: Option<String>,
    pub top_tags: Vec<TagWithCount>,
}

/// All access to the entries/pages/tags tables goes through here. Every
/// mutating operation runs in a single transaction and refreshes the owning
/// entry's `updated_at`, so no caller can observe a half-written state.
#[derive(Clone)]
pub struct Repository {
    db: SqlitePool,
}

impl Repository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ---- entries ----

    pub async fn create_entry(&self, new: NewEntry) -> Result<EntryDetail> {
        let entry = Entry::new(new.title, new.date, new.mood);

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO entries (id, title, date, mood, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.title)
        .bind(&entry.date)
        .bind(&entry.mood)
        .bind(&entry.created_at)
        .bind(&entry.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut tags = Vec::new();
        for name in &new.tags {
            let tag = get_or_create_tag_tx(&mut *tx, name).await?;
            attach_tag_tx(&mut *tx, &entry.id, &tag.id).await?;
            tags.push(tag.name);
        }
        tags.sort();
        tags.dedup();

        tx.commit().await?;

        Ok(EntryDetail {
            entry,
            pages: Vec::new(),
            tags,
        })
    }

    pub async fn get_entry(&self, entry_id: &str) -> Result<Entry> {
        sqlx::query_as("SELECT * FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))
    }

    /// Entry plus its pages in ascending page-number order and its tag names.
    pub async fn get_entry_detail(&self, entry_id: &str) -> Result<EntryDetail> {
        let entry = self.get_entry(entry_id).await?;

        let pages: Vec<Page> =
            sqlx::query_as("SELECT * FROM pages WHERE entry_id = ? ORDER BY page_number ASC")
                .bind(entry_id)
                .fetch_all(&self.db)
                .await?;

        let tags: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM tags t JOIN entry_tags et ON et.tag_id = t.id WHERE et.entry_id = ? ORDER BY t.name",
        )
        .bind(entry_id)
        .fetch_all(&self.db)
        .await?;

        Ok(EntryDetail {
            entry,
            pages,
            tags: tags.into_iter().map(|(name,)| name).collect(),
        })
    }

    pub async fn list_entries(&self) -> Result<Vec<Entry>> {
        Ok(
            sqlx::query_as("SELECT * FROM entries ORDER BY date DESC, created_at DESC")
                .fetch_all(&self.db)
                .await?,
        )
    }

    pub async fn update_entry(&self, entry_id: &str, update: UpdateEntry) -> Result<Entry> {
        let mut tx = self.db.begin().await?;

        let entry: Option<Entry> = sqlx::query_as("SELECT * FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut entry = entry.ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))?;

        if let Some(title) = update.title {
            entry.title = Some(title);
        }
        if let Some(date) = update.date {
            entry.date = date;
        }
        if let Some(mood) = update.mood {
            entry.mood = Some(mood);
        }
        entry.updated_at = Utc::now().to_rfc3339();

        sqlx::query("UPDATE entries SET title = ?, date = ?, mood = ?, updated_at = ? WHERE id = ?")
            .bind(&entry.title)
            .bind(&entry.date)
            .bind(&entry.mood)
            .bind(&entry.updated_at)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        // Replace the tag set when one was supplied
        if let Some(tags) = update.tags {
            sqlx::query("DELETE FROM entry_tags WHERE entry_id = ?")
                .bind(entry_id)
                .execute(&mut *tx)
                .await?;

            for name in &tags {
                let tag = get_or_create_tag_tx(&mut *tx, name).await?;
                attach_tag_tx(&mut *tx, entry_id, &tag.id).await?;
            }
        }

        tx.commit().await?;
        Ok(entry)
    }

    /// Deletes the entry, its pages, and its tag associations. Tag rows are
    /// left intact.
    pub async fn delete_entry(&self, entry_id: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::EntryNotFound(entry_id.to_string()));
        }

        sqlx::query("DELETE FROM pages WHERE entry_id = ?")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM entry_tags WHERE entry_id = ?")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ---- pages ----

    /// Inserts a page for the entry. With no explicit number the page gets
    /// `max(existing) + 1`, resolved inside the same transaction as the
    /// insert; the UNIQUE(entry_id, page_number) constraint backstops any
    /// concurrent writer claiming the same number.
    pub async fn add_page(
        &self,
        entry_id: &str,
        page_number: Option<i64>,
        image_path: &str,
        text_content: Option<String>,
    ) -> Result<Page> {
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::EntryNotFound(entry_id.to_string()));
        }

        let page_number = match page_number {
            Some(n) => {
                let taken: (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM pages WHERE entry_id = ? AND page_number = ?")
                        .bind(entry_id)
                        .bind(n)
                        .fetch_one(&mut *tx)
                        .await?;
                if taken.0 > 0 {
                    return Err(Error::DuplicatePageNumber {
                        entry_id: entry_id.to_string(),
                        page_number: n,
                    });
                }
                n
            }
            None => {
                let max: (i64,) =
                    sqlx::query_as("SELECT COALESCE(MAX(page_number), 0) FROM pages WHERE entry_id = ?")
                        .bind(entry_id)
                        .fetch_one(&mut *tx)
                        .await?;
                max.0 + 1
            }
        };

        let page = Page::new(
            entry_id.to_string(),
            page_number,
            image_path.to_string(),
            text_content,
        );

        sqlx::query(
            "INSERT INTO pages (id, entry_id, page_number, image_path, text_content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&page.id)
        .bind(&page.entry_id)
        .bind(page.page_number)
        .bind(&page.image_path)
        .bind(&page.text_content)
        .bind(&page.created_at)
        .bind(&page.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::DuplicatePageNumber {
                entry_id: entry_id.to_string(),
                page_number,
            },
            _ => Error::from(e),
        })?;

        touch_entry(&mut *tx, entry_id, &page.updated_at).await?;
        tx.commit().await?;

        Ok(page)
    }

    pub async fn get_page(&self, page_id: &str) -> Result<Page> {
        sqlx::query_as("SELECT * FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::PageNotFound(page_id.to_string()))
    }

    pub async fn update_page_text(&self, page_id: &str, text_content: &str) -> Result<Page> {
        let mut tx = self.db.begin().await?;

        let page: Option<Page> = sqlx::query_as("SELECT * FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut page = page.ok_or_else(|| Error::PageNotFound(page_id.to_string()))?;

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE pages SET text_content = ?, updated_at = ? WHERE id = ?")
            .bind(text_content)
            .bind(&now)
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        touch_entry(&mut *tx, &page.entry_id, &now).await?;
        tx.commit().await?;

        page.text_content = Some(text_content.to_string());
        page.updated_at = now;
        Ok(page)
    }

    pub async fn delete_page(&self, page_id: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let page: Option<Page> = sqlx::query_as("SELECT * FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(&mut *tx)
            .await?;
        let page = page.ok_or_else(|| Error::PageNotFound(page_id.to_string()))?;

        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        touch_entry(&mut *tx, &page.entry_id, &Utc::now().to_rfc3339()).await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- tags ----

    /// Get-or-creates the tag by normalized name and attaches it, all in one
    /// transaction. An unknown entry is rejected before the tag row is
    /// touched; attaching an already-attached tag is a no-op, not an error.
    pub async fn attach_tag(&self, entry_id: &str, name: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::EntryNotFound(entry_id.to_string()));
        }

        let tag = get_or_create_tag_tx(&mut *tx, name).await?;
        let attached = attach_tag_tx(&mut *tx, entry_id, &tag.id).await?;
        if attached {
            touch_entry(&mut *tx, entry_id, &Utc::now().to_rfc3339()).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn detach_tag(&self, entry_id: &str, tag_id: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::EntryNotFound(entry_id.to_string()));
        }

        let result = sqlx::query("DELETE FROM entry_tags WHERE entry_id = ? AND tag_id = ?")
            .bind(entry_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() > 0 {
            touch_entry(&mut *tx, entry_id, &Utc::now().to_rfc3339()).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        Ok(sqlx::query_as("SELECT * FROM tags WHERE name = ?")
            .bind(normalize_tag_name(name))
            .fetch_optional(&self.db)
            .await?)
    }

    pub async fn list_tags(&self) -> Result<Vec<TagWithCount>> {
        Ok(sqlx::query_as(
            r#"
            SELECT t.name, COUNT(et.entry_id) as entry_count
            FROM tags t
            LEFT JOIN entry_tags et ON et.tag_id = t.id
            GROUP BY t.id
            ORDER BY t.name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }

    // ---- search & stats ----

    /// Free text is a case-insensitive substring match against entry titles
    /// and page text. Tag filtering is match-any (default) or match-all.
    /// Date bounds are inclusive and compare on the calendar date of the
    /// entry. Results are ordered newest first.
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<Entry>> {
        let mut sql = String::from("SELECT e.* FROM entries e WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            sql.push_str(
                r#" AND (lower(COALESCE(e.title, '')) LIKE ? ESCAPE '\'
                    OR EXISTS (SELECT 1 FROM pages p WHERE p.entry_id = e.id
                               AND lower(COALESCE(p.text_content, '')) LIKE ? ESCAPE '\'))"#,
            );
            let pattern = like_pattern(query);
            binds.push(pattern.clone());
            binds.push(pattern);
        }

        if !filter.tags.is_empty() {
            let placeholders = vec!["?"; filter.tags.len()].join(", ");
            let tag_match = filter.tag_match.unwrap_or(TagMatch::Any);
            match tag_match {
                TagMatch::Any => {
                    sql.push_str(&format!(
                        " AND e.id IN (SELECT et.entry_id FROM entry_tags et \
                         JOIN tags t ON t.id = et.tag_id WHERE t.name IN ({placeholders}))"
                    ));
                }
                TagMatch::All => {
                    sql.push_str(&format!(
                        " AND e.id IN (SELECT et.entry_id FROM entry_tags et \
                         JOIN tags t ON t.id = et.tag_id WHERE t.name IN ({placeholders}) \
                         GROUP BY et.entry_id HAVING COUNT(DISTINCT t.id) = {})",
                        filter.tags.len()
                    ));
                }
            }
            for name in &filter.tags {
                binds.push(normalize_tag_name(name));
            }
        }

        if let Some(from) = &filter.date_from {
            sql.push_str(" AND date(e.date) >= date(?)");
            binds.push(from.clone());
        }
        if let Some(to) = &filter.date_to {
            sql.push_str(" AND date(e.date) <= date(?)");
            binds.push(to.clone());
        }

        sql.push_str(" ORDER BY e.date DESC, e.created_at DESC");

        let mut query = sqlx::query_as::<_, Entry>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        Ok(query.fetch_all(&self.db).await?)
    }

    pub async fn stats(&self) -> Result<Stats> {
        let (entry_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.db)
            .await?;
        let (page_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.db)
            .await?;
        let (tag_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags")
            .fetch_one(&self.db)
            .await?;

        let (first_entry_date, last_entry_date): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT MIN(date(date)), MAX(date(date)) FROM entries")
                .fetch_one(&self.db)
                .await?;

        let top_tags: Vec<TagWithCount> = sqlx::query_as(
            r#"
            SELECT t.name, COUNT(et.entry_id) as entry_count
            FROM tags t
            JOIN entry_tags et ON et.tag_id = t.id
            GROUP BY t.id
            ORDER BY entry_count DESC, t.name ASC
            LIMIT 5
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(Stats {
            entry_count,
            page_count,
            tag_count,
            first_entry_date,
            last_entry_date,
            top_tags,
        })
    }
}

async fn touch_entry(
    tx: &mut SqliteConnection,
    entry_id: &str,
    now: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE entries SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(entry_id)
        .execute(tx)
        .await?;
    Ok(())
}

async fn get_or_create_tag_tx(tx: &mut SqliteConnection, name: &str) -> Result<Tag> {
    let tag = Tag::new(name);
    if tag.name.is_empty() {
        return Err(Error::Validation("tag name must not be empty".to_string()));
    }

    sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(&tag.id)
        .bind(&tag.name)
        .bind(&tag.created_at)
        .execute(&mut *tx)
        .await?;

    let tag: Tag = sqlx::query_as("SELECT * FROM tags WHERE name = ?")
        .bind(&tag.name)
        .fetch_one(&mut *tx)
        .await?;
    Ok(tag)
}

/// Returns true when a new association row was inserted.
async fn attach_tag_tx(
    tx: &mut SqliteConnection,
    entry_id: &str,
    tag_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO entry_tags (entry_id, tag_id) VALUES (?, ?)")
        .bind(entry_id)
        .bind(tag_id)
        .execute(tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}
