use std::collections::BTreeSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{JournalError, Result};
use crate::models::{EmotionCount, JournalEntry, NewEntry, Role};
use crate::store::{check_new_entry, sort_counts, EntryStore};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed entry log. The database assigns `created_at`.
#[derive(Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn read_failed(err: sqlx::Error) -> JournalError {
    tracing::error!(error = %err, "entry query failed");
    JournalError::StoreReadFailed(err.to_string())
}

fn entry_from_row(row: &PgRow) -> Result<JournalEntry> {
    let role: String = row.try_get("role").map_err(read_failed)?;
    Ok(JournalEntry {
        id: row.try_get("id").map_err(read_failed)?,
        subject_id: row.try_get("subject_id").map_err(read_failed)?,
        role: role
            .parse()
            .map_err(|_| JournalError::StoreReadFailed(format!("unknown role '{role}' in log")))?,
        text: row.try_get("body").map_err(read_failed)?,
        emotion_label: row.try_get("emotion_label").map_err(read_failed)?,
        created_at: row.try_get("created_at").map_err(read_failed)?,
    })
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn append(&self, entry: NewEntry) -> Result<JournalEntry> {
        check_new_entry(&entry)?;

        let row = sqlx::query(
            r#"
            INSERT INTO mood_journal.entries (id, subject_id, role, body, emotion_label)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, subject_id, role, body, emotion_label, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.subject_id)
        .bind(entry.role.as_str())
        .bind(&entry.text)
        .bind(&entry.emotion_label)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, subject_id = %entry.subject_id, "entry insert failed");
            JournalError::StoreWriteFailed(err.to_string())
        })?;

        entry_from_row(&row)
    }

    async fn query_by_subject(
        &self,
        subject_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_id, role, body, emotion_label, created_at
            FROM mood_journal.entries
            WHERE subject_id = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            ORDER BY created_at, id
            "#,
        )
        .bind(subject_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn distinct_subjects(&self, role: Role) -> Result<BTreeSet<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT subject_id FROM mood_journal.entries WHERE role = $1",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.iter()
            .map(|row| row.try_get("subject_id").map_err(read_failed))
            .collect()
    }

    async fn emotion_counts(&self) -> Result<Vec<EmotionCount>> {
        let rows = sqlx::query(
            r#"
            SELECT emotion_label, COUNT(*) AS count
            FROM mood_journal.entries
            GROUP BY emotion_label
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            counts.push(EmotionCount {
                emotion_label: row.try_get("emotion_label").map_err(read_failed)?,
                count: row.try_get("count").map_err(read_failed)?,
            });
        }
        sort_counts(&mut counts);
        Ok(counts)
    }

    async fn all_entries(&self) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_id, role, body, emotion_label, created_at
            FROM mood_journal.entries
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.iter().map(entry_from_row).collect()
    }
}

/// Demo entries for a fresh install. Labels are fixed so no classifier is
/// needed.
pub async fn seed(store: &dyn EntryStore) -> anyhow::Result<usize> {
    let entries = [
        (
            "Najlaa",
            "I failed my chemistry quiz and I can't stop thinking about it.",
            "sadness",
        ),
        (
            "Najlaa",
            "Worried that I will not finish the project before the deadline.",
            "nervousness",
        ),
        (
            "Najlaa",
            "My roommate moved out without telling me and I feel so alone.",
            "sadness",
        ),
        (
            "Mohamed",
            "Played football with friends after class, it was a great afternoon.",
            "joy",
        ),
        (
            "Mohamed",
            "Nothing special happened today, just lectures and the library.",
            "neutral",
        ),
    ];

    let mut inserted = 0usize;
    for (subject_id, text, label) in entries {
        store
            .append(NewEntry {
                subject_id: subject_id.to_string(),
                role: Role::Subject,
                text: text.to_string(),
                emotion_label: label.to_string(),
            })
            .await
            .with_context(|| format!("failed to seed entry for {subject_id}"))?;
        inserted += 1;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEntryStore;

    #[tokio::test]
    async fn seed_writes_subject_entries() {
        let store = MemoryEntryStore::new();
        let inserted = seed(&store).await.unwrap();
        assert_eq!(inserted, 5);

        let subjects = store.distinct_subjects(Role::Subject).await.unwrap();
        assert_eq!(subjects.len(), 2);
        assert!(store
            .distinct_subjects(Role::Reviewer)
            .await
            .unwrap()
            .is_empty());
    }
}
