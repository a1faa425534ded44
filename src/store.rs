use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{JournalError, Result};
use crate::models::{EmotionCount, JournalEntry, NewEntry, Role};

/// Append-only log of classified entries. Implementations stamp `id` and
/// `created_at` themselves; there is deliberately no update or delete.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn append(&self, entry: NewEntry) -> Result<JournalEntry>;

    /// Entries for one subject, oldest first.
    async fn query_by_subject(
        &self,
        subject_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JournalEntry>>;

    async fn distinct_subjects(&self, role: Role) -> Result<BTreeSet<String>>;

    /// Entry count per label, most frequent first.
    async fn emotion_counts(&self) -> Result<Vec<EmotionCount>>;

    /// The full log in insertion order.
    async fn all_entries(&self) -> Result<Vec<JournalEntry>>;
}

pub(crate) fn check_new_entry(entry: &NewEntry) -> Result<()> {
    if entry.subject_id.trim().is_empty() {
        return Err(JournalError::InvalidInput(
            "subject id must not be empty".to_string(),
        ));
    }
    if entry.text.trim().is_empty() {
        return Err(JournalError::InvalidInput(
            "entry text must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn sort_counts(counts: &mut [EmotionCount]) {
    counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.emotion_label.cmp(&b.emotion_label))
    });
}

/// In-process store used by tests and offline evaluation.
#[derive(Default)]
pub struct MemoryEntryStore {
    entries: RwLock<Vec<JournalEntry>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn append(&self, entry: NewEntry) -> Result<JournalEntry> {
        check_new_entry(&entry)?;
        let mut entries = self.entries.write().await;

        let now = Utc::now();
        let created_at = match entries.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let stored = JournalEntry {
            id: Uuid::new_v4(),
            subject_id: entry.subject_id,
            role: entry.role,
            text: entry.text,
            emotion_label: entry.emotion_label,
            created_at,
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn query_by_subject(
        &self,
        subject_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JournalEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.subject_id == subject_id)
            .filter(|entry| since.map_or(true, |since| entry.created_at >= since))
            .cloned()
            .collect())
    }

    async fn distinct_subjects(&self, role: Role) -> Result<BTreeSet<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|entry| entry.role == role)
            .map(|entry| entry.subject_id.clone())
            .collect())
    }

    async fn emotion_counts(&self) -> Result<Vec<EmotionCount>> {
        let entries = self.entries.read().await;
        let mut map: HashMap<&str, i64> = HashMap::new();
        for entry in entries.iter() {
            *map.entry(entry.emotion_label.as_str()).or_insert(0) += 1;
        }

        let mut counts: Vec<EmotionCount> = map
            .into_iter()
            .map(|(label, count)| EmotionCount {
                emotion_label: label.to_string(),
                count,
            })
            .collect();
        sort_counts(&mut counts);
        Ok(counts)
    }

    async fn all_entries(&self) -> Result<Vec<JournalEntry>> {
        Ok(self.entries.read().await.clone())
    }
}
