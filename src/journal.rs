use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::{histories_from_entries, AlertPolicy};
use crate::auth::SessionContext;
use crate::classifier::{EmotionClassifier, TextLimits};
use crate::error::Result;
use crate::models::{AlertSignal, EmotionCount, JournalEntry, NewEntry, Role};
use crate::store::EntryStore;

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub entry: JournalEntry,
    pub score: f64,
}

impl Submission {
    pub fn message(&self) -> String {
        format!(
            "We understand you're feeling {}. Thank you for sharing, we're here to support you through it all!",
            self.entry.emotion_label
        )
    }
}

/// Everything the reviewer dashboard shows, computed at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub alerts: Vec<AlertSignal>,
    pub distribution: Vec<EmotionCount>,
    pub entries_by_subject: BTreeMap<String, Vec<JournalEntry>>,
}

pub struct JournalService {
    store: Arc<dyn EntryStore>,
    classifier: Arc<dyn EmotionClassifier>,
    policy: AlertPolicy,
    limits: TextLimits,
}

impl JournalService {
    pub fn new(
        store: Arc<dyn EntryStore>,
        classifier: Arc<dyn EmotionClassifier>,
        policy: AlertPolicy,
        limits: TextLimits,
    ) -> Self {
        Self {
            store,
            classifier,
            policy,
            limits,
        }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub async fn submit(&self, ctx: &SessionContext, text: &str) -> Result<Submission> {
        ctx.require(Role::Subject)?;
        self.limits.validate(text)?;

        let prediction = self.classifier.classify(text).await?;
        let entry = self
            .store
            .append(NewEntry {
                subject_id: ctx.username().to_string(),
                role: Role::Subject,
                text: text.to_string(),
                emotion_label: prediction.label,
            })
            .await?;

        tracing::info!(
            subject_id = %entry.subject_id,
            emotion = %entry.emotion_label,
            score = prediction.score,
            "journal entry stored"
        );

        Ok(Submission {
            entry,
            score: prediction.score,
        })
    }

    /// The caller's own entries, newest first.
    pub async fn own_history(&self, ctx: &SessionContext) -> Result<Vec<JournalEntry>> {
        ctx.require(Role::Subject)?;
        let mut entries = self.store.query_by_subject(ctx.username(), None).await?;
        entries.reverse();
        Ok(entries)
    }

    pub async fn alerts(&self, ctx: &SessionContext, now: DateTime<Utc>) -> Result<Vec<AlertSignal>> {
        ctx.require(Role::Reviewer)?;
        self.evaluate_recent(now).await
    }

    pub async fn emotion_distribution(&self, ctx: &SessionContext) -> Result<Vec<EmotionCount>> {
        ctx.require(Role::Reviewer)?;
        self.store.emotion_counts().await
    }

    pub async fn subject_entries(
        &self,
        ctx: &SessionContext,
        subject_id: &str,
    ) -> Result<Vec<JournalEntry>> {
        ctx.require(Role::Reviewer)?;
        let entries = self.store.query_by_subject(subject_id, None).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.role == Role::Subject)
            .collect())
    }

    pub async fn dashboard(&self, ctx: &SessionContext, now: DateTime<Utc>) -> Result<Dashboard> {
        ctx.require(Role::Reviewer)?;

        let alerts = self.evaluate_recent(now).await?;
        let distribution = self.store.emotion_counts().await?;
        let mut entries_by_subject = BTreeMap::new();
        for subject_id in self.store.distinct_subjects(Role::Subject).await? {
            let entries = self.subject_entries(ctx, &subject_id).await?;
            entries_by_subject.insert(subject_id, entries);
        }

        Ok(Dashboard {
            generated_at: now,
            alerts,
            distribution,
            entries_by_subject,
        })
    }

    async fn evaluate_recent(&self, now: DateTime<Utc>) -> Result<Vec<AlertSignal>> {
        let since = self.policy.window_start(now)?;
        let mut recent = Vec::new();
        for subject_id in self.store.distinct_subjects(Role::Subject).await? {
            recent.extend(self.store.query_by_subject(&subject_id, Some(since)).await?);
        }

        let histories = histories_from_entries(&recent);
        let alerts = self.policy.evaluate(&histories, now)?;
        for alert in &alerts {
            tracing::warn!(
                subject_id = %alert.subject_id,
                low_emotion_count = alert.low_emotion_count,
                "distress alert"
            );
        }
        Ok(alerts)
    }
}
