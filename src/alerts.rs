//! Distress alert evaluation.
//!
//! A subject is flagged when at least `threshold` of their entries inside the
//! trailing `window` carry a label from the low-emotion set. The window is
//! anchored at the evaluation instant, never at calendar boundaries, and the
//! classifier's confidence plays no part in the decision.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{JournalError, Result};
use crate::models::{AlertSignal, JournalEntry, Role};

pub const DEFAULT_LOW_EMOTIONS: [&str; 5] = ["sadness", "grief", "fear", "anger", "nervousness"];
pub const DEFAULT_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_THRESHOLD: usize = 3;

/// One labelled point in a subject's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moment {
    pub label: String,
    pub at: DateTime<Utc>,
}

impl Moment {
    pub fn new(label: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            at,
        }
    }

    /// Builds a moment from a stored timestamp string. Accepts RFC 3339 and
    /// the zone-less `YYYY-MM-DD HH:MM:SS[.fff]` form, which is read as UTC.
    pub fn parse(label: impl Into<String>, raw: &str) -> Result<Self> {
        Ok(Self::new(label, parse_timestamp(raw)?))
    }
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(JournalError::InvalidInput(format!(
        "malformed timestamp '{raw}'"
    )))
}

/// Per-subject histories keyed by subject id. Only subjects with the
/// `subject` role belong in here.
pub type SubjectHistories = BTreeMap<String, Vec<Moment>>;

/// Groups store rows into engine input, dropping anything not written by a
/// subject.
pub fn histories_from_entries(entries: &[JournalEntry]) -> SubjectHistories {
    let mut histories = SubjectHistories::new();

    for entry in entries {
        if entry.role != Role::Subject {
            tracing::debug!(
                subject_id = %entry.subject_id,
                role = %entry.role,
                "skipping non-subject entry"
            );
            continue;
        }
        histories
            .entry(entry.subject_id.clone())
            .or_default()
            .push(Moment::new(entry.emotion_label.clone(), entry.created_at));
    }

    for moments in histories.values_mut() {
        moments.sort_by_key(|moment| moment.at);
    }

    histories
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPolicy {
    low_emotions: BTreeSet<String>,
    window: Duration,
    threshold: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            low_emotions: DEFAULT_LOW_EMOTIONS.iter().map(|s| s.to_string()).collect(),
            window: Duration::days(DEFAULT_WINDOW_DAYS),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AlertPolicy {
    pub fn new<I, S>(low_emotions: I, window: Duration, threshold: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let policy = Self {
            low_emotions: low_emotions.into_iter().map(Into::into).collect(),
            window,
            threshold,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window <= Duration::zero() {
            return Err(JournalError::InvalidInput(
                "alert window must be positive".to_string(),
            ));
        }
        if self.threshold == 0 {
            return Err(JournalError::InvalidInput(
                "alert threshold must be at least 1".to_string(),
            ));
        }
        if self.low_emotions.is_empty() {
            return Err(JournalError::InvalidInput(
                "low emotion set must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn low_emotions(&self) -> &BTreeSet<String> {
        &self.low_emotions
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_low(&self, label: &str) -> bool {
        self.low_emotions.contains(label)
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_sub_signed(self.window).ok_or_else(|| {
            JournalError::InvalidInput(format!(
                "alert window of {} days reaches before the representable range",
                self.window.num_days()
            ))
        })
    }

    /// Counts low-emotion moments inside `[now - window, now]`.
    pub fn low_count(&self, moments: &[Moment], now: DateTime<Utc>) -> Result<usize> {
        let start = self.window_start(now)?;
        Ok(moments
            .iter()
            .filter(|moment| moment.at >= start && moment.at <= now)
            .filter(|moment| self.is_low(&moment.label))
            .count())
    }

    /// Emits one signal per subject at or above the threshold, in ascending
    /// subject id order.
    pub fn evaluate(
        &self,
        histories: &SubjectHistories,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertSignal>> {
        self.validate()?;
        let window_start = self.window_start(now)?;
        let mut alerts = Vec::new();

        for (subject_id, moments) in histories {
            let count = self.low_count(moments, now)?;
            if count >= self.threshold {
                alerts.push(AlertSignal {
                    subject_id: subject_id.clone(),
                    low_emotion_count: count,
                    window_start,
                    window_end: now,
                });
            }
        }

        tracing::debug!(
            subjects = histories.len(),
            alerts = alerts.len(),
            threshold = self.threshold,
            "evaluated distress alerts"
        );

        Ok(alerts)
    }
}
