use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JournalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Subject,
    Reviewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Subject => "subject",
            Role::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = JournalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "subject" => Ok(Role::Subject),
            "reviewer" => Ok(Role::Reviewer),
            other => Err(JournalError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

/// A classified submission as it lives in the log. Never mutated after the
/// store hands it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub subject_id: String,
    pub role: Role,
    pub text: String,
    pub emotion_label: String,
    pub created_at: DateTime<Utc>,
}

/// An entry before the store has stamped it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub subject_id: String,
    pub role: Role,
    pub text: String,
    pub emotion_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionCount {
    pub emotion_label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertSignal {
    pub subject_id: String,
    pub low_emotion_count: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl AlertSignal {
    pub fn message(&self) -> String {
        let window = self.window_end - self.window_start;
        let days = window.num_days();
        let hours = window.num_hours();
        let span = if window == Duration::weeks(1) {
            "the past week".to_string()
        } else if window == Duration::days(1) {
            "the past day".to_string()
        } else if days > 0 && window == Duration::days(days) {
            format!("the past {days} days")
        } else if hours > 0 && window == Duration::hours(hours) {
            format!("the past {hours} hours")
        } else {
            format!("the past {} minutes", window.num_minutes())
        };
        format!(
            "Student {} is showing signs of distress ({} low emotions in {}).",
            self.subject_id, self.low_emotion_count, span
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_its_own_rendering() {
        for role in [Role::Subject, Role::Reviewer] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("doctor".parse::<Role>().is_err());
    }

    #[test]
    fn alert_message_names_the_window() {
        let end = Utc::now();
        let mut alert = AlertSignal {
            subject_id: "Najlaa".to_string(),
            low_emotion_count: 3,
            window_start: end - Duration::days(7),
            window_end: end,
        };
        assert_eq!(
            alert.message(),
            "Student Najlaa is showing signs of distress (3 low emotions in the past week)."
        );

        alert.window_start = end - Duration::days(14);
        assert!(alert.message().ends_with("in the past 14 days)."));

        alert.window_start = end - Duration::hours(36);
        assert!(alert.message().ends_with("in the past 36 hours)."));

        alert.window_start = end - Duration::hours(180);
        assert!(alert.message().ends_with("in the past 180 hours)."));

        alert.window_start = end - Duration::minutes(90);
        assert!(alert.message().ends_with("in the past 90 minutes)."));
    }
}
