//! Emotion classification.
//!
//! Two clients sit behind [`EmotionClassifier`]: [`InferenceClassifier`] talks
//! to a model runtime and picks the best candidate itself, [`RemoteClassifier`]
//! calls a `/classify` service that already did that work.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};
use crate::models::Prediction;

pub const DEFAULT_MIN_CHARS: usize = 20;
pub const DEFAULT_MAX_CHARS: usize = 500;

pub const EMPTY_TEXT_MESSAGE: &str = "Text must not be empty or whitespace only.";

#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Prediction>;
}

/// Length and content bounds for a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLimits {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl TextLimits {
    /// Every violated constraint, as a user-facing sentence.
    pub fn check(&self, text: &str) -> Vec<String> {
        let mut problems = Vec::new();
        let chars = text.chars().count();

        if chars < self.min_chars {
            problems.push(format!(
                "Please enter at least {} characters.",
                self.min_chars
            ));
        }
        if chars > self.max_chars {
            problems.push(format!(
                "Please limit your journal entry to {} characters.",
                self.max_chars
            ));
        }
        if text.trim().is_empty() {
            problems.push(EMPTY_TEXT_MESSAGE.to_string());
        }

        problems
    }

    pub fn validate(&self, text: &str) -> Result<()> {
        let problems = self.check(text);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(JournalError::ValidationFailed(problems))
        }
    }
}

/// The single label for an entry: the highest-scoring candidate.
pub fn pick_best(candidates: Vec<Prediction>) -> Result<Prediction> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| {
            JournalError::ClassificationUnavailable(
                "model returned no usable candidates".to_string(),
            )
        })
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| JournalError::ClassificationUnavailable(err.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceOutput {
    Batched(Vec<Vec<Prediction>>),
    Flat(Vec<Prediction>),
}

impl InferenceOutput {
    fn into_candidates(self) -> Vec<Prediction> {
        match self {
            InferenceOutput::Batched(batches) => batches.into_iter().next().unwrap_or_default(),
            InferenceOutput::Flat(candidates) => candidates,
        }
    }
}

/// Client for a text-classification model runtime that returns every label
/// with its score.
pub struct InferenceClassifier {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl InferenceClassifier {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            token,
        })
    }
}

#[async_trait]
impl EmotionClassifier for InferenceClassifier {
    async fn classify(&self, text: &str) -> Result<Prediction> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            tracing::error!(error = %err, endpoint = %self.endpoint, "model request failed");
            JournalError::ClassificationUnavailable(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "model returned an error");
            return Err(JournalError::ClassificationUnavailable(format!(
                "model returned {status}"
            )));
        }

        let output: InferenceOutput = response
            .json()
            .await
            .map_err(|err| JournalError::ClassificationUnavailable(err.to_string()))?;
        let best = pick_best(output.into_candidates())?;
        tracing::debug!(label = %best.label, score = best.score, "classified entry");
        Ok(best)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: serde_json::Value,
}

fn detail_messages(detail: serde_json::Value) -> Vec<String> {
    match detail {
        serde_json::Value::String(message) => vec![message],
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(message) => message,
                other => other.to_string(),
            })
            .collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Client of the split deployment's `POST /classify` service.
pub struct RemoteClassifier {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmotionClassifier for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<Prediction> {
        let url = format!("{}/classify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|err| {
                tracing::error!(error = %err, url = %url, "classification request failed");
                JournalError::ClassificationUnavailable(err.to_string())
            })?;

        match response.status() {
            StatusCode::OK => response
                .json::<Prediction>()
                .await
                .map_err(|err| JournalError::ClassificationUnavailable(err.to_string())),
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body: ErrorBody = response
                    .json()
                    .await
                    .map_err(|err| JournalError::ClassificationUnavailable(err.to_string()))?;
                Err(JournalError::ValidationFailed(detail_messages(body.detail)))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(%status, body = %body, "classification service error");
                Err(JournalError::ClassificationUnavailable(format!(
                    "Error {}: {}",
                    status.as_u16(),
                    body
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, score: f64) -> Prediction {
        Prediction {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn best_candidate_wins() {
        let best = pick_best(vec![
            candidate("neutral", 0.12),
            candidate("sadness", 0.71),
            candidate("grief", 0.09),
        ])
        .unwrap();
        assert_eq!(best.label, "sadness");
    }

    #[test]
    fn no_candidates_is_a_failure() {
        assert!(matches!(
            pick_best(Vec::new()),
            Err(JournalError::ClassificationUnavailable(_))
        ));
        assert!(pick_best(vec![candidate("joy", f64::NAN)]).is_err());
    }

    #[test]
    fn limits_report_original_messages() {
        let limits = TextLimits::default();
        assert!(limits.check("I am feeling very happy and excited about my day.").is_empty());

        assert_eq!(
            limits.check("Too short"),
            vec!["Please enter at least 20 characters.".to_string()]
        );
        assert_eq!(
            limits.check(&"a".repeat(501)),
            vec!["Please limit your journal entry to 500 characters.".to_string()]
        );
        assert_eq!(
            limits.check(&" ".repeat(20)),
            vec![EMPTY_TEXT_MESSAGE.to_string()]
        );
        assert_eq!(limits.check("").len(), 2);
    }

    #[test]
    fn limits_count_characters_not_bytes() {
        let limits = TextLimits {
            min_chars: 3,
            max_chars: 4,
        };
        assert!(limits.check("éééé").is_empty());
        assert!(matches!(
            limits.validate("ééééé"),
            Err(JournalError::ValidationFailed(_))
        ));
    }

    #[test]
    fn inference_output_accepts_both_shapes() {
        let batched: InferenceOutput =
            serde_json::from_str(r#"[[{"label":"joy","score":0.9},{"label":"fear","score":0.1}]]"#)
                .unwrap();
        assert_eq!(pick_best(batched.into_candidates()).unwrap().label, "joy");

        let flat: InferenceOutput =
            serde_json::from_str(r#"[{"label":"anger","score":0.6},{"label":"joy","score":0.4}]"#)
                .unwrap();
        assert_eq!(pick_best(flat.into_candidates()).unwrap().label, "anger");
    }

    #[test]
    fn detail_accepts_list_or_string() {
        assert_eq!(
            detail_messages(serde_json::json!(["a", "b"])),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            detail_messages(serde_json::json!("Classifier model not loaded.")),
            vec!["Classifier model not loaded.".to_string()]
        );
    }
}
