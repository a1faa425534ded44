//! The interface talking to a live classification service over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mood_journal::alerts::AlertPolicy;
use mood_journal::api::create_router;
use mood_journal::auth::SessionContext;
use mood_journal::classifier::{EmotionClassifier, RemoteClassifier, TextLimits};
use mood_journal::journal::JournalService;
use mood_journal::models::{Prediction, Role};
use mood_journal::store::{EntryStore, MemoryEntryStore};
use mood_journal::{JournalError, Result};

struct KeywordClassifier;

#[async_trait]
impl EmotionClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Prediction> {
        let label = if text.contains("scared") { "fear" } else { "neutral" };
        Ok(Prediction {
            label: label.to_string(),
            score: 0.75,
        })
    }
}

async fn spawn_service(classifier: Option<Arc<dyn EmotionClassifier>>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(classifier, TextLimits::default());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn remote_classifier_round_trip() {
    let base = spawn_service(Some(Arc::new(KeywordClassifier))).await;
    let remote = RemoteClassifier::new(base, Duration::from_secs(5)).unwrap();

    let prediction = remote
        .classify("I am scared about tomorrow's presentation.")
        .await
        .unwrap();
    assert_eq!(prediction.label, "fear");
}

#[tokio::test]
async fn remote_validation_errors_are_actionable() {
    let base = spawn_service(Some(Arc::new(KeywordClassifier))).await;
    let remote = RemoteClassifier::new(base, Duration::from_secs(5)).unwrap();

    match remote.classify("Too short").await {
        Err(JournalError::ValidationFailed(messages)) => {
            assert_eq!(messages, vec!["Please enter at least 20 characters.".to_string()]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn remote_without_model_is_unavailable() {
    let base = spawn_service(None).await;
    let remote = RemoteClassifier::new(base, Duration::from_secs(5)).unwrap();

    let err = remote
        .classify("This is a valid text input with more than 20 characters.")
        .await
        .unwrap_err();
    match err {
        JournalError::ClassificationUnavailable(message) => {
            assert!(message.starts_with("Error 500"));
            assert!(message.contains("Classifier model not loaded."));
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn submissions_through_remote_service_raise_alerts() {
    let base = spawn_service(Some(Arc::new(KeywordClassifier))).await;
    let remote: Arc<dyn EmotionClassifier> =
        Arc::new(RemoteClassifier::new(base, Duration::from_secs(5)).unwrap());
    let store = Arc::new(MemoryEntryStore::new());
    let service = JournalService::new(
        store.clone(),
        remote,
        AlertPolicy::default(),
        TextLimits::default(),
    );

    let student = SessionContext::new("Najlaa", Role::Subject);
    for _ in 0..3 {
        service
            .submit(&student, "I am scared I will fail every exam this term.")
            .await
            .unwrap();
    }
    service
        .submit(&student, "Went for a walk by the river after lunch.")
        .await
        .unwrap();

    let doctor = SessionContext::new("Pedro", Role::Reviewer);
    let alerts = service
        .alerts(&doctor, Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].low_emotion_count, 3);

    let counts = store.emotion_counts().await.unwrap();
    assert_eq!(counts[0].emotion_label, "fear");
    assert_eq!(counts[0].count, 3);
}
