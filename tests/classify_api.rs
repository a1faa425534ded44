//! HTTP contract of the classification service.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use mood_journal::api::{create_router, CLASSIFICATION_FAILED, MODEL_NOT_LOADED};
use mood_journal::classifier::{EmotionClassifier, TextLimits};
use mood_journal::models::Prediction;
use mood_journal::{JournalError, Result};
use serde_json::Value;
use tower::ServiceExt;

struct FixedClassifier;

#[async_trait]
impl EmotionClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<Prediction> {
        Ok(Prediction {
            label: "joy".to_string(),
            score: 0.93,
        })
    }
}

struct BrokenClassifier;

#[async_trait]
impl EmotionClassifier for BrokenClassifier {
    async fn classify(&self, _text: &str) -> Result<Prediction> {
        Err(JournalError::ClassificationUnavailable("model crashed".to_string()))
    }
}

fn router_with(classifier: Option<Arc<dyn EmotionClassifier>>) -> axum::Router {
    create_router(classifier, TextLimits::default())
}

async fn post_classify(app: axum::Router, text: &str) -> (StatusCode, Value) {
    post_raw(app, serde_json::json!({ "text": text }).to_string()).await
}

async fn post_raw(app: axum::Router, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/classify")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn details(json: &Value) -> Vec<String> {
    json["detail"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_classify_valid_text() {
    let app = router_with(Some(Arc::new(FixedClassifier)));
    let (status, json) = post_classify(app, "I am feeling very happy and excited about my day.").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["label"], "joy");
    assert!((json["score"].as_f64().unwrap() - 0.93).abs() < 1e-9);
}

#[tokio::test]
async fn test_classify_short_text() {
    let app = router_with(Some(Arc::new(FixedClassifier)));
    let (status, json) = post_classify(app, "Too short").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(details(&json).contains(&"Please enter at least 20 characters.".to_string()));
}

#[tokio::test]
async fn test_classify_long_text() {
    let app = router_with(Some(Arc::new(FixedClassifier)));
    let (status, json) = post_classify(app, &"a".repeat(501)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(details(&json)
        .contains(&"Please limit your journal entry to 500 characters.".to_string()));
}

#[tokio::test]
async fn test_classify_whitespace_text() {
    let app = router_with(Some(Arc::new(FixedClassifier)));
    let (status, json) = post_classify(app, &" ".repeat(20)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        details(&json),
        vec!["Text must not be empty or whitespace only.".to_string()]
    );
}

#[tokio::test]
async fn test_model_not_loaded() {
    let app = router_with(None);
    let (status, json) =
        post_classify(app, "This is a valid text input with more than 20 characters.").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["detail"], MODEL_NOT_LOADED);
}

#[tokio::test]
async fn test_validation_runs_before_model_check() {
    let app = router_with(None);
    let (status, _) = post_classify(app, "Too short").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_model_failure_is_opaque() {
    let app = router_with(Some(Arc::new(BrokenClassifier)));
    let (status, json) =
        post_classify(app, "This is a valid text input with more than 20 characters.").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["detail"], CLASSIFICATION_FAILED);
}

#[tokio::test]
async fn test_malformed_bodies_use_the_detail_shape() {
    for body in ["{}", r#"{"text": null}"#, r#"{"text": 42}"#, "not json"] {
        let app = router_with(Some(Arc::new(FixedClassifier)));
        let (status, json) = post_raw(app, body.to_string()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body {body}");
        let messages = details(&json);
        assert_eq!(messages.len(), 1, "body {body}");
        assert!(!messages[0].is_empty());
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = router_with(None);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model_loaded"], false);
}
