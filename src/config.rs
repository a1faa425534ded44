use std::path::Path;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertPolicy, DEFAULT_LOW_EMOTIONS, DEFAULT_THRESHOLD, DEFAULT_WINDOW_DAYS};
use crate::auth::{Credential, StaticCredentials};
use crate::classifier::TextLimits;
use crate::error::JournalError;
use crate::models::Role;

fn default_low_emotions() -> Vec<String> {
    DEFAULT_LOW_EMOTIONS.iter().map(|s| s.to_string()).collect()
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_filter() -> String {
    "mood_journal=info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_low_emotions")]
    pub low_emotions: Vec<String>,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            low_emotions: default_low_emotions(),
            window_days: default_window_days(),
            threshold: default_threshold(),
        }
    }
}

impl AlertConfig {
    pub fn policy(&self) -> Result<AlertPolicy> {
        let window = Duration::try_days(self.window_days).ok_or_else(|| {
            JournalError::InvalidInput(format!(
                "alert window out of range: {} days",
                self.window_days
            ))
        });
        window
            .and_then(|window| {
                AlertPolicy::new(self.low_emotions.iter().cloned(), window, self.threshold)
            })
            .context("invalid alert configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of a running `/classify` service (split deployment).
    #[serde(default)]
    pub service_url: Option<String>,
    /// Model inference endpoint (all-in-one deployment and the service itself).
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub model_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            model_url: None,
            model_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub limits: TextLimits,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            alerts: AlertConfig::default(),
            limits: TextLimits::default(),
            classifier: ClassifierConfig::default(),
            credentials: Vec::new(),
            bind_addr: default_bind_addr(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => AppConfig::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CLASSIFIER_URL") {
            self.classifier.service_url = Some(url);
        }
        if let Ok(url) = std::env::var("MODEL_URL") {
            self.classifier.model_url = Some(url);
        }
        if let Ok(token) = std::env::var("MODEL_TOKEN") {
            self.classifier.model_token = Some(token);
        }
    }

    /// The configured table, or the demo accounts when none are configured.
    pub fn credential_table(&self) -> StaticCredentials {
        if self.credentials.is_empty() {
            tracing::warn!("no credentials configured, using demo accounts");
            return StaticCredentials::new(demo_credentials());
        }
        StaticCredentials::new(self.credentials.iter().cloned())
    }
}

fn demo_credentials() -> Vec<Credential> {
    [
        ("Najlaa", "password1", Role::Subject),
        ("Mohamed", "password1", Role::Subject),
        ("Pedro", "password2", Role::Reviewer),
        ("kilian", "password2", Role::Reviewer),
    ]
    .into_iter()
    .map(|(username, password, role)| Credential {
        username: username.to_string(),
        password: password.to_string(),
        role,
    })
    .collect()
}
