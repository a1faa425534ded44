use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};
use crate::models::Role;

/// Maps a username/password pair to a role. Production deployments plug an
/// identity provider in here.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Option<Role>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Fixed in-memory credential table. Plain-text, no rotation: only for demos
/// and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, (String, Role)>,
}

impl StaticCredentials {
    pub fn new(credentials: impl IntoIterator<Item = Credential>) -> Self {
        Self {
            users: credentials
                .into_iter()
                .map(|c| (c.username, (c.password, c.role)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> Option<Role> {
        self.users
            .get(username)
            .filter(|(expected, _)| expected == password)
            .map(|(_, role)| *role)
    }
}

/// Who is calling. Built once per login and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    username: String,
    role: Role,
}

impl SessionContext {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn require(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(JournalError::Forbidden(format!(
                "{} is signed in as {}, this view needs {}",
                self.username, self.role, role
            )))
        }
    }
}

pub fn authenticate(
    verifier: &dyn CredentialVerifier,
    username: &str,
    password: &str,
) -> Result<SessionContext> {
    match verifier.verify(username, password) {
        Some(role) => {
            tracing::info!(username = %username, role = %role, "signed in");
            Ok(SessionContext::new(username, role))
        }
        None => {
            tracing::warn!(username = %username, "rejected sign-in");
            Err(JournalError::Unauthenticated)
        }
    }
}
