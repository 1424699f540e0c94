//! Auth collaborator: token sign-in against the backend, with the session
//! cached in a JSON file between runs (the caller picks the path).

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use daymark_core::store::{AuthProvider, StoreError, StoreResult, User};

use crate::client::error_from_status;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Read a cached session; a missing file is simply "not signed in".
pub fn load_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn save_session(path: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn clear_session(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

impl AuthProvider for AuthClient {
    /// The cached session is trusted here; a revoked token shows up as
    /// `Unauthorized` on the first store operation instead.
    async fn current_user(&mut self) -> StoreResult<Option<User>> {
        Ok(self.session.as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in(&mut self, token: &str) -> StoreResult<User> {
        #[derive(Serialize)]
        struct Body<'a> {
            token: &'a str,
        }

        debug!("signing in");
        let resp = self
            .http
            .post(self.endpoint("auth/session"))
            .json(&Body { token })
            .send()
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_status(status, body));
        }
        let user: User = resp
            .json()
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;

        self.session = Some(Session {
            token: token.to_string(),
            user: user.clone(),
        });
        Ok(user)
    }

    async fn sign_out(&mut self) -> StoreResult<()> {
        if let Some(session) = self.session.take() {
            // Best effort: the local session is gone either way.
            let result = self
                .http
                .delete(self.endpoint("auth/session"))
                .bearer_auth(&session.token)
                .send()
                .await;
            if let Err(err) = result {
                debug!(%err, "remote sign-out failed; local session cleared anyway");
            }
        }
        Ok(())
    }
}
