//! reqwest-backed [`UserDirectory`] for the job-board REST API.
//!
//! Unauthenticated JSON over HTTP(S) against a base URL. Pure parsing in
//! `parse_user` for testability.

use reqwest::{StatusCode, Url};

use super::types::{BackendError, CreateOutcome, NewUser, UserDirectory, UserRecord};
use crate::config::{ApiTimeouts, SessionConfig};

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpUserDirectory {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpUserDirectory {
    /// # Errors
    ///
    /// Returns [`BackendError::HttpClientBuild`] if the base URL does not
    /// parse or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeouts: ApiTimeouts) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url).map_err(|e| BackendError::HttpClientBuild(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::HttpClientBuild(format!("{base_url}: not a base URL")));
        }
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// # Errors
    ///
    /// See [`HttpUserDirectory::new`].
    pub fn from_config(config: &SessionConfig) -> Result<Self, BackendError> {
        Self::new(&config.api_base_url, config.timeouts)
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait::async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>, BackendError> {
        let url = self.endpoint(&["users", uid]);
        tracing::debug!(%url, "user lookup");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Status { status: status.as_u16(), body: text });
        }

        parse_user(&text).map(Some)
    }

    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome, BackendError> {
        let url = self.endpoint(&["users"]);
        tracing::debug!(%url, uid = %user.uid, "user create");

        let response = self
            .http
            .post(url)
            .json(user)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }
        if status == StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status: status.as_u16(), body })
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_user(json: &str) -> Result<UserRecord, BackendError> {
    serde_json::from_str(json).map_err(|e| BackendError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
