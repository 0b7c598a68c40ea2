//! Backend user documents, errors and the directory trait.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ErrorCode;
use crate::identity::{Identity, SignInMethod};
use crate::role::Role;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by backend user-directory calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (connect failure, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with an unexpected status.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),
}

impl ErrorCode for BackendError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Request(_) => "E_API_REQUEST",
            Self::Status { .. } => "E_API_STATUS",
            Self::Parse(_) => "E_API_PARSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// A user document as returned by `GET /users/{uid}`.
///
/// Everything except `role` is kept loosely typed: the collection has been
/// written by more than one client over time. `role` is coerced here and
/// nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "crate::role::deserialize_lenient")]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
}

/// Body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub provider: SignInMethod,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl NewUser {
    /// Build a least-privileged record for a freshly seen identity.
    #[must_use]
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            uid: identity.id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            photo_url: identity.avatar_url.clone(),
            provider: identity.method,
            role: Role::User,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Result of `POST /users` that is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// 409: another session created the record first.
    AlreadyExists,
}

// =============================================================================
// DIRECTORY TRAIT
// =============================================================================

/// The `users` collection of the remote REST API. Enables mocking in tests.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user document. `Ok(None)` means the backend answered 404.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on transport failures, other statuses, or an
    /// undecodable body.
    async fn get_user(&self, uid: &str) -> Result<Option<UserRecord>, BackendError>;

    /// Create a user document.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on transport failures or statuses other than
    /// 2xx and 409.
    async fn create_user(&self, user: &NewUser) -> Result<CreateOutcome, BackendError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
