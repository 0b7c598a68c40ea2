//! Identity provider boundary.
//!
//! DESIGN
//! ======
//! The hosted identity provider (email/password plus federated sign-in) is an
//! opaque collaborator. [`IdentityProvider`] is the seam: the session manager
//! only calls the operations listed here, and tests substitute a mock.
//!
//! Identity-state changes are delivered as a stream of `Option<Identity>`
//! values. The provider sends the current state as the first message after
//! subscription, then one message per actual change.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ErrorCode;
use crate::role::Role;

/// Token claims as issued by the provider: claim name to JSON value.
pub type Claims = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// IDENTITY
// =============================================================================

/// How the identity authenticated. Serialized with the backend's historical
/// `provider` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignInMethod {
    #[serde(rename = "email")]
    Password,
    #[serde(rename = "google")]
    Federated,
}

/// The authenticated principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub method: SignInMethod,
    #[serde(default)]
    pub claims: Claims,
}

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>, method: SignInMethod) -> Self {
        Self { id: id.into(), email: email.into(), display_name: None, avatar_url: None, method, claims: Claims::new() }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }
}

/// Role implied by token claims, if the provider carries one.
///
/// Recognizes a string `role` claim or a boolean `admin` claim. Used for
/// diagnostics only; the backend role is authoritative.
#[must_use]
pub fn claims_role(claims: &Claims) -> Option<Role> {
    if let Some(role) = claims.get("role").and_then(serde_json::Value::as_str) {
        return Some(Role::from_wire(Some(role)));
    }
    claims
        .get("admin")
        .and_then(serde_json::Value::as_bool)
        .map(|admin| if admin { Role::Admin } else { Role::User })
}

// =============================================================================
// ERROR
// =============================================================================

/// Rejections reported by the identity provider. Display text is meant to be
/// shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("the email address is badly formatted")]
    InvalidEmail,
    #[error("the password is too weak")]
    WeakPassword,
    #[error("an account already exists for this email address")]
    AccountExists,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("sign-in was cancelled")]
    Cancelled,
    #[error("no signed-in identity")]
    NoIdentity,
    #[error("{0}")]
    Provider(String),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::AccountExists => "E_ACCOUNT_EXISTS",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Cancelled => "E_CANCELLED",
            Self::NoIdentity => "E_NO_IDENTITY",
            Self::Provider(_) => "E_PROVIDER",
        }
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Operations consumed from the hosted identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a new password account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] for malformed emails, weak passwords and duplicates.
    async fn create_user_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the pair is rejected.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Run the provider's interactive federated sign-in flow.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cancelled`] if the user abandons the flow.
    async fn sign_in_federated(&self) -> Result<Identity, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError`] if the provider fails to end the session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Set the profile display name on the provider side.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the provider rejects the update.
    async fn update_display_name(&self, identity: &Identity, display_name: &str) -> Result<(), AuthError>;

    /// Claims of the current identity's token. `force_refresh` mints a new
    /// token first, picking up out-of-band privilege changes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoIdentity`] when nobody is signed in.
    async fn token_claims(&self, force_refresh: bool) -> Result<Claims, AuthError>;

    fn current_identity(&self) -> Option<Identity>;

    /// Subscribe to identity-state changes.
    fn identity_changes(&self) -> mpsc::UnboundedReceiver<Option<Identity>>;
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
