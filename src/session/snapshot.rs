//! Published session state.

use serde::Serialize;

use crate::identity::Identity;
use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    /// No identity-provider callback has been received yet.
    Initializing,
    Ready,
}

/// Where the session state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Initializing,
    /// An identity is present and its role lookup is in flight.
    Resolving,
    /// Settled with no identity.
    Anonymous,
    /// Settled with an identity and a resolved role.
    Ready,
}

/// Immutable view of the session at one point in time.
///
/// Fields are private so that an absent identity always pairs with
/// [`Role::User`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    identity: Option<Identity>,
    role: Role,
    loading: LoadingState,
}

impl SessionSnapshot {
    #[must_use]
    pub fn initializing() -> Self {
        Self { identity: None, role: Role::User, loading: LoadingState::Initializing }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { identity: None, role: Role::User, loading: LoadingState::Ready }
    }

    #[must_use]
    pub fn signed_in(identity: Identity, role: Role) -> Self {
        Self { identity: Some(identity), role, loading: LoadingState::Ready }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn loading(&self) -> LoadingState {
        self.loading
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.loading == LoadingState::Ready
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.identity.is_some() && self.role.is_admin()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initializing()
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
