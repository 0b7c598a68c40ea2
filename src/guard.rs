//! Access decisions for route guards.
//!
//! Pure functions over a [`SessionSnapshot`]; the redirect and notice
//! rendering belong to the UI.

use crate::session::SessionSnapshot;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const ADMIN_DENIED_NOTICE: &str = "You do not have permission to access the admin panel.";

/// What a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Member,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The session has not settled yet; show a loading state.
    Pending,
    Allow,
    RedirectToLogin,
    Deny { notice: &'static str },
}

impl AccessDecision {
    /// Where the guard should navigate, if anywhere.
    #[must_use]
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Self::Pending | Self::Allow => None,
            Self::RedirectToLogin => Some(LOGIN_PATH),
            Self::Deny { .. } => Some(HOME_PATH),
        }
    }
}

#[must_use]
pub fn decide(route: RouteAccess, snapshot: &SessionSnapshot) -> AccessDecision {
    if route == RouteAccess::Public {
        return AccessDecision::Allow;
    }
    if !snapshot.is_ready() {
        return AccessDecision::Pending;
    }
    if !snapshot.is_signed_in() {
        return AccessDecision::RedirectToLogin;
    }
    match route {
        RouteAccess::Admin if !snapshot.is_admin() => AccessDecision::Deny { notice: ADMIN_DENIED_NOTICE },
        _ => AccessDecision::Allow,
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
