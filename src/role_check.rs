//! Role diagnostics: what the backend says about a uid, and whether token
//! claims agree. Read-only; never provisions.

use serde::Serialize;

use crate::backend::{UserDirectory, UserRecord};
use crate::identity::{Claims, claims_role};
use crate::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleReport {
    pub uid: String,
    /// Backend document, if the lookup returned one.
    pub record: Option<UserRecord>,
    /// Lookup failure text, if any. A 404 is not a failure.
    pub backend_error: Option<String>,
    /// Role after fail-safe coercion.
    pub role: Role,
    pub is_admin: bool,
    pub claims_role: Option<Role>,
    pub claims_mismatch: bool,
}

pub async fn check_role(directory: &dyn UserDirectory, uid: &str, claims: &Claims) -> RoleReport {
    let (record, backend_error) = match directory.get_user(uid).await {
        Ok(record) => (record, None),
        Err(e) => {
            tracing::warn!(%uid, error = %e, "role check lookup failed");
            (None, Some(e.to_string()))
        }
    };
    let role = record.as_ref().map_or(Role::User, |r| r.role);
    let claimed = claims_role(claims);
    RoleReport {
        uid: uid.to_owned(),
        record,
        backend_error,
        role,
        is_admin: role.is_admin(),
        claims_role: claimed,
        claims_mismatch: claimed.is_some_and(|c| c != role),
    }
}

/// `true` only when the backend positively reports `admin`.
pub async fn is_admin(directory: &dyn UserDirectory, uid: &str) -> bool {
    check_role(directory, uid, &Claims::new()).await.is_admin
}

#[cfg(test)]
#[path = "role_check_test.rs"]
mod tests;
