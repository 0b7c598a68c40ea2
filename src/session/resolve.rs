//! Role resolution against the backend.
//!
//! Every failure here degrades to [`Role::User`]. Nothing is returned as an
//! error: a backend outage only withholds elevated privileges.

use crate::backend::{CreateOutcome, NewUser, UserDirectory};
use crate::identity::{Claims, Identity, claims_role};
use crate::role::Role;

/// Look up the role for `identity`, provisioning a record on 404.
///
/// `claims` are the token claims to compare against for diagnostics.
pub(crate) async fn resolve_role(directory: &dyn UserDirectory, identity: &Identity, claims: &Claims) -> Role {
    match directory.get_user(&identity.id).await {
        Ok(Some(record)) => {
            warn_on_claims_mismatch(&identity.id, claims, record.role);
            record.role
        }
        Ok(None) => {
            tracing::info!(uid = %identity.id, "no user record, provisioning");
            provision(directory, &NewUser::from_identity(identity)).await;
            Role::User
        }
        Err(e) => {
            tracing::warn!(uid = %identity.id, error = %e, "role lookup failed, defaulting to user");
            Role::User
        }
    }
}

/// Create a backend user record. Failures are logged only.
pub(crate) async fn provision(directory: &dyn UserDirectory, user: &NewUser) -> Option<CreateOutcome> {
    match directory.create_user(user).await {
        Ok(CreateOutcome::Created) => {
            tracing::info!(uid = %user.uid, provider = ?user.provider, "user record created");
            Some(CreateOutcome::Created)
        }
        Ok(CreateOutcome::AlreadyExists) => {
            tracing::debug!(uid = %user.uid, "user record already exists");
            Some(CreateOutcome::AlreadyExists)
        }
        Err(e) => {
            tracing::warn!(uid = %user.uid, error = %e, "user record create failed");
            None
        }
    }
}

fn warn_on_claims_mismatch(uid: &str, claims: &Claims, backend_role: Role) {
    if let Some(claimed) = claims_role(claims) {
        if claimed != backend_role {
            tracing::warn!(%uid, %claimed, backend = %backend_role, "token claims disagree with backend role");
        }
    }
}

#[cfg(test)]
#[path = "resolve_test.rs"]
mod tests;
