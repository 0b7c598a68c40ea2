//! Application-level authorization tier.
//!
//! The backend stores the role as a loosely-typed field on the user document.
//! It is coerced into [`Role`] exactly once, when the HTTP response is read,
//! and anything other than an exact `"admin"` becomes [`Role::User`].

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Coerce a raw wire value. Missing, empty and unknown values all map to
    /// the least-privileged role.
    #[must_use]
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("admin") => Self::Admin,
            _ => Self::User,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `deserialize_with` hook for backend documents: accepts any JSON value
/// (or none) and never fails.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(Role::from_wire(raw.as_ref().and_then(serde_json::Value::as_str)))
}

#[cfg(test)]
#[path = "role_test.rs"]
mod tests;
