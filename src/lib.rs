//! QuickHire client session core.
//!
//! SYSTEM CONTEXT
//! ==============
//! The job board authenticates through a hosted identity provider and keeps
//! application roles (`user` / `admin`) in its own REST API. This crate owns
//! the piece in between: the [`session::SessionManager`] that watches the
//! provider, resolves and auto-provisions backend user records, and publishes
//! the snapshot route guards decide on.

pub mod backend;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod role;
pub mod role_check;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{HttpUserDirectory, UserDirectory};
pub use identity::{AuthError, Identity, IdentityProvider};
pub use role::Role;
pub use session::{SessionManager, SessionSnapshot};
