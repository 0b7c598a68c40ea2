//! Backend REST API — the `users` collection.
//!
//! DESIGN
//! ======
//! The job-board API is an external collaborator. The session manager only
//! needs two calls from it (`GET /users/{uid}`, `POST /users`), exposed via
//! the [`UserDirectory`] trait so resolution logic can be tested without a
//! network.

pub mod http;
pub mod types;

pub use http::HttpUserDirectory;
pub use types::{BackendError, CreateOutcome, NewUser, UserDirectory, UserRecord};
