//! Shared error classification.
//!
//! Every error enum in the crate carries a stable machine code alongside its
//! human-readable `Display` text, so callers can branch on the code and show
//! the message.

pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
