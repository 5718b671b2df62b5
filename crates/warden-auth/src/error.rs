//! Error types.

use thiserror::Error;
use warden_api::WardenError;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was absent. Always a caller bug.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A required option was left unset or empty.
    #[error("the '{0}' option must be provided")]
    MissingOption(&'static str),

    /// Options are set but contradict each other.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The cookie cannot be written as a `Set-Cookie` header.
    #[error("invalid cookie: {0}")]
    Cookie(String),

    /// A scheme handler or the authorization service faulted.
    #[error(transparent)]
    Api(#[from] WardenError),
}
