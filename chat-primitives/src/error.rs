//! Shared error definitions for chat primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the chat runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided identifier could not be parsed.
    #[error("invalid identifier: {source}")]
    InvalidId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// A message role label was not recognised.
    #[error("unknown message role `{label}`")]
    UnknownRole {
        /// The offending role label.
        label: String,
    },
}
