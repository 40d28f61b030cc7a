//! Negotiation error types.

use thiserror::Error;

use crate::mechanism::Mechanism;

/// Errors that can occur during selection enumeration and credential
/// acquisition.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No username was supplied and none could be resolved from the OS.
    #[error("no username available")]
    NoUsername,

    /// The guessers produced zero selections.
    #[error("no authentication mechanism available")]
    NoMechanism,

    /// The session was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Acquisition was requested without a password or client certificate.
    #[error("insufficient credentials: nothing to try")]
    MissingCredentials,

    /// A provider reported a failure.
    #[error("{mech} provider error {code}: {message}")]
    Provider {
        /// Mechanism whose provider failed.
        mech: Mechanism,
        /// Provider-reported numeric status.
        code: i32,
        /// Provider-reported message.
        message: String,
    },

    /// A name string could not be parsed.
    #[error("parse failure: {0}")]
    Parse(String),

    /// Realm discovery or preference access failed.
    #[error("I/O failure: {0}")]
    Io(String),
}

impl Error {
    /// Build a provider failure for the given mechanism.
    pub fn provider(mech: Mechanism, code: i32, message: impl Into<String>) -> Self {
        Self::Provider {
            mech,
            code,
            message: message.into(),
        }
    }
}

/// Result alias for negotiation operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
