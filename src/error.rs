//! Error handler for registrar.

use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
///
/// No variant is recovered locally: every failure surfaces unchanged to
/// the caller.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("unique constraint violated on `{field}`")]
    Constraint { field: &'static str },

    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("mail transport failed: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    #[error("no sender address: missing `mail` entry on `config.yaml` file")]
    MissingSender,

    #[error("missing `{0}` entry on `config.yaml` file")]
    MissingConfig(&'static str),
}

impl ServerError {
    /// Wrap a transport-level failure raised by a mail gateway.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(err))
    }
}
