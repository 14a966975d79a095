use thiserror::Error;

/// Failures surfaced by the link registry, redirect resolver and analytics.
///
/// The HTTP layer maps each variant to a status code; nothing in the core
/// formats responses itself.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    /// Missing, deleted, or owned by another tenant. Callers cannot tell which.
    #[error("Link not found")]
    NotFound,
    #[error("could not allocate a unique short code after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type LinkResult<T> = Result<T, LinkError>;
