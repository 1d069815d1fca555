use crate::store::StoreError;

/// Recoverable lifecycle failures, surfaced to callers as kind + message.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ExamError {
    #[error("{0}")]
    AccessDenied(String),
    #[error("An attempt for this exam already exists")]
    DuplicateAttempt,
    #[error("Attempt is closed and no longer accepts answers")]
    AttemptClosed,
    #[error("Attempt has already been submitted")]
    AlreadyClosed,
    #[error("Time for this attempt has run out; it was submitted automatically")]
    AttemptExpired,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExamError {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied(_) => "access_denied",
            Self::DuplicateAttempt => "duplicate_attempt",
            Self::AttemptClosed => "attempt_closed",
            Self::AlreadyClosed => "already_closed",
            Self::AttemptExpired => "attempt_expired",
            Self::Validation(_) => "validation_error",
            Self::InvalidState(_) => "invalid_state",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store_error",
        }
    }

    pub(crate) fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub(crate) type ExamResult<T> = Result<T, ExamError>;
