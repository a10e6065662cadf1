use caravan_types::models::RequestStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The (from, to) pair is not in the transition table. Client error,
    /// never worth retrying.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("a provider user is required when accepting a request")]
    MissingProvider,

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transactional store error. Safe to retry with the same inputs; no
    /// partial state is ever left visible.
    #[error("persistence failure")]
    Persistence(#[source] anyhow::Error),

    #[error("no renderer for template key '{0}'")]
    UnknownTemplate(String),
}

impl EngineError {
    /// Errors raised inside a `Database::transaction` closure come back as
    /// `anyhow::Error`; recover the typed variant when it is one of ours.
    pub(crate) fn from_db(err: anyhow::Error) -> Self {
        match err.downcast::<EngineError>() {
            Ok(engine_err) => engine_err,
            Err(other) => EngineError::Persistence(other),
        }
    }
}
