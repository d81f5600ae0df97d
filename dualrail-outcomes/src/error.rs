use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("outcome verification {0} not found")]
    NotFound(Uuid),

    #[error("outcome verification {0} already in a final state, transitions are one-way")]
    AlreadyFinal(Uuid),

    #[error("concurrent modification detected, retry")]
    StaleState,
}
