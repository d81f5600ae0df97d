use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error(transparent)]
    Store(#[from] dualrail_store::StoreError),
}
