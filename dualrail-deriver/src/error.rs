use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeriverError {
    #[error("store error: {0}")]
    Store(#[from] dualrail_store::StoreError),
}
