use thiserror::Error;

#[derive(Debug, Error)]
pub enum CogsError {
    #[error(transparent)]
    Store(#[from] dualrail_store::StoreError),
}
