use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unexpected response shape: {0}")]
    ResponseShape(String),

    #[error("health probe failed: {0}")]
    Unhealthy(String),

    #[error("store error: {0}")]
    Store(#[from] dualrail_store::StoreError),
}
