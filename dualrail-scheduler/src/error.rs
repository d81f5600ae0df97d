use uuid::Uuid;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Deriver(#[from] dualrail_deriver::DeriverError),

    #[error(transparent)]
    Connector(#[from] dualrail_metrics::ConnectorError),

    #[error(transparent)]
    Rating(#[from] dualrail_rating::RatingError),

    #[error(transparent)]
    Anomaly(#[from] dualrail_anomaly::AnomalyError),

    #[error(transparent)]
    Store(#[from] dualrail_store::StoreError),

    #[error("cycle exceeded its deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("no rating policy configured for customer {0}")]
    NoPolicy(Uuid),
}
