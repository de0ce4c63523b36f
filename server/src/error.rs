#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("event source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
    #[error("user {0} is not registered")]
    UserNotFound(String),
    #[error("failed to persist progress: {0:#}")]
    PersistenceFailure(anyhow::Error),
}
