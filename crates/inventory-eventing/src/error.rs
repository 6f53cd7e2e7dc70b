use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EventError {
    #[error("serialize event: {0}")]
    Serialize(String),

    #[error("write event: {0}")]
    Io(String),

    #[error("event consumer is gone")]
    Closed,

    #[error("producer did not finish within {0:?}")]
    Timeout(Duration),
}
