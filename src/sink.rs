use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Error reported by a sink or by the dispatcher in front of it.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("dispatch channel is full")]
    Full,

    #[error("dispatcher has shut down")]
    Closed,

    #[error("flush did not finish within {0:?}")]
    Timeout(std::time::Duration),

    #[error("cannot wait for the dispatcher from a current-thread runtime")]
    CurrentThread,

    #[error("sink error: {0}")]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

/// Asynchronous destination for [`LogRecord`]s.
///
/// Implementations transport records to a concrete destination (a file,
/// stdout, a database, a collector). The
/// [`Dispatcher`](crate::dispatch::Dispatcher) calls `send` from a
/// background task and never awaits it on the logging thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted.
    /// - `Err(..)` if the destination failed. The dispatcher treats this as
    ///   transient and retries the rest of the batch with backoff.
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Flush any buffered records. Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
