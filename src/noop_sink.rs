use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;

/// A sink that simply drops all records.
///
/// Useful for measuring the cost of field translation and dispatch without
/// any I/O.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &LogRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
