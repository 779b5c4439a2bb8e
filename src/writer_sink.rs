use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes records as JSON lines to any [`Write`].
///
/// Usable both synchronously (the JSON backend's direct path) and as an
/// async [`LogSink`] behind a dispatcher.
pub struct WriterSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        WriterSink::from_boxed(Box::new(writer))
    }

    pub fn from_boxed(writer: Box<dyn Write + Send>) -> Self {
        WriterSink {
            writer: Mutex::new(writer),
        }
    }

    pub fn stderr() -> Self {
        WriterSink::new(io::stderr())
    }

    pub fn stdout() -> Self {
        WriterSink::new(io::stdout())
    }

    /// Serialize `record` and write it as one line.
    pub fn write_record(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        // A panic while holding the lock leaves the writer usable.
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(&line)?;
        Ok(())
    }

    pub fn flush_writer(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for WriterSink {
    async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.write_record(record)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.flush_writer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(msg: &str) -> LogRecord {
        LogRecord {
            ts: "t".into(),
            level: Level::Info,
            logger: None,
            msg: msg.into(),
            caller: None,
            fields: Default::default(),
        }
    }

    #[test]
    fn writes_one_line_per_record() {
        let buf = Shared::default();
        let sink = WriterSink::new(buf.clone());
        sink.write_record(&record("a")).unwrap();
        sink.write_record(&record("b")).unwrap();
        sink.flush_writer().unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains(r#""msg":"b""#));
    }

    #[tokio::test]
    async fn works_as_async_sink() {
        let buf = Shared::default();
        let sink: Arc<dyn LogSink> = Arc::new(WriterSink::new(buf.clone()));
        sink.send(&record("async")).await.unwrap();
        sink.flush().await.unwrap();
        assert!(!buf.0.lock().unwrap().is_empty());
    }
}
