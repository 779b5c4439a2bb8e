use crate::record::LogRecord;
use crate::sink::{LogSink, SinkError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Duration, MissedTickBehavior};

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Buffering and batching knobs for a [`Dispatcher`].
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records handed to the sink per delivery.
/// - `flush_interval`: longest time a partial batch waits.
/// - `retry_backoff`: first delay after a failed delivery; doubles up to 10s.
/// - `max_retries`: failed attempts tolerated before a batch is dropped.
#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub retry_backoff: Duration,
    pub max_retries: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_millis(100),
            max_retries: 5,
        }
    }
}

/// Counter snapshot taken by [`Dispatcher::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records submitted.
    pub total: u64,
    /// Records accepted into the channel.
    pub enqueued: u64,
    /// Records dropped, either on a full channel or after exhausting retries.
    pub dropped: u64,
    /// Records the sink accepted.
    pub delivered: u64,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

enum Command {
    Record(LogRecord),
    Flush(Option<oneshot::Sender<()>>),
}

/// Hands records to an async [`LogSink`] through a bounded channel and a
/// background task, so sink I/O never runs on the logging thread.
///
/// Cloning is cheap; clones feed the same task. The task drains and exits
/// once every clone is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Command>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Spawn the background task on the current Tokio runtime.
    ///
    /// Minimal thresholds are enforced for `channel_buffer`, `batch_size`
    /// and `flush_interval` to avoid degenerate configurations.
    pub fn spawn(sink: Arc<dyn LogSink>, config: DispatchConfig) -> (Self, JoinHandle<()>) {
        let config = DispatchConfig {
            channel_buffer: config.channel_buffer.max(16),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval.max(Duration::from_millis(10)),
            retry_backoff: config.retry_backoff.max(Duration::from_millis(1)),
            max_retries: config.max_retries,
        };

        let (tx, rx) = mpsc::channel::<Command>(config.channel_buffer);
        let counters = Arc::new(Counters::default());
        let handle = tokio::spawn(run(sink, rx, config, Arc::clone(&counters)));

        (
            Dispatcher {
                sender: tx,
                counters,
            },
            handle,
        )
    }

    /// Queue a record without blocking. Drops and counts it when the
    /// channel is full.
    pub fn submit(&self, record: LogRecord) {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(Command::Record(record)) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "fieldlog", "dispatch channel full, dropping log record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Ask the task to deliver its pending batch and flush the sink,
    /// without waiting for it.
    pub fn request_flush(&self) -> Result<(), SinkError> {
        self.sender
            .try_send(Command::Flush(None))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => SinkError::Full,
                mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            })
    }

    /// Deliver everything queued so far, flush the sink, and wait for it.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Flush(Some(ack)))
            .await
            .map_err(|_| SinkError::Closed)?;
        done.await.map_err(|_| SinkError::Closed)
    }

    /// Blocking [`flush`](Dispatcher::flush) for synchronous callers, giving
    /// up after `limit`.
    ///
    /// Works from plain threads and from multi-thread runtimes. A
    /// current-thread runtime cannot drive the background task while its
    /// only thread waits, so there it fails with
    /// [`SinkError::CurrentThread`] after only requesting the flush.
    pub fn flush_blocking(&self, limit: Duration) -> Result<(), SinkError> {
        let sender = self.sender.clone();
        let (ack, done) = oneshot::channel();
        let wait = async move {
            let flushed = async {
                sender
                    .send(Command::Flush(Some(ack)))
                    .await
                    .map_err(|_| SinkError::Closed)?;
                done.await.map_err(|_| SinkError::Closed)
            };
            timeout(limit, flushed)
                .await
                .unwrap_or(Err(SinkError::Timeout(limit)))
        };

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                self.request_flush()?;
                Err(SinkError::CurrentThread)
            }
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(wait)),
            Err(_) => Builder::new_current_thread()
                .enable_time()
                .build()?
                .block_on(wait),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            total: self.counters.total.load(Ordering::Relaxed),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
        }
    }
}

async fn run(
    sink: Arc<dyn LogSink>,
    mut rx: mpsc::Receiver<Command>,
    config: DispatchConfig,
    counters: Arc<Counters>,
) {
    let mut batch = Vec::with_capacity(config.batch_size);
    let mut ticker = interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Record(record)) => {
                    batch.push(record);
                    if batch.len() >= config.batch_size {
                        deliver(&*sink, &mut batch, &config, &counters).await;
                    }
                }
                Some(Command::Flush(ack)) => {
                    deliver(&*sink, &mut batch, &config, &counters).await;
                    if let Err(err) = sink.flush().await {
                        tracing::warn!(target: "fieldlog", error = %err, "log sink flush failed");
                    }
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                None => {
                    deliver(&*sink, &mut batch, &config, &counters).await;
                    if let Err(err) = sink.flush().await {
                        tracing::warn!(target: "fieldlog", error = %err, "log sink flush failed");
                    }
                    break;
                }
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    deliver(&*sink, &mut batch, &config, &counters).await;
                }
            }
        }
    }
}

/// Send `batch` to the sink, retrying what is left after a failure.
/// Leaves `batch` empty.
async fn deliver(
    sink: &dyn LogSink,
    batch: &mut Vec<LogRecord>,
    config: &DispatchConfig,
    counters: &Counters,
) {
    let mut backoff = config.retry_backoff;
    let mut failures = 0;

    while !batch.is_empty() {
        let err = match send_batch(sink, batch, counters).await {
            Ok(()) => return,
            Err(err) => err,
        };

        if failures >= config.max_retries {
            counters
                .dropped
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
            tracing::warn!(
                target: "fieldlog",
                error = %err,
                dropped = batch.len(),
                "log sink kept failing, dropping batch"
            );
            batch.clear();
            return;
        }

        failures += 1;
        tracing::debug!(target: "fieldlog", error = %err, ?backoff, "log sink send failed, retrying");
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
    }
}

/// Send records in order, removing each one the sink accepts.
async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<LogRecord>,
    counters: &Counters,
) -> Result<(), SinkError> {
    let mut sent = 0;
    let mut result = Ok(());
    for record in batch.iter() {
        if let Err(err) = sink.send(record).await {
            result = Err(err);
            break;
        }
        sent += 1;
    }
    batch.drain(..sent);
    counters.delivered.fetch_add(sent as u64, Ordering::Relaxed);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        records: Mutex<Vec<String>>,
        flushes: AtomicU64,
    }

    #[async_trait]
    impl LogSink for Collect {
        async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record.msg.clone());
            Ok(())
        }

        async fn flush(&self) -> Result<(), SinkError> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails the first `failures` sends.
    struct Flaky {
        failures: AtomicU64,
        inner: Collect,
    }

    #[async_trait]
    impl LogSink for Flaky {
        async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(SinkError::Other("unavailable".into()));
            }
            self.inner.send(record).await
        }
    }

    fn record(msg: &str) -> LogRecord {
        LogRecord {
            ts: "t".into(),
            level: Level::Error,
            logger: None,
            msg: msg.into(),
            caller: None,
            fields: Default::default(),
        }
    }

    fn quick() -> DispatchConfig {
        DispatchConfig {
            channel_buffer: 64,
            batch_size: 4,
            flush_interval: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(5),
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn flush_delivers_partial_batches_in_order() {
        let sink = Arc::new(Collect::default());
        let (dispatcher, _handle) = Dispatcher::spawn(sink.clone(), quick());
        for msg in ["a", "b", "c"] {
            dispatcher.submit(record(msg));
        }
        dispatcher.flush().await.unwrap();

        assert_eq!(*sink.records.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
        let stats = dispatcher.stats();
        assert_eq!((stats.total, stats.enqueued, stats.delivered), (3, 3, 3));
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test]
    async fn full_batches_ship_without_flush() {
        let sink = Arc::new(Collect::default());
        let (dispatcher, _handle) = Dispatcher::spawn(sink.clone(), quick());
        for i in 0..4 {
            dispatcher.submit(record(&i.to_string()));
        }
        for _ in 0..100 {
            if sink.records.lock().unwrap().len() == 4 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.records.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn failed_sends_are_retried_without_duplicates() {
        let sink = Arc::new(Flaky {
            failures: AtomicU64::new(2),
            inner: Collect::default(),
        });
        let (dispatcher, _handle) = Dispatcher::spawn(sink.clone(), quick());
        dispatcher.submit(record("x"));
        dispatcher.submit(record("y"));
        dispatcher.flush().await.unwrap();

        assert_eq!(*sink.inner.records.lock().unwrap(), vec!["x", "y"]);
        assert_eq!(dispatcher.stats().delivered, 2);
    }

    #[tokio::test]
    async fn batch_is_dropped_after_max_retries() {
        let sink = Arc::new(Flaky {
            failures: AtomicU64::new(u64::MAX),
            inner: Collect::default(),
        });
        let (dispatcher, _handle) = Dispatcher::spawn(sink.clone(), quick());
        dispatcher.submit(record("lost"));
        dispatcher.flush().await.unwrap();

        let stats = dispatcher.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.delivered, 0);
    }

    /// Takes a while per record, like a remote collector.
    #[derive(Default)]
    struct Slow(Collect);

    #[async_trait]
    impl LogSink for Slow {
        async fn send(&self, record: &LogRecord) -> Result<(), SinkError> {
            sleep(Duration::from_millis(20)).await;
            self.0.send(record).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_flush_waits_for_delivery() {
        let sink = Arc::new(Slow::default());
        let (dispatcher, _handle) = Dispatcher::spawn(sink.clone(), quick());
        dispatcher.submit(record("a"));
        dispatcher.submit(record("b"));
        dispatcher.flush_blocking(Duration::from_secs(5)).unwrap();

        assert_eq!(*sink.0.records.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(sink.0.flushes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_flush_works_outside_the_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let sink = Arc::new(Slow::default());
        let (dispatcher, _handle) = {
            let _guard = runtime.enter();
            Dispatcher::spawn(sink.clone(), quick())
        };
        dispatcher.submit(record("plain"));
        dispatcher.flush_blocking(Duration::from_secs(5)).unwrap();

        assert_eq!(*sink.0.records.lock().unwrap(), vec!["plain"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_flush_gives_up_on_a_stuck_sink() {
        struct Stuck;

        #[async_trait]
        impl LogSink for Stuck {
            async fn send(&self, _record: &LogRecord) -> Result<(), SinkError> {
                sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let (dispatcher, _handle) = Dispatcher::spawn(Arc::new(Stuck), quick());
        dispatcher.submit(record("never"));
        let result = dispatcher.flush_blocking(Duration::from_millis(50));
        assert!(matches!(result, Err(SinkError::Timeout(_))));
    }

    #[tokio::test]
    async fn blocking_flush_refuses_current_thread_runtime() {
        let sink = Arc::new(Collect::default());
        let (dispatcher, _handle) = Dispatcher::spawn(sink.clone(), quick());
        dispatcher.submit(record("later"));
        let result = dispatcher.flush_blocking(Duration::from_secs(1));
        assert!(matches!(result, Err(SinkError::CurrentThread)));

        dispatcher.flush().await.unwrap();
        assert_eq!(*sink.records.lock().unwrap(), vec!["later"]);
    }

    #[tokio::test]
    async fn closing_drains_pending_records() {
        let sink = Arc::new(Collect::default());
        let (dispatcher, handle) = Dispatcher::spawn(sink.clone(), quick());
        dispatcher.submit(record("last"));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(*sink.records.lock().unwrap(), vec!["last"]);
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
    }
}
