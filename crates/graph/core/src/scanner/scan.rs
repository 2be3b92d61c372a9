use crate::{metrics::Metrics, scanner::ScannerError};
use chaingraph_storage::{DbRead, GraphDb, ScanStateStorage, Table};
use chaingraph_types::ScanState;
use futures::Stream;
use std::{collections::VecDeque, marker::PhantomData, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Records read from the table per range scan.
const HISTORY_CHUNK: usize = 256;

type Entry<T> = (String, <T as Table>::Value);

/// A message on the live channel of a [`Scanner`].
#[derive(Debug)]
enum LiveUpdate<V> {
    /// A record to deliver.
    Record(String, V),
    /// Restart the scan from the first key.
    Replay,
}

/// Visits every record of table `T` exactly once in key order, then keeps yielding the
/// records pushed through [`Scanner::notify_update`].
///
/// Progress is persisted under the scanner's name so a new instance resumes after the last
/// record the consumer finished with. A history record counts as finished once the consumer
/// pulls the next step, so a crash redelivers at most the record in flight.
///
/// Live records are delivered in ascending key order per wake-up. Only a live key greater than
/// the current watermark moves it; older keys are still delivered. A producer that lost records
/// can ask for a full replay through [`ScanNotifier::request_replay`].
#[derive(Debug)]
pub struct Scanner<T: Table> {
    name: String,
    db: Arc<GraphDb>,
    cancel: CancellationToken,
    state: ScanState,
    live_tx: mpsc::UnboundedSender<LiveUpdate<T::Value>>,
    live_rx: mpsc::UnboundedReceiver<LiveUpdate<T::Value>>,
    history: VecDeque<Entry<T>>,
    live: VecDeque<Entry<T>>,
    pending_commit: Option<String>,
    history_done: bool,
    replay_requested: bool,
    stopping: bool,
    _table: PhantomData<T>,
}

impl<T: Table> Scanner<T> {
    /// Creates a scanner named `name` over table `T`, resuming from its persisted progress.
    pub fn new(
        name: impl Into<String>,
        db: Arc<GraphDb>,
        cancel: CancellationToken,
    ) -> Result<Self, ScannerError> {
        let name = name.into();
        let state = db.scan_state(&name)?;
        let (live_tx, live_rx) = mpsc::unbounded_channel();
        info!(
            target: "scanner",
            scanner = %name,
            table = T::NAME,
            last_key = ?state.last_processed_key,
            processed = state.processed_count,
            "Scanner created"
        );
        Ok(Self {
            name,
            db,
            cancel,
            state,
            live_tx,
            live_rx,
            history: VecDeque::new(),
            live: VecDeque::new(),
            pending_commit: None,
            history_done: false,
            replay_requested: false,
            stopping: false,
            _table: PhantomData,
        })
    }

    /// Forgets the persisted progress so the scan starts again from the first key.
    pub fn reset(&mut self) -> Result<(), ScannerError> {
        self.db.clear_scan_state(&self.name)?;
        self.state = ScanState::default();
        self.history.clear();
        self.pending_commit = None;
        self.history_done = false;
        info!(target: "scanner", scanner = %self.name, "Scanner progress reset");
        Ok(())
    }

    /// The scanner's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current progress, including not yet persisted steps.
    pub const fn scan_state(&self) -> &ScanState {
        &self.state
    }

    /// Returns a handle that feeds live records into this scanner.
    pub fn notifier(&self) -> ScanNotifier<T::Value> {
        ScanNotifier { tx: self.live_tx.clone() }
    }

    /// Enqueues a live record and wakes a suspended scan.
    pub fn notify_update(&self, key: impl Into<String>, value: T::Value) {
        // The receiver lives in `self`, so the send cannot fail.
        let _ = self.live_tx.send(LiveUpdate::Record(key.into(), value));
    }

    /// Pulls the next record.
    ///
    /// Suspends once history is exhausted until a live record arrives. Returns `None` only after
    /// cancellation, once every record queued before it has been delivered.
    pub async fn next(&mut self) -> Result<Option<Entry<T>>, ScannerError> {
        self.commit_pending()?;

        loop {
            if let Some((key, value)) = self.live.pop_front() {
                self.record_live(&key)?;
                return Ok(Some((key, value)));
            }

            if self.stopping {
                return Ok(None);
            }

            if self.cancel.is_cancelled() {
                info!(
                    target: "scanner",
                    scanner = %self.name,
                    processed = self.state.processed_count,
                    "Scanner cancellation requested, stopping..."
                );
                self.stopping = true;
                self.drain_queue();
                continue;
            }

            if self.replay_requested {
                self.replay_requested = false;
                self.reset()?;
                continue;
            }

            if !self.history_done {
                self.drain_queue();
                if !self.live.is_empty() {
                    continue;
                }
                if self.history.is_empty() {
                    self.refill_history()?;
                }
                if let Some((key, value)) = self.history.pop_front() {
                    Metrics::record_scanned(&self.name, false);
                    self.pending_commit = Some(key.clone());
                    return Ok(Some((key, value)));
                }

                self.history_done = true;
                self.state.is_synced = true;
                self.db.save_scan_state(&self.name, &self.state)?;
                info!(
                    target: "scanner",
                    scanner = %self.name,
                    processed = self.state.processed_count,
                    "Scanner caught up with history, following live updates"
                );
                continue;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {}
                entry = self.live_rx.recv() => match entry {
                    Some(update) => {
                        self.enqueue(update);
                        self.drain_queue();
                    }
                    None => {
                        warn!(
                            target: "scanner",
                            scanner = %self.name,
                            "Live update channel closed"
                        );
                        self.stopping = true;
                    }
                },
            }
        }
    }

    /// Turns the scanner into a stream of records that ends after cancellation or on the first
    /// error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Entry<T>, ScannerError>> + Send {
        async_stream::stream! {
            loop {
                match self.next().await {
                    Ok(Some(entry)) => yield Ok(entry),
                    Ok(None) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }

    fn commit_pending(&mut self) -> Result<(), ScannerError> {
        let Some(key) = self.pending_commit.take() else {
            return Ok(());
        };
        self.state.last_processed_key = Some(key);
        self.state.processed_count += 1;
        self.db.save_scan_state(&self.name, &self.state)?;
        Ok(())
    }

    fn record_live(&mut self, key: &str) -> Result<(), ScannerError> {
        if !self.history_done {
            // Interleaved with history: the range scan owns the watermark.
            return Ok(());
        }
        Metrics::record_scanned(&self.name, true);
        if self.state.last_processed_key.as_deref().is_none_or(|last| key > last) {
            self.state.last_processed_key = Some(key.to_string());
        } else {
            debug!(
                target: "scanner",
                scanner = %self.name,
                key,
                "Live update older than the watermark"
            );
        }
        self.state.processed_count += 1;
        self.db.save_scan_state(&self.name, &self.state)?;
        Ok(())
    }

    fn enqueue(&mut self, update: LiveUpdate<T::Value>) {
        match update {
            LiveUpdate::Record(key, value) => self.live.push_back((key, value)),
            LiveUpdate::Replay => self.replay_requested = true,
        }
    }

    fn drain_queue(&mut self) {
        let before = self.live.len();
        while let Ok(update) = self.live_rx.try_recv() {
            self.enqueue(update);
        }
        if self.history_done && self.live.len() > 1 && self.live.len() != before {
            self.live.make_contiguous().sort_by(|a, b| a.0.cmp(&b.0));
        }
    }

    fn refill_history(&mut self) -> Result<(), ScannerError> {
        let last = self.state.last_processed_key.clone();
        let chunk = self.db.range_from::<T>(last.as_deref(), HISTORY_CHUNK + 1)?;
        self.history.extend(chunk.into_iter().filter(|(key, _)| Some(key) != last.as_ref()));
        debug!(
            target: "scanner",
            scanner = %self.name,
            from = ?last,
            read = self.history.len(),
            "Read history chunk"
        );
        Ok(())
    }
}

/// Cloneable handle feeding live records into a [`Scanner`].
#[derive(Debug)]
pub struct ScanNotifier<V> {
    tx: mpsc::UnboundedSender<LiveUpdate<V>>,
}

impl<V> ScanNotifier<V> {
    /// Enqueues a live record and wakes the scanner. Returns false if the scanner is gone.
    pub fn notify_update(&self, key: impl Into<String>, value: V) -> bool {
        self.tx.send(LiveUpdate::Record(key.into(), value)).is_ok()
    }

    /// Makes the scanner forget its progress and replay the table once the records queued
    /// before this request are delivered. Returns false if the scanner is gone.
    pub fn request_replay(&self) -> bool {
        self.tx.send(LiveUpdate::Replay).is_ok()
    }
}

impl<V> Clone for ScanNotifier<V> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use chaingraph_storage::{DbWrite, models::ContractCodes};
    use futures::StreamExt;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::{Instant, timeout};

    fn setup(keys: usize) -> (TempDir, Arc<GraphDb>) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = GraphDb::open(&tmp_dir.path().join("graph")).expect("open db");
        for i in 0..keys {
            db.put::<ContractCodes>(&key(i), &value(i)).unwrap();
        }
        (tmp_dir, Arc::new(db))
    }

    fn key(i: usize) -> String {
        format!("k{i:03}")
    }

    fn value(i: usize) -> B256 {
        B256::with_last_byte(i as u8)
    }

    fn scanner(db: &Arc<GraphDb>) -> Scanner<ContractCodes> {
        Scanner::new("test", db.clone(), CancellationToken::new()).unwrap()
    }

    /// Pulls until the scanner parks waiting for live updates.
    async fn exhaust(scanner: &mut Scanner<ContractCodes>) -> Vec<String> {
        let mut keys = Vec::new();
        while let Ok(next) = timeout(Duration::from_millis(10), scanner.next()).await {
            keys.push(next.unwrap().unwrap().0);
        }
        keys
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_then_live_after_notify() {
        let (_tmp, db) = setup(50);
        let mut scanner = scanner(&db);

        for i in 0..50 {
            assert_eq!(scanner.next().await.unwrap(), Some((key(i), value(i))));
        }

        let notifier = scanner.notifier();
        let started = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            notifier.notify_update("k999", B256::repeat_byte(0xff));
        });

        let live = scanner.next().await.unwrap().unwrap();
        let elapsed = started.elapsed();
        assert_eq!(live, ("k999".to_string(), B256::repeat_byte(0xff)));
        assert!(elapsed >= Duration::from_millis(99), "yielded before notify: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(160), "yielded late: {elapsed:?}");
        assert_eq!(scanner.scan_state().last_processed_key.as_deref(), Some("k999"));
        assert!(scanner.scan_state().is_synced);
    }

    #[tokio::test]
    async fn test_resumes_after_persisted_key() {
        let (_tmp, db) = setup(6);
        let state = ScanState {
            last_processed_key: Some(key(3)),
            is_synced: false,
            processed_count: 4,
        };
        db.save_scan_state("test", &state).unwrap();

        let mut scanner = scanner(&db);
        assert_eq!(exhaust(&mut scanner).await, vec![key(4), key(5)]);
        assert_eq!(scanner.scan_state().processed_count, 6);
    }

    #[tokio::test]
    async fn test_record_in_flight_is_redelivered() {
        let (_tmp, db) = setup(5);
        {
            let mut scanner = scanner(&db);
            for i in 0..3 {
                assert_eq!(scanner.next().await.unwrap().unwrap().0, key(i));
            }
        }
        assert_eq!(db.scan_state("test").unwrap().last_processed_key, Some(key(1)));

        let mut scanner = scanner(&db);
        assert_eq!(exhaust(&mut scanner).await, vec![key(2), key(3), key(4)]);
    }

    #[tokio::test]
    async fn test_history_spans_multiple_chunks() {
        let (_tmp, db) = setup(HISTORY_CHUNK * 2 + 7);
        let mut scanner = scanner(&db);
        let keys = exhaust(&mut scanner).await;
        assert_eq!(keys.len(), HISTORY_CHUNK * 2 + 7);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_older_live_key_keeps_watermark() {
        let (_tmp, db) = setup(3);
        let mut scanner = scanner(&db);
        exhaust(&mut scanner).await;

        scanner.notify_update("k500", value(5));
        assert_eq!(scanner.next().await.unwrap().unwrap().0, "k500");
        assert_eq!(scanner.scan_state().last_processed_key.as_deref(), Some("k500"));

        scanner.notify_update("k100", value(1));
        assert_eq!(scanner.next().await.unwrap().unwrap().0, "k100");
        assert_eq!(scanner.scan_state().last_processed_key.as_deref(), Some("k500"));
        assert_eq!(db.scan_state("test").unwrap().last_processed_key.as_deref(), Some("k500"));
        assert_eq!(db.scan_state("test").unwrap().processed_count, 5);
    }

    #[tokio::test]
    async fn test_live_batch_is_delivered_in_key_order() {
        let (_tmp, db) = setup(1);
        let mut scanner = scanner(&db);
        exhaust(&mut scanner).await;

        for name in ["k9", "k7", "k8"] {
            scanner.notify_update(name, value(0));
        }
        let mut keys = Vec::new();
        for _ in 0..3 {
            keys.push(scanner.next().await.unwrap().unwrap().0);
        }
        assert_eq!(keys, vec!["k7", "k8", "k9"]);
    }

    #[tokio::test]
    async fn test_updates_during_history_are_interleaved() {
        let (_tmp, db) = setup(3);
        let mut scanner = scanner(&db);

        assert_eq!(scanner.next().await.unwrap().unwrap().0, key(0));
        scanner.notify_update("live", value(9));
        assert_eq!(scanner.next().await.unwrap().unwrap().0, "live");
        assert_eq!(scanner.next().await.unwrap().unwrap().0, key(1));
        assert_eq!(scanner.scan_state().last_processed_key, Some(key(0)));
    }

    #[tokio::test]
    async fn test_cancellation_flushes_queued_updates() {
        let (_tmp, db) = setup(2);
        let cancel = CancellationToken::new();
        let mut scanner =
            Scanner::<ContractCodes>::new("test", db.clone(), cancel.clone()).unwrap();
        exhaust(&mut scanner).await;

        scanner.notify_update("k2", value(2));
        scanner.notify_update("k1", value(1));
        cancel.cancel();

        assert_eq!(scanner.next().await.unwrap().unwrap().0, "k1");
        assert_eq!(scanner.next().await.unwrap().unwrap().0, "k2");
        assert_eq!(scanner.next().await.unwrap(), None);
        assert_eq!(scanner.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_restarts_from_the_first_key() {
        let (_tmp, db) = setup(3);
        let mut scanner = scanner(&db);
        exhaust(&mut scanner).await;

        scanner.reset().unwrap();
        assert_eq!(db.scan_state("test").unwrap(), ScanState::default());
        assert_eq!(exhaust(&mut scanner).await, vec![key(0), key(1), key(2)]);
    }

    #[tokio::test]
    async fn test_replay_request_restarts_after_queued_updates() {
        let (_tmp, db) = setup(3);
        let mut scanner = scanner(&db);
        exhaust(&mut scanner).await;

        let notifier = scanner.notifier();
        assert!(notifier.notify_update("k900", value(9)));
        assert!(notifier.request_replay());

        assert_eq!(exhaust(&mut scanner).await, vec!["k900".to_string(), key(0), key(1), key(2)]);
        assert!(scanner.scan_state().is_synced);
        assert_eq!(scanner.scan_state().processed_count, 3);
    }

    #[tokio::test]
    async fn test_stream_ends_after_cancellation() {
        let (_tmp, db) = setup(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scanner = Scanner::<ContractCodes>::new("test", db, cancel).unwrap();

        let items: Vec<_> = scanner.into_stream().collect().await;
        assert!(items.is_empty());
    }
}
