//! Remote log shipping over TCP.
//!
//! Records are queued on a bounded channel and written by a background task
//! as newline-delimited JSON. When the queue is full or the remote end is
//! unreachable, records are dropped, counted, and reported locally. Records
//! arriving while a reconnect is pending are dropped without a connection
//! attempt; the count is reported once the connection comes back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::logging::{LogRecord, LogSink};

/// Minimum time between connection attempts after a failure.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Fire-and-forget sink that ships records to a TCP collector.
#[derive(Clone)]
pub struct RemoteSink {
    tx: mpsc::Sender<LogRecord>,
    dropped: Arc<AtomicU64>,
}

impl RemoteSink {
    /// Spawn the shipping task for `address` with a queue of `capacity` records.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(address: String, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        tokio::spawn(ship(address, rx, dropped.clone()));
        Self { tx, dropped }
    }

    /// Records that never reached the collector.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl LogSink for RemoteSink {
    fn append(&self, record: LogRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Remote log queue full, dropping record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Remote log shipper stopped, dropping record");
            }
        }
    }
}

async fn ship(address: String, mut rx: mpsc::Receiver<LogRecord>, dropped: Arc<AtomicU64>) {
    let mut conn: Option<TcpStream> = None;
    let mut retry_after: Option<Instant> = None;
    // Dropped since the connection was last lost.
    let mut outage_drops: u64 = 0;

    while let Some(record) = rx.recv().await {
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Failed to encode log record");
                continue;
            }
        };
        line.push(b'\n');

        if conn.is_none() {
            if retry_after.is_some_and(|at| Instant::now() < at) {
                dropped.fetch_add(1, Ordering::Relaxed);
                outage_drops += 1;
                tracing::debug!(
                    address = %address,
                    dropped = outage_drops,
                    "Remote log sink reconnect pending, dropping record"
                );
                continue;
            }
            match TcpStream::connect(&address).await {
                Ok(stream) => {
                    if outage_drops > 0 {
                        tracing::warn!(
                            address = %address,
                            dropped = outage_drops,
                            "Reconnected to remote log sink after dropping records"
                        );
                    } else {
                        tracing::debug!(address = %address, "Connected to remote log sink");
                    }
                    conn = Some(stream);
                    retry_after = None;
                    outage_drops = 0;
                }
                Err(e) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    outage_drops += 1;
                    tracing::warn!(address = %address, error = %e, "Remote log sink unreachable");
                    retry_after = Some(Instant::now() + RECONNECT_DELAY);
                    continue;
                }
            }
        }

        if let Some(stream) = conn.as_mut() {
            if let Err(e) = stream.write_all(&line).await {
                dropped.fetch_add(1, Ordering::Relaxed);
                outage_drops += 1;
                tracing::warn!(address = %address, error = %e, "Remote log write failed");
                conn = None;
                retry_after = Some(Instant::now() + RECONNECT_DELAY);
            }
        }
    }

    tracing::debug!("Remote log shipper exiting");
}
