use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};

use crate::entry::{sanitize, LogEntry, ReceivedEntry, SentCommand};
use crate::ring::RingBuffer;
use crate::snapshot::{TelemetrySnapshot, TelemetryStatus};

/// Default entries kept per ring.
pub const DEFAULT_CAPACITY: usize = 20;

/// Default bound on waiting for the telemetry mutex.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// `tracing` target used when [`TelemetryLog::record_log`] forwards a line
/// to the installed subscriber. [`TelemetryLayer`](crate::TelemetryLayer)
/// skips this target so a forwarded line is not captured twice.
pub const FORWARD_TARGET: &str = "robolink::telemetry";

/// Configuration for a [`TelemetryLog`].
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Entries kept per ring. Default: 20.
    pub capacity: usize,
    /// Longest any operation waits for the mutex. Default: 10 ms.
    pub lock_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Current ring occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryCounts {
    pub sent: usize,
    pub received: usize,
    pub logs: usize,
}

struct Rings {
    sent: RingBuffer<SentCommand>,
    received: RingBuffer<ReceivedEntry>,
    logs: RingBuffer<LogEntry>,
}

/// Bounded history of sent commands, received data, and log lines.
///
/// Writers never block for longer than `lock_timeout`; a record that cannot
/// get the lock in time is dropped and counted in [`dropped`](Self::dropped).
pub struct TelemetryLog {
    rings: Mutex<Rings>,
    started: Instant,
    config: TelemetryConfig,
    dropped: AtomicU64,
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

impl TelemetryLog {
    pub fn new(config: TelemetryConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            rings: Mutex::new(Rings {
                sent: RingBuffer::new(capacity),
                received: RingBuffer::new(capacity),
                logs: RingBuffer::new(capacity),
            }),
            started: Instant::now(),
            config: TelemetryConfig { capacity, ..config },
            dropped: AtomicU64::new(0),
        }
    }

    /// Record a command forwarded to the robot.
    pub fn record_sent(&self, text: impl AsRef<[u8]>, confirmed: bool) {
        let entry = SentCommand {
            text: String::from_utf8_lossy(text.as_ref()).into_owned(),
            confirmed,
            timestamp: self.started.elapsed(),
        };
        if let Some(mut rings) = self.lock() {
            rings.sent.push(entry);
        }
    }

    /// Record data received from the robot.
    pub fn record_received(&self, text: impl AsRef<[u8]>) {
        let entry = ReceivedEntry {
            text: sanitize(text.as_ref()),
            timestamp: self.started.elapsed(),
        };
        if let Some(mut rings) = self.lock() {
            rings.received.push(entry);
        }
    }

    /// Record a diagnostic line and pass it on to the installed subscriber.
    pub fn record_log(&self, text: impl AsRef<[u8]>) {
        let text = sanitize(text.as_ref());
        tracing::info!(target: FORWARD_TARGET, "{text}");
        self.store_log(text);
    }

    /// Store a diagnostic line without forwarding it.
    pub(crate) fn store_log(&self, text: String) {
        let entry = LogEntry {
            text,
            timestamp: self.started.elapsed(),
        };
        if let Some(mut rings) = self.lock() {
            rings.logs.push(entry);
        }
    }

    /// Copy out the newest entries, then empty all three rings.
    ///
    /// Up to `max_sent` sent and `max_recv` received entries are returned,
    /// oldest first. Log entries are discarded. If the mutex cannot be taken
    /// in time the result is empty and nothing is cleared.
    pub fn snapshot_and_clear(&self, max_sent: usize, max_recv: usize) -> TelemetrySnapshot {
        let uptime = self.started.elapsed().as_secs();
        let Some(mut rings) = self.lock() else {
            return TelemetrySnapshot {
                status: TelemetryStatus {
                    uptime,
                    sent_max: self.config.capacity,
                    recv_max: self.config.capacity,
                    ..TelemetryStatus::default()
                },
                ..TelemetrySnapshot::default()
            };
        };

        let snapshot = TelemetrySnapshot {
            status: TelemetryStatus {
                uptime,
                sent_buf: rings.sent.len(),
                recv_buf: rings.received.len(),
                sent_max: rings.sent.capacity(),
                recv_max: rings.received.capacity(),
            },
            sent: rings.sent.recent(max_sent).cloned().collect(),
            received: rings.received.recent(max_recv).cloned().collect(),
        };

        rings.sent.clear();
        rings.received.clear();
        rings.logs.clear();
        snapshot
    }

    /// The newest `max` log entries, oldest first. Does not clear.
    pub fn log_entries(&self, max: usize) -> Vec<LogEntry> {
        self.lock()
            .map(|rings| rings.logs.recent(max).cloned().collect())
            .unwrap_or_default()
    }

    /// Current occupancy, or `None` if the mutex was contended.
    pub fn counts(&self) -> Option<TelemetryCounts> {
        self.lock().map(|rings| TelemetryCounts {
            sent: rings.sent.len(),
            received: rings.received.len(),
            logs: rings.logs.len(),
        })
    }

    /// Time since this log was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Records dropped because the mutex was contended.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    fn lock(&self) -> Option<MutexGuard<'_, Rings>> {
        let guard = self.rings.try_lock_for(self.config.lock_timeout);
        if guard.is_none() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        guard
    }
}

impl std::fmt::Debug for TelemetryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLog")
            .field("config", &self.config)
            .field("uptime", &self.started.elapsed())
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn with_capacity(capacity: usize) -> TelemetryLog {
        TelemetryLog::new(TelemetryConfig {
            capacity,
            ..TelemetryConfig::default()
        })
    }

    #[test]
    fn snapshot_returns_most_recent_in_chronological_order() {
        let log = with_capacity(20);
        for i in 0..25 {
            log.record_sent(format!("{{cmd-{i}}}"), i % 2 == 0);
        }

        let snap = log.snapshot_and_clear(20, 20);
        assert_eq!(snap.status.sent_buf, 20);
        assert_eq!(snap.status.sent_max, 20);
        assert_eq!(snap.sent.len(), 20);
        let texts: Vec<_> = snap.sent.iter().map(|e| e.text.as_str()).collect();
        let expected: Vec<_> = (5..25).map(|i| format!("{{cmd-{i}}}")).collect();
        assert_eq!(texts, expected);
        assert!(snap
            .sent
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn snapshot_honours_per_kind_limits() {
        let log = with_capacity(10);
        for i in 0..6 {
            log.record_sent(format!("{{s{i}}}"), true);
            log.record_received(format!("{{r{i}}}"));
        }

        let snap = log.snapshot_and_clear(2, 3);
        assert_eq!(snap.status.sent_buf, 6);
        assert_eq!(snap.status.recv_buf, 6);
        assert_eq!(snap.sent.len(), 2);
        assert_eq!(snap.sent[0].text, "{s4}");
        assert_eq!(snap.received.len(), 3);
        assert_eq!(snap.received[0].text, "{r3}");
    }

    #[test]
    fn second_snapshot_is_empty() {
        let log = TelemetryLog::default();
        log.record_sent("{a}", true);
        log.record_received("{b}");
        log.record_log("hello");

        let first = log.snapshot_and_clear(20, 20);
        assert!(!first.is_empty());

        let second = log.snapshot_and_clear(20, 20);
        assert!(second.is_empty());
        assert_eq!(second.status.sent_buf, 0);
        assert_eq!(second.status.recv_buf, 0);
        assert_eq!(
            log.counts(),
            Some(TelemetryCounts {
                sent: 0,
                received: 0,
                logs: 0
            })
        );
    }

    #[test]
    fn received_text_is_sanitized() {
        let log = TelemetryLog::default();
        log.record_received(b"{a\x01b}");
        let snap = log.snapshot_and_clear(20, 20);
        assert_eq!(snap.received[0].text, "{a.b}");
    }

    #[test]
    fn sent_text_is_kept_verbatim() {
        let log = TelemetryLog::default();
        log.record_sent("{\"N\":\"\t\"}", false);
        let snap = log.snapshot_and_clear(20, 20);
        assert_eq!(snap.sent[0].text, "{\"N\":\"\t\"}");
        assert!(!snap.sent[0].confirmed);
    }

    #[test]
    fn log_ring_is_bounded_and_sanitized() {
        let log = with_capacity(3);
        for i in 0..5 {
            log.record_log(format!("line {i}\n"));
        }
        let logs = log.log_entries(10);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].text, "line 2.");
        assert_eq!(logs[2].text, "line 4.");
    }

    #[test]
    fn contended_lock_drops_records_and_yields_empty_snapshot() {
        let log = Arc::new(with_capacity(5));
        log.record_sent("{kept}", true);

        let guard = log.rings.lock();
        log.record_sent("{dropped}", true);
        let snap = log.snapshot_and_clear(5, 5);
        assert!(snap.is_empty());
        assert_eq!(snap.status.sent_max, 5);
        assert!(log.counts().is_none());
        drop(guard);

        assert!(log.dropped() >= 3);
        let snap = log.snapshot_and_clear(5, 5);
        assert_eq!(snap.sent.len(), 1);
        assert_eq!(snap.sent[0].text, "{kept}");
    }

    #[test]
    fn concurrent_writers_respect_capacity() {
        let log = Arc::new(with_capacity(20));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        log.record_received(format!("{{t{t}-{i}}}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counts = log.counts().unwrap();
        assert!(counts.received <= 20);
        let snap = log.snapshot_and_clear(100, 100);
        assert!(snap.received.len() <= 20);
    }
}
