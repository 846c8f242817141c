//! Ping/pong keep-alive (spec §4.7: "ping/pong every 30s; missed pong × 2 →
//! close"). Tracked as time-since-last-client-activity rather than a strict
//! ping/ack handshake: any inbound client message (including an explicit
//! `ping`) counts as a liveness signal.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(30);
const MISSED_LIMIT: i64 = 2;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub struct KeepAlive {
    last_activity_ms: AtomicI64,
}

impl KeepAlive {
    pub fn new() -> Self {
        KeepAlive { last_activity_ms: AtomicI64::new(now_ms()) }
    }

    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    /// Resolves once the connection has missed two keep-alive intervals
    /// without any activity. Intended to run in a `tokio::select!` arm
    /// alongside the socket read loop; the caller closes the socket when
    /// this returns.
    pub async fn watch_for_timeout(&self) {
        let limit_ms = INTERVAL.as_millis() as i64 * MISSED_LIMIT;
        loop {
            tokio::time::sleep(INTERVAL).await;
            let elapsed = now_ms() - self.last_activity_ms.load(Ordering::Relaxed);
            if elapsed >= limit_ms {
                return;
            }
        }
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::new()
    }
}
