//! Idle-timeout supervision and shutdown signaling.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use wslss_common::time::unix_now_millis;

/// Timestamp of the last client-observable method call.
///
/// Every protocol method records activity at entry, lock-free.
pub struct Activity {
    last_millis: AtomicI64,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            last_millis: AtomicI64::new(unix_now_millis()),
        }
    }

    /// Records activity now.
    pub fn touch(&self) {
        self.last_millis.store(unix_now_millis(), Ordering::Relaxed);
    }

    /// Last recorded activity, in unix milliseconds.
    pub fn last_millis(&self) -> i64 {
        self.last_millis.load(Ordering::Relaxed)
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative shutdown token shared by the signal handler, the idle
/// monitor, and the main loop.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trips the token. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the token has been tripped.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token trips.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the idle monitor.
///
/// The monitor sleeps until `last_activity + timeout`, then re-checks.
/// If the deadline has passed with no new activity it trips the
/// shutdown token and exits; otherwise it recomputes its sleep and
/// loops. Tripping the token from elsewhere stops it immediately.
pub fn spawn_idle_monitor(
    activity: Arc<Activity>,
    timeout: Duration,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timeout_millis = timeout.as_millis() as i64;
        loop {
            let deadline = activity.last_millis() + timeout_millis;
            let now = unix_now_millis();
            if now >= deadline {
                info!(
                    "idle timeout ({:?}) exceeded, initiating shutdown",
                    timeout
                );
                shutdown.trigger();
                return;
            }

            let sleep = Duration::from_millis((deadline - now) as u64);
            debug!("idle monitor sleeping for {sleep:?}");
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(sleep) => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_advances_timestamp() {
        let activity = Activity::new();
        let before = activity.last_millis();
        activity
            .last_millis
            .store(before - 5_000, Ordering::Relaxed);
        activity.touch();
        assert!(activity.last_millis() >= before);
    }

    #[tokio::test]
    async fn test_trigger_resolves_waiters() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.cancelled().await })
        };
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter resolves")
            .unwrap();
        assert!(shutdown.is_triggered());

        // Waiting after the trip resolves immediately.
        tokio::time::timeout(Duration::from_secs(1), shutdown.cancelled())
            .await
            .expect("resolves immediately");
    }

    #[tokio::test]
    async fn test_monitor_trips_after_idle_deadline() {
        let activity = Arc::new(Activity::new());
        activity
            .last_millis
            .store(unix_now_millis() - 60_000, Ordering::Relaxed);

        let shutdown = Shutdown::new();
        let handle = spawn_idle_monitor(activity, Duration::from_secs(1), shutdown.clone());

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("monitor exits")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_monitor_stops_on_external_trigger() {
        let activity = Arc::new(Activity::new());
        let shutdown = Shutdown::new();
        let handle =
            spawn_idle_monitor(activity, Duration::from_secs(3600), shutdown.clone());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("monitor exits promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_activity_extends_the_deadline() {
        let activity = Arc::new(Activity::new());
        let shutdown = Shutdown::new();
        let handle = spawn_idle_monitor(
            activity.clone(),
            Duration::from_millis(800),
            shutdown.clone(),
        );

        // Touch halfway through the window; the first wakeup must
        // recompute and keep running.
        tokio::time::sleep(Duration::from_millis(400)).await;
        activity.touch();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!shutdown.is_triggered());

        // No further activity: the pushed-back deadline now passes.
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("monitor exits")
            .unwrap();
        assert!(shutdown.is_triggered());
    }
}
