//! Periodic posting: an unsolicited fact on a fixed cadence, never gated by
//! the per-user cooldown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use factbot_catalog::FactResult;

use crate::FactLibrary;

/// Longest single wait; larger configured delays are clamped so the deadline
/// always fits in an `Instant`.
const MAX_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Where periodic posts go (the joined chat channel in production).
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct SchedulePlan {
    pub interval: Duration,
    pub recovery_delay: Duration,
    /// `None` selects across every theme.
    pub theme: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub posted: u64,
    pub failures: u64,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("no fact to post: {0:?}")]
    Unavailable(FactResult),
    #[error("delivery failed: {0:#}")]
    Delivery(anyhow::Error),
}

pub fn spawn_scheduler(
    library: Arc<FactLibrary>,
    sink: Arc<dyn DeliverySink>,
    plan: SchedulePlan,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<SchedulerStats> {
    tokio::spawn(run_scheduler(library, sink, plan, shutdown))
}

/// Wait, post, repeat until `shutdown` flips to `true` (or its sender is
/// dropped).  After a failed post the next attempt comes after
/// `recovery_delay` instead of the full interval.  The schedule is not
/// persisted: the first post is one full interval after start.
pub async fn run_scheduler(
    library: Arc<FactLibrary>,
    sink: Arc<dyn DeliverySink>,
    plan: SchedulePlan,
    mut shutdown: watch::Receiver<bool>,
) -> SchedulerStats {
    let mut stats = SchedulerStats::default();
    let mut wait = plan.interval;
    info!(
        interval_secs = plan.interval.as_secs(),
        theme = plan.theme.as_deref().unwrap_or("*"),
        "periodic posting started"
    );

    loop {
        if !wait_or_shutdown(deadline_after(wait), &mut shutdown).await {
            break;
        }

        match post_once(&library, sink.as_ref(), &plan).await {
            Ok(()) => {
                stats.posted += 1;
                wait = plan.interval;
                info!(posted = stats.posted, "periodic fact posted");
            }
            Err(err) => {
                stats.failures += 1;
                wait = plan.recovery_delay;
                warn!(
                    %err,
                    retry_in_secs = plan.recovery_delay.as_secs(),
                    "periodic post failed"
                );
            }
        }
    }

    info!(posted = stats.posted, failures = stats.failures, "periodic posting stopped");
    stats
}

async fn post_once(
    library: &FactLibrary,
    sink: &dyn DeliverySink,
    plan: &SchedulePlan,
) -> Result<(), PostError> {
    let fact = match library.select(plan.theme.as_deref()).await {
        FactResult::Fact(text) => text,
        other => return Err(PostError::Unavailable(other)),
    };
    let text = format!("{}{fact}", plan.prefix);
    sink.deliver(&text).await.map_err(PostError::Delivery)
}

fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait.min(MAX_WAIT))
        .unwrap_or_else(|| now + Duration::from_secs(24 * 60 * 60))
}

/// `false` once shutdown has been requested.
async fn wait_or_shutdown(deadline: Instant, shutdown: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("shutdown sender dropped");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::bail;

    use super::*;
    use crate::testing::library_with;

    /// Fails the attempts whose index is listed; records when each attempt
    /// happened relative to `start`.
    struct ScriptedSink {
        start: Instant,
        fail_on: Vec<usize>,
        attempts: Mutex<Vec<(u64, String)>>,
    }

    impl ScriptedSink {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                start: Instant::now(),
                fail_on,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u64> {
            self.attempts.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }
    }

    #[async_trait]
    impl DeliverySink for ScriptedSink {
        async fn deliver(&self, text: &str) -> anyhow::Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            let index = attempts.len();
            attempts.push((self.start.elapsed().as_secs(), text.to_string()));
            if self.fail_on.contains(&index) {
                bail!("channel unavailable");
            }
            Ok(())
        }
    }

    fn plan(theme: Option<&str>) -> SchedulePlan {
        SchedulePlan {
            interval: Duration::from_secs(3600),
            recovery_delay: Duration::from_secs(60),
            theme: theme.map(str::to_string),
            prefix: "✨ Fact: ".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn posts_once_per_interval_with_prefix() {
        let library = library_with(vec![("spooky", vec!["Owls are silent flyers."])]);
        let sink = Arc::new(ScriptedSink::new(vec![]));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_scheduler(library, sink.clone(), plan(Some("spooky")), rx);
        tokio::time::sleep(Duration::from_secs(3 * 3600 + 10)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(sink.offsets(), vec![3600, 7200, 10800]);
        assert_eq!(stats, SchedulerStats { posted: 3, failures: 0 });
        let attempts = sink.attempts.lock().unwrap();
        assert_eq!(attempts[0].1, "✨ Fact: Owls are silent flyers.");
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_failure_retries_after_recovery_delay() {
        let library = library_with(vec![("spooky", vec!["bats", "owls"])]);
        let sink = Arc::new(ScriptedSink::new(vec![0]));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_scheduler(library, sink.clone(), plan(Some("spooky")), rx);
        tokio::time::sleep(Duration::from_secs(3600 + 60 + 3600 + 10)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        // Failure at 3600, retry 60s later, then back on the normal interval.
        assert_eq!(sink.offsets(), vec![3600, 3660, 7260]);
        assert_eq!(stats, SchedulerStats { posted: 2, failures: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn selection_failure_uses_recovery_delay_and_keeps_running() {
        let library = library_with(vec![("science", vec!["atoms"])]);
        let sink = Arc::new(ScriptedSink::new(vec![]));
        let (tx, rx) = watch::channel(false);

        // The configured theme does not exist, so every attempt fails.
        let handle = spawn_scheduler(library, sink.clone(), plan(Some("spooky")), rx);
        tokio::time::sleep(Duration::from_secs(3600 + 3 * 60 + 10)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert!(sink.offsets().is_empty());
        assert_eq!(stats, SchedulerStats { posted: 0, failures: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_the_wait() {
        let library = library_with(vec![("spooky", vec!["bats"])]);
        let sink = Arc::new(ScriptedSink::new(vec![]));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_scheduler(library, sink.clone(), plan(None), rx);
        tokio::time::sleep(Duration::from_secs(10)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats, SchedulerStats::default());
        assert!(sink.offsets().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_delays_are_clamped_instead_of_overflowing() {
        let library = library_with(vec![("spooky", vec!["bats"])]);
        let sink = Arc::new(ScriptedSink::new(vec![0]));
        let (tx, rx) = watch::channel(false);
        let plan = SchedulePlan {
            interval: Duration::from_secs(60),
            recovery_delay: Duration::from_secs(u64::MAX),
            ..plan(None)
        };

        let handle = spawn_scheduler(library, sink.clone(), plan, rx);
        tokio::time::sleep(Duration::from_secs(600)).await;
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(sink.offsets(), vec![60]);
        assert_eq!(stats, SchedulerStats { posted: 0, failures: 1 });
        assert!(deadline_after(Duration::MAX) > Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_shutdown_sender_stops_the_loop() {
        let library = library_with(vec![("spooky", vec!["bats"])]);
        let sink = Arc::new(ScriptedSink::new(vec![]));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_scheduler(library, sink, plan(None), rx);
        drop(tx);
        assert_eq!(handle.await.unwrap(), SchedulerStats::default());
    }
}
