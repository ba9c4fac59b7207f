//! Periodic cache refresh
//!
//! Every tick checks whether the cache is stale or invalid and, if so, runs a
//! non-forced refresh. Refresh failures and continued stale serving raise an
//! alert.

use crate::cache::{RefreshOutcome, RefreshableCache};
use crate::notify::AlertNotifier;
use crate::search::DistanceCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Result of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cache fresh and valid, nothing to do
    Skipped,
    Refreshed(RefreshOutcome),
    /// Refresh ran and left the cache invalid
    Failed,
}

pub struct RefreshScheduler {
    cache: Arc<RefreshableCache>,
    distances: Arc<DistanceCache>,
    notifier: Arc<AlertNotifier>,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(
        cache: Arc<RefreshableCache>,
        distances: Arc<DistanceCache>,
        notifier: Arc<AlertNotifier>,
        period: Duration,
    ) -> Self {
        Self {
            cache,
            distances,
            notifier,
            period,
        }
    }

    /// Run one check
    pub async fn tick(&self) -> TickOutcome {
        if !self.cache.needs_refresh().await {
            debug!("Clinical attribute cache is fresh, skipping refresh");
            return TickOutcome::Skipped;
        }

        match self.cache.refresh(false).await {
            Ok(outcome) => {
                if let Some(snapshot) = self.cache.get().await {
                    self.distances.prune(&snapshot).await;
                }
                match outcome {
                    RefreshOutcome::Refreshed => {}
                    RefreshOutcome::RestoredFromBackup => {
                        self.notifier
                            .alert(&format!(
                                "Metadata source unavailable ({} consecutive failures), serving data restored from the persistent cache",
                                self.cache.consecutive_failures()
                            ))
                            .await;
                    }
                    RefreshOutcome::KeptStale => {
                        if self.cache.is_stale().await {
                            self.notifier
                                .alert(&format!(
                                    "Metadata source unavailable ({} consecutive failures), serving stale clinical attributes",
                                    self.cache.consecutive_failures()
                                ))
                                .await;
                        }
                    }
                }
                TickOutcome::Refreshed(outcome)
            }
            Err(e) => {
                self.notifier
                    .alert(&format!(
                        "Clinical attribute cache is invalid after {} consecutive failures: {}",
                        self.cache.consecutive_failures(),
                        e
                    ))
                    .await;
                TickOutcome::Failed
            }
        }
    }

    /// Tick on a fixed period until the returned handle is aborted
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            "Starting refresh scheduler (interval: {}s)",
            self.period.as_secs()
        );

        tokio::spawn(async move {
            let mut timer = interval(self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately; startup already refreshed
            timer.tick().await;

            loop {
                timer.tick().await;
                let outcome = self.tick().await;
                debug!(?outcome, "Refresh scheduler tick");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::test_support::MockSource;

    fn scheduler(source: Arc<MockSource>, settings: CacheSettings) -> RefreshScheduler {
        RefreshScheduler::new(
            Arc::new(RefreshableCache::new(source, settings)),
            Arc::new(DistanceCache::new()),
            Arc::new(AlertNotifier::disabled()),
            Duration::from_secs(300),
        )
    }

    #[tokio::test]
    async fn test_tick_populates_empty_cache() {
        let scheduler = scheduler(Arc::new(MockSource::working()), CacheSettings::default());

        assert_eq!(
            scheduler.tick().await,
            TickOutcome::Refreshed(RefreshOutcome::Refreshed)
        );
        assert!(scheduler.cache.get().await.is_some());
    }

    #[tokio::test]
    async fn test_tick_skips_fresh_cache() {
        let scheduler = scheduler(Arc::new(MockSource::working()), CacheSettings::default());
        scheduler.tick().await;

        assert_eq!(scheduler.tick().await, TickOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_tick_refreshes_stale_cache() {
        let scheduler = scheduler(Arc::new(MockSource::working()), CacheSettings::default());
        scheduler.tick().await;
        scheduler
            .cache
            .set_last_refresh(Some(chrono::Utc::now() - chrono::Duration::days(4)))
            .await;

        assert_eq!(
            scheduler.tick().await,
            TickOutcome::Refreshed(RefreshOutcome::Refreshed)
        );
        assert!(!scheduler.cache.is_stale().await);
    }

    #[tokio::test]
    async fn test_failing_source_eventually_fails_tick() {
        let source = Arc::new(MockSource::working());
        source.set_failing(true);
        let scheduler = scheduler(source, CacheSettings::default());

        assert_eq!(
            scheduler.tick().await,
            TickOutcome::Refreshed(RefreshOutcome::KeptStale)
        );
        assert_eq!(
            scheduler.tick().await,
            TickOutcome::Refreshed(RefreshOutcome::KeptStale)
        );
        assert_eq!(scheduler.tick().await, TickOutcome::Failed);
    }

    #[tokio::test]
    async fn test_spawned_scheduler_can_be_aborted() {
        let scheduler = Arc::new(scheduler(
            Arc::new(MockSource::working()),
            CacheSettings::default(),
        ));
        let handle = scheduler.spawn();
        handle.abort();

        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
